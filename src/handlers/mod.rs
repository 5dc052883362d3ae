//! API handlers

pub mod card;
pub mod health;
pub mod loan_account;
pub mod repayment;
pub mod transaction;
pub mod user;

pub use card::*;
pub use health::*;
pub use loan_account::*;
pub use repayment::*;
pub use transaction::*;
pub use user::*;
