//! Route definitions for the loan management API

mod card;
mod ledger;
mod loan_account;
mod user;

pub use card::card_routes;
pub use ledger::{repayment_routes, transaction_routes};
pub use loan_account::loan_account_routes;
pub use user::user_routes;
