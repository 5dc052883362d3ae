//! Append-only ledger of account transactions

pub mod model;
pub mod poster;

pub use model::*;
pub use poster::{post_in_tx, NewPosting, TransactionPoster};
