//! Transaction and repayment route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::repayment::create_repayment;
use crate::handlers::transaction::{create_transaction, get_transaction};
use crate::state::AppState;

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/transactions", post(create_transaction))
        .route("/api/v1/transactions/:id", get(get_transaction))
}

pub fn repayment_routes() -> Router<AppState> {
    Router::new().route("/api/v1/repayments", post(create_repayment))
}
