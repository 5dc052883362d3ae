//! Loan account route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::loan_account::*;
use crate::state::AppState;

pub fn loan_account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/loan-accounts", post(create_loan_account))
        .route(
            "/api/v1/loan-accounts/:id",
            get(get_loan_account)
                .put(update_loan_account)
                .delete(delete_loan_account),
        )
        .route("/api/v1/loan-accounts/:id/apply-interest", post(apply_interest))
        .route("/api/v1/loan-accounts/:id/apply-late-fee", post(apply_late_fee))
        .route("/api/v1/loan-accounts/:id/apply-charges", post(apply_charges))
        .route(
            "/api/v1/loan-accounts/:id/transactions",
            get(list_account_transactions),
        )
        .route("/api/v1/loan-accounts/:id/statement", get(get_statement))
        .route(
            "/api/v1/loan-accounts/:id/repayments",
            get(list_account_repayments),
        )
        .route(
            "/api/v1/loan-accounts/:id/repayment-options",
            get(get_repayment_options),
        )
}
