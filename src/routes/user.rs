//! User route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::user::{
    check_rewards, create_user, delete_user, get_user, list_user_cards, list_user_loan_accounts,
    reward_history, update_user,
};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", post(create_user))
        .route(
            "/api/v1/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/v1/users/:id/loan-accounts", get(list_user_loan_accounts))
        .route("/api/v1/users/:id/cards", get(list_user_cards))
        .route("/api/v1/users/:id/rewards", get(reward_history))
        .route("/api/v1/users/:id/rewards/check", post(check_rewards))
}
