use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::card::{cancel_card, get_card, issue_card, lock_card, unlock_card};
use crate::state::AppState;

pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cards", post(issue_card))
        .route("/api/v1/cards/:id", get(get_card).delete(cancel_card))
        .route("/api/v1/cards/:id/lock", put(lock_card))
        .route("/api/v1/cards/:id/unlock", put(unlock_card))
}
