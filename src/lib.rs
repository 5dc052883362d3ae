//! Loan management backend library
//!
//! Users, revolving loan accounts, cards, an append-only transaction ledger,
//! repayments and reward tiers, exposed as a JSON API over PostgreSQL.

pub mod audit;
pub mod card;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod loan_account;
pub mod middleware;
pub mod models;
pub mod repayment;
pub mod reward;
pub mod routes;
pub mod state;
pub mod user;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use state::AppState;

/// Assemble the full application router with its middleware stack
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .merge(routes::user_routes())
        .merge(routes::loan_account_routes())
        .merge(routes::transaction_routes())
        .merge(routes::repayment_routes())
        .merge(routes::card_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(cors)
}

/// CORS policy from a comma-separated origin list; permissive when unset
pub fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default().trim();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
