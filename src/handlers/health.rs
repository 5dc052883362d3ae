use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;

pub async fn root() -> &'static str {
    "Loan Management API Server"
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub version: &'static str,
}

/// Reports 503 when the database is unreachable
pub async fn health_check(State(pool): State<PgPool>) -> (StatusCode, Json<HealthResponse>) {
    let (status_code, status, database) = match db::check_health(&pool).await {
        Ok(()) => (StatusCode::OK, "healthy", "connected".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unavailable".to_string())
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
