use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::card::{Card, CardService, CreateCardRequest};
use crate::error::ApiError;
use crate::middleware::ClientIp;
use crate::models::ApiResponse;

pub async fn issue_card(
    State(service): State<Arc<CardService>>,
    client_ip: ClientIp,
    Json(request): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Card>>), ApiError> {
    let card = service.issue_card(request, client_ip.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(card))))
}

pub async fn get_card(
    State(service): State<Arc<CardService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Card>>, ApiError> {
    let card = service.get_card(id).await?;

    Ok(Json(ApiResponse::success(card)))
}

pub async fn lock_card(
    State(service): State<Arc<CardService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<Card>>, ApiError> {
    let card = service.lock_card(id, client_ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(card)))
}

pub async fn unlock_card(
    State(service): State<Arc<CardService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<Card>>, ApiError> {
    let card = service.unlock_card(id, client_ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(card)))
}

/// Cancel the card; cancelled cards are no longer returned by reads
pub async fn cancel_card(
    State(service): State<Arc<CardService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<Card>>, ApiError> {
    let card = service.cancel_card(id, client_ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(card)))
}
