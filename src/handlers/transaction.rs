use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::ledger::{CreateTransactionRequest, Transaction, TransactionPoster};
use crate::middleware::ClientIp;
use crate::models::ApiResponse;

pub async fn create_transaction(
    State(poster): State<Arc<TransactionPoster>>,
    client_ip: ClientIp,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>), ApiError> {
    let transaction = poster.post(request, client_ip.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(transaction))))
}

pub async fn get_transaction(
    State(poster): State<Arc<TransactionPoster>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    let transaction = poster.get_transaction(id).await?;

    Ok(Json(ApiResponse::success(transaction)))
}
