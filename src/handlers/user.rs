//! User handlers, including a user's accounts, cards and rewards

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::card::{Card, CardService};
use crate::error::ApiError;
use crate::loan_account::{LoanAccount, LoanAccountService};
use crate::middleware::ClientIp;
use crate::models::{ApiResponse, PaginatedResponse, PaginationParams};
use crate::reward::{RewardAdjustment, RewardCheckResult, RewardService};
use crate::user::{CreateUserRequest, UpdateUserRequest, UserResponse, UserService};

pub async fn create_user(
    State(service): State<Arc<UserService>>,
    client_ip: ClientIp,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = service.create_user(request, client_ip.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user.into()))))
}

pub async fn get_user(
    State(service): State<Arc<UserService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = service.get_user(id).await?;

    Ok(Json(ApiResponse::success(user.into())))
}

pub async fn update_user(
    State(service): State<Arc<UserService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = service.update_user(id, request, client_ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(user.into())))
}

pub async fn delete_user(
    State(service): State<Arc<UserService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    service.delete_user(id, client_ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

pub async fn list_user_loan_accounts(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<LoanAccount>>>, ApiError> {
    let accounts = service.list_for_user(id).await?;

    Ok(Json(ApiResponse::success(accounts)))
}

pub async fn list_user_cards(
    State(service): State<Arc<CardService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Card>>>, ApiError> {
    let cards = service.list_for_user(id).await?;

    Ok(Json(ApiResponse::success(cards)))
}

pub async fn check_rewards(
    State(service): State<Arc<RewardService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RewardCheckResult>>, ApiError> {
    let result = service.check_rewards(id, Utc::now()).await?;

    Ok(Json(ApiResponse::success(result)))
}

pub async fn reward_history(
    State(service): State<Arc<RewardService>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<RewardAdjustment>>>, ApiError> {
    let history = service.reward_history(id, &params).await?;

    Ok(Json(ApiResponse::success(history)))
}
