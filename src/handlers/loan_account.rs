//! Loan account handlers: lifecycle, charges and per-account reads

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::ledger::{Statement, TransactionList, TransactionPoster};
use crate::loan_account::{
    ChargesResult, CreateLoanAccountRequest, InterestResult, LateFeeResult, LoanAccount,
    LoanAccountService, UpdateLoanAccountRequest,
};
use crate::middleware::ClientIp;
use crate::models::{ApiResponse, PaginatedResponse, PaginationParams};
use crate::repayment::{Repayment, RepaymentOptions, RepaymentService};

pub async fn create_loan_account(
    State(service): State<Arc<LoanAccountService>>,
    client_ip: ClientIp,
    Json(request): Json<CreateLoanAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoanAccount>>), ApiError> {
    let account = service.open_account(request, client_ip.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

pub async fn get_loan_account(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanAccount>>, ApiError> {
    let account = service.get_account(id).await?;

    Ok(Json(ApiResponse::success(account)))
}

pub async fn update_loan_account(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
    Json(request): Json<UpdateLoanAccountRequest>,
) -> Result<Json<ApiResponse<LoanAccount>>, ApiError> {
    let account = service
        .update_account(id, request, client_ip.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(account)))
}

pub async fn delete_loan_account(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    service.close_account(id, client_ip.as_deref()).await?;

    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

pub async fn apply_interest(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<InterestResult>>, ApiError> {
    let result = service
        .apply_interest(id, Utc::now(), client_ip.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

pub async fn apply_late_fee(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<LateFeeResult>>, ApiError> {
    let result = service
        .apply_late_fee(id, Utc::now(), client_ip.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

pub async fn apply_charges(
    State(service): State<Arc<LoanAccountService>>,
    Path(id): Path<Uuid>,
    client_ip: ClientIp,
) -> Result<Json<ApiResponse<ChargesResult>>, ApiError> {
    let result = service
        .apply_charges(id, Utc::now(), client_ip.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

pub async fn list_account_transactions(
    State(poster): State<Arc<TransactionPoster>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<TransactionList>>, ApiError> {
    let list = poster.list_for_account(id, &params).await?;

    Ok(Json(ApiResponse::success(list)))
}

pub async fn get_statement(
    State(poster): State<Arc<TransactionPoster>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Statement>>, ApiError> {
    let statement = poster.statement(id, Utc::now()).await?;

    Ok(Json(ApiResponse::success(statement)))
}

pub async fn list_account_repayments(
    State(service): State<Arc<RepaymentService>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<Repayment>>>, ApiError> {
    let repayments = service.list_for_account(id, &params).await?;

    Ok(Json(ApiResponse::success(repayments)))
}

pub async fn get_repayment_options(
    State(service): State<Arc<RepaymentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RepaymentOptions>>, ApiError> {
    let options = service.repayment_options(id).await?;

    Ok(Json(ApiResponse::success(options)))
}
