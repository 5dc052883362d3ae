use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::ClientIp;
use crate::models::ApiResponse;
use crate::repayment::{CreateRepaymentRequest, RepaymentResult, RepaymentService};

/// Apply a repayment to a loan account
pub async fn create_repayment(
    State(service): State<Arc<RepaymentService>>,
    client_ip: ClientIp,
    Json(request): Json<CreateRepaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RepaymentResult>>), ApiError> {
    let result = service
        .make_repayment(request, Utc::now(), client_ip.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}
