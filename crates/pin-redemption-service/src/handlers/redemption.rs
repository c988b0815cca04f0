//! PIN 兑换 API 处理器

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::instrument;

use crate::dto::{MessageResponse, RedemptionRequest, RedemptionResponse};
use crate::error::ApiError;
use crate::service::PublicOutcome;
use crate::state::AppState;

/// 兑换 PIN
///
/// POST /api/validate
///
/// 请求体无法解析（非 JSON、字段类型错误）与字段校验失败一样按 400 处理
#[instrument(skip_all)]
pub async fn validate_pin(
    State(state): State<AppState>,
    payload: Result<Json<RedemptionRequest>, JsonRejection>,
) -> Result<Json<RedemptionResponse>, ApiError> {
    let Json(request) = payload?;
    let decision = state
        .engine
        .redeem(&request.code, &request.application_id)
        .await;

    match decision.public_outcome() {
        PublicOutcome::Granted => Ok(Json(PublicOutcome::Granted.into())),
        outcome => Err(ApiError::Rejected(outcome)),
    }
}

/// 连通性探测
///
/// POST /api/test
pub async fn test_endpoint() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello from the test endpoint! It works!"))
}

/// 不支持的请求方法
pub async fn method_not_allowed() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(MessageResponse::new("Method Not Allowed")),
    )
}
