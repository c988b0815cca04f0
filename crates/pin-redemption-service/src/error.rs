//! 错误类型定义
//!
//! - `StoreError`：存储层的基础设施故障。未找到、已核销等业务结果不是错误，见
//!   `models::Lookup` 和 `models::ConsumeOutcome`；引擎把所有 StoreError 统一翻译为
//!   StoreUnavailable
//! - `ApiError`：HTTP 层的非授予结果，负责状态码与响应体

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pin_shared::error::PinError;
use thiserror::Error;

use crate::dto::RedemptionResponse;
use crate::service::PublicOutcome;

/// 凭证存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(sqlx::Error),

    #[error("数据库连接池耗尽")]
    PoolExhausted,

    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("存储操作超时: operation={operation}, timeout={timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("凭证记录损坏: {0}")]
    Corrupt(String),

    #[error("核销任务中断: {0}")]
    TaskAborted(String),

    #[error("基础设施错误: {0}")]
    Infrastructure(PinError),
}

/// 存储 Result 类型别名
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolExhausted,
            other => Self::Database(other),
        }
    }
}

impl From<PinError> for StoreError {
    fn from(err: PinError) -> Self {
        match err {
            PinError::Database(e) => e.into(),
            PinError::Redis(e) => Self::Redis(e),
            other => Self::Infrastructure(other),
        }
    }
}

impl StoreError {
    /// 获取错误码（用于日志和指标）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::PoolExhausted => "POOL_EXHAUSTED",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Timeout { .. } => "STORE_TIMEOUT",
            Self::Corrupt(_) => "CORRUPT_RECORD",
            Self::TaskAborted(_) => "TASK_ABORTED",
            Self::Infrastructure(e) => e.code(),
        }
    }
}

/// HTTP 层错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 请求体无法解析（非 JSON、字段类型错误等）
    #[error("请求体无效: {0}")]
    InvalidBody(String),

    /// 未授予的兑换决策
    #[error("兑换未通过: {}", .0.tag())]
    Rejected(PublicOutcome),
}

impl ApiError {
    /// 对外类别，请求体无效与字段校验失败归为同一类
    pub fn outcome(&self) -> PublicOutcome {
        match self {
            Self::InvalidBody(_) => PublicOutcome::InvalidInput,
            Self::Rejected(outcome) => *outcome,
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self.outcome() {
            PublicOutcome::Granted => StatusCode::OK,
            PublicOutcome::NotFound => StatusCode::NOT_FOUND,
            PublicOutcome::Denied => StatusCode::FORBIDDEN,
            PublicOutcome::InvalidInput => StatusCode::BAD_REQUEST,
            PublicOutcome::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        self.outcome().tag()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 响应体只包含固定文案，解析错误详情仅记录日志
        if let Self::InvalidBody(detail) = &self {
            tracing::debug!(detail = %detail, "请求体解析失败");
        }
        let body = RedemptionResponse::from(self.outcome());
        (self.status_code(), Json(body)).into_response()
    }
}
