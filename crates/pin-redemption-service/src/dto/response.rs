//! 响应 DTO 定义

use serde::{Deserialize, Serialize};

use crate::service::{PublicOutcome, RedemptionDecision};

/// 兑换响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionResponse {
    pub is_valid: bool,
    /// 对外错误码，已核销与不存在使用同一个码
    pub code: String,
    pub message: String,
}

impl From<PublicOutcome> for RedemptionResponse {
    fn from(outcome: PublicOutcome) -> Self {
        Self {
            is_valid: outcome.is_granted(),
            code: outcome.tag().to_string(),
            message: outcome.message().to_string(),
        }
    }
}

impl From<&RedemptionDecision> for RedemptionResponse {
    fn from(decision: &RedemptionDecision) -> Self {
        decision.public_outcome().into()
    }
}

/// 仅包含提示文案的响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
