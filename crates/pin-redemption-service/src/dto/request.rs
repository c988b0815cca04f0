//! 请求 DTO 定义

use serde::Deserialize;

/// 兑换请求
///
/// 兼容旧客户端的字段名 `pin_code` / `app_id`。缺失字段按空串处理，由兑换引擎的输入校验统一拒绝
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    #[serde(default, alias = "pin_code")]
    pub code: String,

    #[serde(default, alias = "app_id")]
    pub application_id: String,
}
