//! 凭证实体定义
//!
//! 凭证由外部发卡流程写入，本服务只读取和执行 UNUSED -> CONSUMED 的状态迁移

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::CredentialStatus;

/// 凭证 ID
///
/// 由存储分配的不透明标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct CredentialId(pub Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// PIN 凭证
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: CredentialId,
    /// 调用方出示的 PIN 码，在未使用的凭证中唯一
    pub code: String,
    /// 产品类别，决定可解锁的应用
    pub product_class: String,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// 构造一条未使用的凭证（发卡、测试与种子数据使用）
    pub fn unused(code: impl Into<String>, product_class: impl Into<String>) -> Self {
        Self {
            id: CredentialId::new(),
            code: code.into(),
            product_class: product_class.into(),
            status: CredentialStatus::Unused,
            created_at: Utc::now(),
            consumed_at: None,
        }
    }

    pub fn is_unused(&self) -> bool {
        self.status == CredentialStatus::Unused
    }
}

/// 按 PIN 码查找未使用凭证的结果
///
/// Consumed 与 Absent 只在服务内部区分（日志、指标），对外统一表现为未找到
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// 存在且未使用
    Active(Credential),
    /// 存在但已核销
    Consumed,
    /// 从未存在
    Absent,
}

/// 条件核销的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// 本次调用完成了 UNUSED -> CONSUMED
    Consumed,
    /// 凭证在写入时已不是 UNUSED（并发请求抢先，或重复提交）
    AlreadyConsumed,
}

/// 日志中使用的脱敏 PIN 码，只保留末两位
pub fn mask_code(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 2), visible)
}
