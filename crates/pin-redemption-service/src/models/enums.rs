//! 凭证枚举类型定义
//!
//! 支持数据库（sqlx）和 JSON（serde）序列化

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 凭证状态
///
/// 单向流转：UNUSED -> CONSUMED，核销后不可回退
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    /// 未使用
    #[default]
    Unused,
    /// 已核销
    Consumed,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unused => "UNUSED",
            Self::Consumed => "CONSUMED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Consumed)
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNUSED" => Ok(Self::Unused),
            "CONSUMED" => Ok(Self::Consumed),
            other => Err(format!("未知的凭证状态: {}", other)),
        }
    }
}
