//! PIN 兑换服务
//!
//! 校验一次性 PIN 码能否解锁指定应用，并在授权通过时将其核销。
//!
//! ## 核心保证
//!
//! - **单次核销**：同一 PIN 在任意并发下最多被成功兑换一次
//! - **拒绝不消耗**：应用不在授权范围内时 PIN 保持可用
//! - **防枚举**：已核销与不存在的 PIN 对外返回同一结果
//!
//! ## 模块结构
//!
//! - `models`: 凭证实体与查找/核销结果
//! - `entitlement`: 产品类别到应用的授权表
//! - `repository`: 凭证存储（PostgreSQL / Redis / 内存）
//! - `service`: 兑换引擎与决策模型
//! - `dto`: HTTP 请求与响应
//! - `handlers` / `routes` / `state`: HTTP 接入层

pub mod dto;
pub mod entitlement;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use entitlement::EntitlementTable;
pub use error::{ApiError, Result, StoreError};
pub use models::*;
pub use repository::{
    CredentialStore, MemoryCredentialStore, PgCredentialStore, RedisCredentialStore,
};
pub use service::{PublicOutcome, RedemptionDecision, RedemptionEngine};
pub use state::AppState;
