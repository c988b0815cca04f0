//! 凭证存储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，PostgreSQL、Redis、内存存储可互换，并支持 mock 测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ConsumeOutcome, CredentialId, Lookup};

/// 凭证存储接口
///
/// 实现必须满足：
/// - `find_active` 只读，不改变任何状态
/// - `try_consume` 是对存储介质的单次原子条件写入：仅当写入时刻状态为 UNUSED 才迁移为
///   CONSUMED。任意多个并发调用针对同一凭证，恰好一个得到 `Consumed`，其余得到
///   `AlreadyConsumed`；对已核销凭证重复调用始终返回 `AlreadyConsumed`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 存储后端名称（日志和指标标签）
    fn backend(&self) -> &'static str;

    /// 按 PIN 码查找未使用的凭证
    async fn find_active(&self, code: &str) -> Result<Lookup>;

    /// 条件核销
    async fn try_consume(&self, id: CredentialId) -> Result<ConsumeOutcome>;

    /// 健康检查
    async fn health_check(&self) -> Result<()>;
}
