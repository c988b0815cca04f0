//! 凭证存储层
//!
//! 封装凭证的查找与条件核销，不包含授权等业务逻辑。
//!
//! ## 设计原则
//!
//! - 核销必须是存储介质上的单次原子条件写入，不允许"先读后写"
//! - 每次存储访问都有超时上限，超时视为存储不可用
//! - 定义 trait 接口以支持 mock 测试和多后端切换

mod memory_store;
mod pg_store;
mod redis_store;
mod traits;

use std::future::Future;
use std::time::Duration;

use pin_shared::observability::metrics;
use tracing::warn;

use crate::error::{Result, StoreError};

pub use memory_store::MemoryCredentialStore;
pub use pg_store::PgCredentialStore;
pub use redis_store::RedisCredentialStore;
pub use traits::*;

/// 为单次存储操作加超时并记录指标
pub(crate) async fn with_timeout<T, F>(
    backend: &'static str,
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, timeout }),
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(StoreError::Timeout { .. }) => "timeout",
        Err(_) => "error",
    };
    metrics::record_store_operation(backend, operation, outcome);

    if let Err(e) = &result {
        warn!(backend, operation, error_code = e.error_code(), error = %e, "存储操作失败");
    }

    result
}
