//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum PinError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, PinError>;

impl PinError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有连接类的瞬时故障可以重试，配置和迁移错误重试也不会成功
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
            Self::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_refusal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(message: &str) -> PinError {
        PinError::Config(config::ConfigError::Message(message.to_string()))
    }

    #[test]
    fn test_error_code() {
        assert_eq!(config_error("missing url").code(), "CONFIG_ERROR");
        assert_eq!(
            PinError::Database(sqlx::Error::PoolTimedOut).code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(PinError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!PinError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!config_error("boom").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = config_error("unexpected state");
        assert!(err.to_string().contains("unexpected state"));
    }
}
