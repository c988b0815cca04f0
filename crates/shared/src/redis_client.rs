//! Redis 连接管理模块
//!
//! 持有一条多路复用连接，clone 后在并发请求间共享，无需每次重新建连。

use crate::config::RedisConfig;
use crate::error::Result;
use redis::Client;
use redis::aio::MultiplexedConnection;
use tracing::{info, instrument};

/// Redis 客户端
#[derive(Clone)]
pub struct RedisClient {
    connection: MultiplexedConnection,
    key_prefix: String,
}

impl RedisClient {
    /// 建立连接
    #[instrument(skip(config))]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established");
        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// 获取连接句柄（廉价 clone，共享底层连接）
    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// 生成带前缀的键名
    pub fn key(&self, parts: &[&str]) -> String {
        let mut key = self.key_prefix.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
