//! Redis 凭证存储
//!
//! 数据布局：
//! - `{prefix}:credential:{id}`：Hash，字段 id / code / product_class / status / created_at / consumed_at
//! - `{prefix}:code:{code}`：String，PIN 码到凭证 ID 的索引
//!
//! 核销通过 Lua 脚本执行。Redis 单线程执行脚本，脚本内的"比较状态 + 写入状态"
//! 对其他客户端不可分割，相当于一次 compare-and-swap。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use tracing::{debug, instrument};
use uuid::Uuid;

use pin_shared::redis_client::RedisClient;

use super::traits::CredentialStore;
use super::with_timeout;
use crate::error::{Result, StoreError};
use crate::models::{ConsumeOutcome, Credential, CredentialId, CredentialStatus, Lookup};

const BACKEND: &str = "redis";

/// 状态为 UNUSED 时写入 CONSUMED 并返回 1，否则返回 0（包括记录不存在）
const CONSUME_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if status == 'UNUSED' then
    redis.call('HSET', KEYS[1], 'status', 'CONSUMED', 'consumed_at', ARGV[1])
    return 1
end
return 0
"#;

/// Redis 凭证存储
pub struct RedisCredentialStore {
    client: RedisClient,
    consume_script: Script,
    operation_timeout: Duration,
}

impl RedisCredentialStore {
    pub fn new(client: RedisClient, operation_timeout: Duration) -> Self {
        Self {
            client,
            consume_script: Script::new(CONSUME_SCRIPT),
            operation_timeout,
        }
    }

    fn credential_key(&self, id: CredentialId) -> String {
        self.client.key(&["credential", &id.to_string()])
    }

    fn code_key(&self, code: &str) -> String {
        self.client.key(&["code", code])
    }

    /// 写入凭证（发卡工具、种子数据和测试使用，兑换链路不会调用）
    pub async fn insert(&self, credential: &Credential) -> Result<()> {
        let mut fields = vec![
            ("id", credential.id.to_string()),
            ("code", credential.code.clone()),
            ("product_class", credential.product_class.clone()),
            ("status", credential.status.as_str().to_string()),
            ("created_at", credential.created_at.to_rfc3339()),
        ];
        if let Some(consumed_at) = credential.consumed_at {
            fields.push(("consumed_at", consumed_at.to_rfc3339()));
        }

        let mut conn = self.client.connection();
        redis::pipe()
            .atomic()
            .hset_multiple(self.credential_key(credential.id), &fields)
            .ignore()
            .set(self.code_key(&credential.code), credential.id.to_string())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn load(&self, code: &str) -> Result<Option<Credential>> {
        let mut conn = self.client.connection();

        let id: Option<String> = conn.get(self.code_key(code)).await?;
        let Some(id) = id else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&id)
            .map(CredentialId)
            .map_err(|e| StoreError::Corrupt(format!("code 索引指向非法 ID {}: {}", id, e)))?;

        let fields: HashMap<String, String> = conn.hgetall(self.credential_key(id)).await?;
        if fields.is_empty() {
            return Err(StoreError::Corrupt(format!("code 索引指向不存在的凭证 {}", id)));
        }

        parse_credential(id, &fields).map(Some)
    }

    async fn consume(&self, id: CredentialId) -> Result<ConsumeOutcome> {
        let mut conn = self.client.connection();
        let changed: i64 = self
            .consume_script
            .key(self.credential_key(id))
            .arg(Utc::now().to_rfc3339())
            .invoke_async(&mut conn)
            .await?;

        Ok(if changed == 1 {
            ConsumeOutcome::Consumed
        } else {
            ConsumeOutcome::AlreadyConsumed
        })
    }
}

fn parse_credential(id: CredentialId, fields: &HashMap<String, String>) -> Result<Credential> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Corrupt(format!("凭证 {} 缺少字段 {}", id, name)))
    };
    let parse_time = |value: &str| {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("凭证 {} 时间格式错误: {}", id, e)))
    };

    let status = field("status")?
        .parse::<CredentialStatus>()
        .map_err(StoreError::Corrupt)?;
    let consumed_at = match fields.get("consumed_at") {
        Some(value) => Some(parse_time(value)?),
        None => None,
    };

    Ok(Credential {
        id,
        code: field("code")?.clone(),
        product_class: field("product_class")?.clone(),
        status,
        created_at: parse_time(field("created_at")?)?,
        consumed_at,
    })
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self, code))]
    async fn find_active(&self, code: &str) -> Result<Lookup> {
        let credential =
            with_timeout(BACKEND, "find_active", self.operation_timeout, self.load(code)).await?;

        Ok(match credential {
            Some(c) if c.is_unused() => Lookup::Active(c),
            Some(_) => Lookup::Consumed,
            None => Lookup::Absent,
        })
    }

    #[instrument(skip(self), fields(credential_id = %id))]
    async fn try_consume(&self, id: CredentialId) -> Result<ConsumeOutcome> {
        let outcome =
            with_timeout(BACKEND, "try_consume", self.operation_timeout, self.consume(id)).await?;
        debug!(?outcome, "条件核销完成");
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<()> {
        with_timeout(BACKEND, "health_check", self.operation_timeout, async {
            self.client.health_check().await?;
            Ok(())
        })
        .await
    }
}
