//! 内存凭证存储
//!
//! 基于 DashMap，用于本地开发、测试和演示。核销在持有记录所在分片写锁期间
//! 完成"比较 + 写入"，在单进程内是原子的；多实例部署必须使用共享存储。

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info};

use super::traits::CredentialStore;
use super::with_timeout;
use crate::error::Result;
use crate::models::{ConsumeOutcome, Credential, CredentialId, CredentialStatus, Lookup};

const BACKEND: &str = "memory";

/// 种子文件中的一条凭证
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCredential {
    code: String,
    product_class: String,
    #[serde(default)]
    status: CredentialStatus,
}

/// 内存凭证存储
pub struct MemoryCredentialStore {
    records: DashMap<CredentialId, Credential>,
    /// PIN 码 -> 凭证 ID 列表（同一 code 可能对应多条已核销记录）
    by_code: DashMap<String, Vec<CredentialId>>,
    operation_timeout: Duration,
}

impl MemoryCredentialStore {
    pub fn new(operation_timeout: Duration) -> Self {
        Self {
            records: DashMap::new(),
            by_code: DashMap::new(),
            operation_timeout,
        }
    }

    /// 以给定凭证初始化
    pub fn with_credentials(
        credentials: impl IntoIterator<Item = Credential>,
        operation_timeout: Duration,
    ) -> Self {
        let store = Self::new(operation_timeout);
        for credential in credentials {
            store.insert(credential);
        }
        store
    }

    /// 从 JSON 种子文件加载
    ///
    /// 文件内容为数组：`[{"code": "ABC123", "productClass": "full"}, ...]`，
    /// `status` 可省略，默认 UNUSED
    pub async fn from_seed_file(path: impl AsRef<Path>, operation_timeout: Duration) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("读取种子文件失败: {}", path.display()))?;
        let seeds: Vec<SeedCredential> = serde_json::from_str(&content)
            .with_context(|| format!("解析种子文件失败: {}", path.display()))?;

        let store = Self::with_credentials(
            seeds.into_iter().map(|seed| {
                let mut credential = Credential::unused(seed.code, seed.product_class);
                if seed.status.is_terminal() {
                    credential.status = seed.status;
                    credential.consumed_at = Some(Utc::now());
                }
                credential
            }),
            operation_timeout,
        );
        info!(path = %path.display(), count = store.len(), "种子凭证已加载");
        Ok(store)
    }

    /// 写入凭证（发卡、种子数据和测试使用，兑换链路不会调用）
    pub fn insert(&self, credential: Credential) {
        self.by_code
            .entry(credential.code.clone())
            .or_default()
            .push(credential.id);
        self.records.insert(credential.id, credential);
    }

    /// 按 ID 读取凭证快照
    pub fn get(&self, id: CredentialId) -> Option<Credential> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lookup(&self, code: &str) -> Lookup {
        // 先复制 ID 列表，避免同时持有两个 map 的锁
        let Some(ids) = self.by_code.get(code).map(|ids| ids.clone()) else {
            return Lookup::Absent;
        };

        let mut seen = false;
        for id in ids {
            if let Some(record) = self.records.get(&id) {
                if record.is_unused() {
                    return Lookup::Active(record.value().clone());
                }
                seen = true;
            }
        }

        if seen { Lookup::Consumed } else { Lookup::Absent }
    }

    fn consume(&self, id: CredentialId) -> ConsumeOutcome {
        match self.records.get_mut(&id) {
            Some(mut record) if record.is_unused() => {
                record.status = CredentialStatus::Consumed;
                record.consumed_at = Some(Utc::now());
                ConsumeOutcome::Consumed
            }
            _ => ConsumeOutcome::AlreadyConsumed,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn find_active(&self, code: &str) -> Result<Lookup> {
        with_timeout(BACKEND, "find_active", self.operation_timeout, async {
            Ok(self.lookup(code))
        })
        .await
    }

    async fn try_consume(&self, id: CredentialId) -> Result<ConsumeOutcome> {
        let outcome = with_timeout(BACKEND, "try_consume", self.operation_timeout, async {
            Ok(self.consume(id))
        })
        .await?;
        debug!(credential_id = %id, ?outcome, "条件核销完成");
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn store() -> MemoryCredentialStore {
        MemoryCredentialStore::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_find_active_returns_unused_credential() {
        let store = store();
        let credential = Credential::unused("ABC123", "full");
        store.insert(credential.clone());

        assert_eq!(
            store.find_active("ABC123").await.unwrap(),
            Lookup::Active(credential)
        );
        assert_eq!(store.find_active("NOPE").await.unwrap(), Lookup::Absent);
    }

    #[tokio::test]
    async fn test_find_active_does_not_mutate() {
        let store = store();
        let credential = Credential::unused("ABC123", "full");
        let id = credential.id;
        store.insert(credential);

        for _ in 0..3 {
            store.find_active("ABC123").await.unwrap();
        }
        assert!(store.get(id).unwrap().is_unused());
    }

    #[tokio::test]
    async fn test_try_consume_is_conditional() {
        let store = store();
        let credential = Credential::unused("ABC123", "full");
        let id = credential.id;
        store.insert(credential);

        assert_eq!(store.try_consume(id).await.unwrap(), ConsumeOutcome::Consumed);
        assert_eq!(
            store.try_consume(id).await.unwrap(),
            ConsumeOutcome::AlreadyConsumed
        );
        assert_eq!(
            store.try_consume(id).await.unwrap(),
            ConsumeOutcome::AlreadyConsumed
        );

        let record = store.get(id).unwrap();
        assert_eq!(record.status, CredentialStatus::Consumed);
        assert!(record.consumed_at.is_some());
        assert_eq!(store.find_active("ABC123").await.unwrap(), Lookup::Consumed);
    }

    #[tokio::test]
    async fn test_try_consume_unknown_id() {
        let store = store();
        assert_eq!(
            store.try_consume(CredentialId::new()).await.unwrap(),
            ConsumeOutcome::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_reissued_code_prefers_unused_record() {
        let store = store();
        let mut old = Credential::unused("ABC123", "base");
        old.status = CredentialStatus::Consumed;
        store.insert(old);
        let fresh = Credential::unused("ABC123", "full");
        store.insert(fresh.clone());

        assert_eq!(store.find_active("ABC123").await.unwrap(), Lookup::Active(fresh));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_has_single_winner() {
        let store = Arc::new(store());
        let credential = Credential::unused("RACE01", "full");
        let id = credential.id;
        store.insert(credential);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.try_consume(id).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == ConsumeOutcome::Consumed {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_from_seed_file() {
        let path = std::env::temp_dir().join(format!("pin-seed-{}.json", CredentialId::new()));
        tokio::fs::write(
            &path,
            r#"[
                {"code": "ABC123", "productClass": "full"},
                {"code": "XYZ999", "productClass": "base"},
                {"code": "OLD001", "productClass": "base", "status": "CONSUMED"}
            ]"#,
        )
        .await
        .unwrap();

        let store = MemoryCredentialStore::from_seed_file(&path, Duration::from_secs(1))
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(store.len(), 3);
        assert!(matches!(
            store.find_active("XYZ999").await.unwrap(),
            Lookup::Active(c) if c.product_class == "base"
        ));
        assert_eq!(store.find_active("OLD001").await.unwrap(), Lookup::Consumed);
    }

    #[tokio::test]
    async fn test_from_seed_file_missing() {
        let result =
            MemoryCredentialStore::from_seed_file("/nonexistent/seed.json", Duration::from_secs(1))
                .await;
        assert!(result.is_err());
    }
}
