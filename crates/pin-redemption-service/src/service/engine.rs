//! 兑换引擎
//!
//! 处理一次 PIN 兑换的完整流程：
//!
//! 1. 输入校验（不合法直接返回，不访问存储）
//! 2. 按 PIN 码查找未使用凭证（只读）
//! 3. 授权检查（不允许的应用直接拒绝，凭证保持未使用）
//! 4. 条件核销（存储上的单次原子写入，决定本次请求是否胜出）
//!
//! 第 2 步与第 4 步之间不持有任何锁。并发请求都可能通过查找，但第 4 步只有一个
//! 能把 UNUSED 改为 CONSUMED，其余得到 AlreadyConsumed。

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use pin_shared::observability::metrics;

use crate::entitlement::EntitlementTable;
use crate::error::{Result, StoreError};
use crate::models::{ConsumeOutcome, CredentialId, Lookup, mask_code};
use crate::repository::CredentialStore;

use super::decision::RedemptionDecision;
use super::input::RedemptionInput;

/// 兑换引擎
///
/// 无状态，可在并发请求间通过 Arc 共享
pub struct RedemptionEngine {
    store: Arc<dyn CredentialStore>,
    entitlements: Arc<EntitlementTable>,
}

impl RedemptionEngine {
    pub fn new(store: Arc<dyn CredentialStore>, entitlements: Arc<EntitlementTable>) -> Self {
        Self {
            store,
            entitlements,
        }
    }

    /// 当前使用的存储后端
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// 存储健康检查（就绪探针使用）
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }

    /// 兑换 PIN
    ///
    /// 总是返回一个决策，存储故障以 StoreUnavailable 表示而不是错误
    #[instrument(skip(self, code), fields(code = %mask_code(code)))]
    pub async fn redeem(&self, code: &str, application_id: &str) -> RedemptionDecision {
        let start = Instant::now();
        let decision = self.decide(code, application_id).await;
        let elapsed = start.elapsed();

        metrics::record_redemption(decision.tag(), elapsed.as_secs_f64());

        match &decision {
            RedemptionDecision::Granted => {
                info!(decision = decision.tag(), elapsed_ms = elapsed.as_millis() as u64, "PIN 兑换成功")
            }
            RedemptionDecision::StoreUnavailable => {
                error!(decision = decision.tag(), elapsed_ms = elapsed.as_millis() as u64, "PIN 兑换失败，存储不可用")
            }
            _ => info!(decision = %decision, elapsed_ms = elapsed.as_millis() as u64, "PIN 兑换被拒绝"),
        }

        decision
    }

    async fn decide(&self, code: &str, application_id: &str) -> RedemptionDecision {
        // 1. 输入校验
        if let Some(fields) = RedemptionInput::new(code, application_id).invalid_fields() {
            return RedemptionDecision::InvalidInput(fields);
        }

        // 2. 查找
        let credential = match self.store.find_active(code).await {
            Ok(Lookup::Active(credential)) => credential,
            Ok(Lookup::Consumed) => return RedemptionDecision::AlreadyConsumed,
            Ok(Lookup::Absent) => return RedemptionDecision::NotFound,
            Err(e) => {
                warn!(error_code = e.error_code(), error = %e, "查找凭证失败");
                return RedemptionDecision::StoreUnavailable;
            }
        };

        // 3. 授权，拒绝时不核销
        if !self
            .entitlements
            .is_allowed(&credential.product_class, application_id)
        {
            return RedemptionDecision::Denied(application_id.to_string());
        }

        // 4. 条件核销
        match self.consume(credential.id).await {
            Ok(ConsumeOutcome::Consumed) => RedemptionDecision::Granted,
            Ok(ConsumeOutcome::AlreadyConsumed) => RedemptionDecision::AlreadyConsumed,
            Err(e) => {
                warn!(
                    credential_id = %credential.id,
                    error_code = e.error_code(),
                    error = %e,
                    "核销凭证失败"
                );
                RedemptionDecision::StoreUnavailable
            }
        }
    }

    /// 在独立任务中执行核销
    ///
    /// 调用方 future 被取消（客户端断开、请求超时）时，已发出的核销仍会执行完毕，
    /// 不会留下"写了一半"的状态
    async fn consume(&self, id: CredentialId) -> Result<ConsumeOutcome> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { store.try_consume(id).await })
            .await
            .map_err(|e| StoreError::TaskAborted(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::eq;

    use super::*;
    use crate::models::Credential;
    use crate::repository::MockCredentialStore;

    fn engine(store: MockCredentialStore) -> RedemptionEngine {
        RedemptionEngine::new(
            Arc::new(store),
            Arc::new(EntitlementTable::new([
                ("full", vec!["app1", "app2", "app3", "app4"]),
                ("base", vec!["app1", "app2"]),
            ])),
        )
    }

    #[tokio::test]
    async fn test_invalid_input_never_touches_store() {
        // 没有设置任何期望，访问存储会直接 panic
        let engine = engine(MockCredentialStore::new());

        for (code, app) in [("", "app1"), ("ABC123", ""), ("ABC 123", "app1"), ("ABC123", "app/1")] {
            let decision = engine.redeem(code, app).await;
            assert!(
                matches!(decision, RedemptionDecision::InvalidInput(_)),
                "{:?}/{:?} -> {}",
                code,
                app,
                decision
            );
        }
    }

    #[tokio::test]
    async fn test_granted_consumes_exactly_once() {
        let credential = Credential::unused("ABC123", "full");
        let id = credential.id;

        let mut store = MockCredentialStore::new();
        store
            .expect_find_active()
            .withf(|code| code.to_string() == "ABC123")
            .times(1)
            .returning(move |_| Ok(Lookup::Active(credential.clone())));
        store
            .expect_try_consume()
            .with(eq(id))
            .times(1)
            .returning(|_| Ok(ConsumeOutcome::Consumed));

        let decision = engine(store).redeem("ABC123", "app3").await;
        assert_eq!(decision, RedemptionDecision::Granted);
    }

    #[tokio::test]
    async fn test_denied_does_not_consume() {
        let credential = Credential::unused("XYZ999", "base");

        let mut store = MockCredentialStore::new();
        store
            .expect_find_active()
            .returning(move |_| Ok(Lookup::Active(credential.clone())));
        store.expect_try_consume().never();

        let decision = engine(store).redeem("XYZ999", "app3").await;
        assert_eq!(decision, RedemptionDecision::Denied("app3".into()));
    }

    #[tokio::test]
    async fn test_unknown_product_class_is_denied() {
        let credential = Credential::unused("TRIAL1", "trial");

        let mut store = MockCredentialStore::new();
        store
            .expect_find_active()
            .returning(move |_| Ok(Lookup::Active(credential.clone())));
        store.expect_try_consume().never();

        let decision = engine(store).redeem("TRIAL1", "app1").await;
        assert!(matches!(decision, RedemptionDecision::Denied(_)));
    }

    #[tokio::test]
    async fn test_absent_and_consumed_lookups() {
        let mut store = MockCredentialStore::new();
        store.expect_find_active().returning(|code| {
            Ok(if code == "USED01" {
                Lookup::Consumed
            } else {
                Lookup::Absent
            })
        });
        store.expect_try_consume().never();
        let engine = engine(store);

        assert_eq!(
            engine.redeem("NOPE00", "app1").await,
            RedemptionDecision::NotFound
        );
        assert_eq!(
            engine.redeem("USED01", "app1").await,
            RedemptionDecision::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_lost_race_reports_already_consumed() {
        let credential = Credential::unused("ABC123", "full");

        let mut store = MockCredentialStore::new();
        store
            .expect_find_active()
            .returning(move |_| Ok(Lookup::Active(credential.clone())));
        store
            .expect_try_consume()
            .returning(|_| Ok(ConsumeOutcome::AlreadyConsumed));

        let decision = engine(store).redeem("ABC123", "app1").await;
        assert_eq!(decision, RedemptionDecision::AlreadyConsumed);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_store_unavailable() {
        let mut store = MockCredentialStore::new();
        store.expect_find_active().returning(|_| {
            Err(StoreError::Timeout {
                operation: "find_active",
                timeout: Duration::from_millis(100),
            })
        });
        store.expect_try_consume().never();

        let decision = engine(store).redeem("ABC123", "app1").await;
        assert_eq!(decision, RedemptionDecision::StoreUnavailable);
        assert!(decision.is_retryable());
    }

    #[tokio::test]
    async fn test_consume_failure_is_store_unavailable() {
        let credential = Credential::unused("ABC123", "full");

        let mut store = MockCredentialStore::new();
        store
            .expect_find_active()
            .returning(move |_| Ok(Lookup::Active(credential.clone())));
        store
            .expect_try_consume()
            .returning(|_| Err(StoreError::PoolExhausted));

        let decision = engine(store).redeem("ABC123", "app1").await;
        assert_eq!(decision, RedemptionDecision::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_backend_and_health_delegate_to_store() {
        let mut store = MockCredentialStore::new();
        store.expect_backend().return_const("memory");
        store.expect_health_check().returning(|| Ok(()));

        let engine = engine(store);
        assert_eq!(engine.backend(), "memory");
        assert!(engine.health_check().await.is_ok());
    }
}
