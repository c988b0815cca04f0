//! RedemptionEngine 集成测试
//!
//! 使用内存存储驱动完整兑换流程，覆盖并发核销、拒绝不消耗、防枚举等核心行为。
//! 不依赖外部服务，可直接运行：
//!
//! ```bash
//! cargo test -p pin-redemption-service --test redemption_engine_test
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use pin_redemption::{
    Credential, CredentialStatus, EntitlementTable, MemoryCredentialStore, PublicOutcome,
    RedemptionDecision, RedemptionEngine,
};
use pin_shared::config::default_entitlements;
use pin_shared::test_utils::{CredentialTestData, TestDataGenerator};

// ==================== 辅助函数 ====================

fn to_credential(data: &CredentialTestData) -> Credential {
    let mut credential = Credential::unused(&data.code, &data.product_class);
    if data.consumed {
        credential.status = CredentialStatus::Consumed;
        credential.consumed_at = Some(chrono::Utc::now());
    }
    credential
}

/// 构建引擎，同时返回存储以便检查凭证状态
fn setup(credentials: Vec<Credential>) -> (Arc<RedemptionEngine>, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_credentials(
        credentials,
        Duration::from_secs(1),
    ));
    let engine = Arc::new(RedemptionEngine::new(
        store.clone(),
        Arc::new(EntitlementTable::from(&default_entitlements())),
    ));
    (engine, store)
}

async fn redeem(engine: &RedemptionEngine, code: &str, app: &str) -> RedemptionDecision {
    engine.redeem(code, app).await
}

// ==================== 基本场景 ====================

#[tokio::test]
async fn test_full_credential_unlocks_app3_once() {
    let credential = Credential::unused("ABC123", "full");
    let id = credential.id;
    let (engine, store) = setup(vec![credential]);

    assert_eq!(redeem(&engine, "ABC123", "app3").await, RedemptionDecision::Granted);
    assert_eq!(store.get(id).unwrap().status, CredentialStatus::Consumed);

    assert_eq!(
        redeem(&engine, "ABC123", "app3").await,
        RedemptionDecision::AlreadyConsumed
    );
}

#[tokio::test]
async fn test_consumed_credential_stays_consumed_for_every_app() {
    let credential = Credential::unused("ABC123", "full");
    let id = credential.id;
    let (engine, store) = setup(vec![credential]);

    assert_eq!(redeem(&engine, "ABC123", "app1").await, RedemptionDecision::Granted);

    for round in 0..5 {
        for app in ["app1", "app2", "app3", "app4", "unknown-app"] {
            assert_eq!(
                redeem(&engine, "ABC123", app).await,
                RedemptionDecision::AlreadyConsumed,
                "round {} app {}",
                round,
                app
            );
        }
    }
    assert_eq!(store.get(id).unwrap().status, CredentialStatus::Consumed);
}

#[tokio::test]
async fn test_denied_redemption_keeps_credential_usable() {
    let credential = Credential::unused("XYZ999", "base");
    let id = credential.id;
    let (engine, store) = setup(vec![credential]);

    assert_eq!(
        redeem(&engine, "XYZ999", "app3").await,
        RedemptionDecision::Denied("app3".into())
    );
    assert!(store.get(id).unwrap().is_unused());

    assert_eq!(redeem(&engine, "XYZ999", "app1").await, RedemptionDecision::Granted);
    assert_eq!(store.get(id).unwrap().status, CredentialStatus::Consumed);
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let (engine, _) = setup(vec![Credential::unused("ABC123", "full")]);
    assert_eq!(redeem(&engine, "NOPE42", "app1").await, RedemptionDecision::NotFound);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_without_side_effects() {
    let credential = Credential::unused("ABC123", "full");
    let id = credential.id;
    let (engine, store) = setup(vec![credential]);

    for (code, app) in [("", "app1"), ("ABC123", ""), (" ABC123", "app1"), ("ABC123", "app 1")] {
        assert!(matches!(
            redeem(&engine, code, app).await,
            RedemptionDecision::InvalidInput(_)
        ));
    }
    assert!(store.get(id).unwrap().is_unused());
}

#[tokio::test]
async fn test_consumed_credential_looks_like_missing_one() {
    let consumed = TestDataGenerator::consumed_credential("full");
    let (engine, _) = setup(vec![to_credential(&consumed)]);

    let consumed_decision = redeem(&engine, &consumed.code, "app1").await;
    let missing_decision = redeem(&engine, "NEVER-ISSUED", "app1").await;

    assert_eq!(consumed_decision, RedemptionDecision::AlreadyConsumed);
    assert_eq!(missing_decision, RedemptionDecision::NotFound);
    assert_eq!(
        consumed_decision.public_outcome(),
        missing_decision.public_outcome()
    );
    assert_eq!(consumed_decision.public_outcome(), PublicOutcome::NotFound);
}

#[tokio::test]
async fn test_every_product_class_and_application_pair() {
    let config = default_entitlements();
    for class in ["full", "base", "trial"] {
        for app in ["app1", "app2", "app3", "app4", "app5"] {
            let data = TestDataGenerator::unused_credential(class);
            let (engine, _) = setup(vec![to_credential(&data)]);

            let expected_allowed = config
                .get(class)
                .is_some_and(|apps| apps.iter().any(|a| a == app));
            let decision = redeem(&engine, &data.code, app).await;

            if expected_allowed {
                assert_eq!(decision, RedemptionDecision::Granted, "{} / {}", class, app);
            } else {
                assert_eq!(
                    decision,
                    RedemptionDecision::Denied(app.to_string()),
                    "{} / {}",
                    class,
                    app
                );
            }
        }
    }
}

// ==================== 并发场景 ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_redemptions_grant_exactly_once() {
    let data = TestDataGenerator::unused_credential("full");
    let credential = to_credential(&data);
    let id = credential.id;
    let (engine, store) = setup(vec![credential]);

    let tasks = (0..64).map(|i| {
        let engine = engine.clone();
        let code = data.code.clone();
        // 混合不同应用，全部在授权范围内
        let app = format!("app{}", i % 4 + 1);
        tokio::spawn(async move { redeem(&engine, &code, &app).await })
    });

    let decisions: Vec<RedemptionDecision> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let granted = decisions.iter().filter(|d| d.is_granted()).count();
    assert_eq!(granted, 1, "decisions: {:?}", decisions);
    assert!(
        decisions
            .iter()
            .filter(|d| !d.is_granted())
            .all(|d| *d == RedemptionDecision::AlreadyConsumed)
    );
    assert_eq!(store.get(id).unwrap().status, CredentialStatus::Consumed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_denials_never_burn_credential() {
    let data = TestDataGenerator::unused_credential("base");
    let credential = to_credential(&data);
    let id = credential.id;
    let (engine, store) = setup(vec![credential]);

    let denied = (0..32).map(|_| {
        let engine = engine.clone();
        let code = data.code.clone();
        tokio::spawn(async move { redeem(&engine, &code, "app4").await })
    });
    for decision in join_all(denied).await {
        assert!(matches!(decision.unwrap(), RedemptionDecision::Denied(_)));
    }
    assert!(store.get(id).unwrap().is_unused());

    assert_eq!(redeem(&engine, &data.code, "app2").await, RedemptionDecision::Granted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_independent_credentials_do_not_interfere() {
    let batch = TestDataGenerator::unused_batch("full", 20);
    let (engine, _) = setup(batch.iter().map(to_credential).collect());

    let tasks = batch.iter().flat_map(|data| {
        let engine = engine.clone();
        let code = data.code.clone();
        (0..3).map(move |_| {
            let engine = engine.clone();
            let code = code.clone();
            tokio::spawn(async move {
                let decision = redeem(&engine, &code, "app1").await;
                (code, decision)
            })
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    for data in &batch {
        let granted = results
            .iter()
            .filter(|(code, d)| *code == data.code && d.is_granted())
            .count();
        assert_eq!(granted, 1, "code {}", data.code);
    }
}
