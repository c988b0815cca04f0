//! PIN 兑换服务入口
//!
//! 提供 PIN 校验与核销的 HTTP API。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use pin_redemption::{
    AppState, CredentialStore, EntitlementTable, MemoryCredentialStore, PgCredentialStore,
    RedemptionEngine, RedisCredentialStore, routes,
};
use pin_shared::{
    config::{AppConfig, StoreBackend},
    database::Database,
    error::PinError,
    observability,
    redis_client::RedisClient,
    retry::{RetryPolicy, retry_with_policy},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 统一加载配置
    let (config, load_error) = match AppConfig::load("pin-redemption-service") {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // 2. 可观测性
    let obs_config = config.observability.clone().with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    info!(
        environment = %config.environment,
        backend = %config.store.backend,
        "Starting pin-redemption-service..."
    );

    // 3. 授权表
    let entitlements = Arc::new(EntitlementTable::from(&config.entitlements));
    if entitlements.is_empty() {
        warn!("授权表为空，所有兑换请求都将被拒绝");
    }
    info!(product_classes = entitlements.len(), "Entitlement table loaded");

    // 4. 凭证存储
    let store = build_store(&config).await?;
    info!(backend = store.backend(), "Credential store initialized");

    // 5. 兑换引擎与路由
    let engine = Arc::new(RedemptionEngine::new(store, entitlements));
    let state = AppState::new(engine, config.service_name.clone());
    let app = routes::app(
        state,
        &config.cors,
        Duration::from_millis(config.server.request_timeout_ms),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：停止接收新连接，等待进行中的请求（包括已发出的核销）完成
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// 按配置创建凭证存储
///
/// 启动阶段的连接失败按重试策略退避重试；兑换链路上的存储操作不重试
async fn build_store(config: &AppConfig) -> Result<Arc<dyn CredentialStore>> {
    let policy = RetryPolicy::default();
    let operation_timeout = Duration::from_millis(config.store.operation_timeout_ms);

    let store: Arc<dyn CredentialStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db = retry_with_policy(&policy, "postgres_connect", PinError::is_retryable, || {
                Database::connect(&config.database)
            })
            .await
            .context("连接 PostgreSQL 失败")?;

            if config.database.run_migrations {
                db.run_migrations().await.context("执行数据库迁移失败")?;
            }

            Arc::new(PgCredentialStore::new(db, operation_timeout))
        }
        StoreBackend::Redis => {
            let client = retry_with_policy(&policy, "redis_connect", PinError::is_retryable, || {
                RedisClient::connect(&config.redis)
            })
            .await
            .context("连接 Redis 失败")?;

            Arc::new(RedisCredentialStore::new(client, operation_timeout))
        }
        StoreBackend::Memory => {
            if config.is_production() {
                warn!("memory 后端不跨进程共享，生产环境请使用 postgres 或 redis");
            }
            let store = match &config.store.seed_file {
                Some(path) => MemoryCredentialStore::from_seed_file(path, operation_timeout).await?,
                None => MemoryCredentialStore::new(operation_timeout),
            };
            Arc::new(store)
        }
    };

    Ok(store)
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
