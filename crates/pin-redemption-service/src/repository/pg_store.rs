//! PostgreSQL 凭证存储
//!
//! 核销使用单条条件 UPDATE（`WHERE id = $1 AND status = 'UNUSED'`）。
//! PostgreSQL 对同一行的并发 UPDATE 加行锁串行执行，后到的语句在锁释放后重新评估
//! WHERE 条件，因此只有一条语句能命中 UNUSED 并返回 rows_affected = 1。

use std::time::Duration;

use async_trait::async_trait;
use pin_shared::database::Database;
use tracing::{debug, instrument};

use super::traits::CredentialStore;
use super::with_timeout;
use crate::error::Result;
use crate::models::{ConsumeOutcome, Credential, CredentialId, CredentialStatus, Lookup};

const BACKEND: &str = "postgres";

/// PostgreSQL 凭证存储
pub struct PgCredentialStore {
    db: Database,
    operation_timeout: Duration,
}

impl PgCredentialStore {
    pub fn new(db: Database, operation_timeout: Duration) -> Self {
        Self {
            db,
            operation_timeout,
        }
    }

    async fn fetch_by_code(&self, code: &str) -> Result<Option<Credential>> {
        // 同一 code 可能存在多条已核销记录，优先返回未使用的那条
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT id, code, product_class, status, created_at, consumed_at
            FROM pin_credentials
            WHERE code = $1
            ORDER BY (status = 'UNUSED') DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(code)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(credential)
    }

    async fn consume_row(&self, id: CredentialId) -> Result<ConsumeOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE pin_credentials
            SET status = 'CONSUMED', consumed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'UNUSED'
            "#,
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 1 {
            Ok(ConsumeOutcome::Consumed)
        } else {
            Ok(ConsumeOutcome::AlreadyConsumed)
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self, code))]
    async fn find_active(&self, code: &str) -> Result<Lookup> {
        let credential =
            with_timeout(BACKEND, "find_active", self.operation_timeout, self.fetch_by_code(code))
                .await?;

        let lookup = match credential {
            Some(c) if c.status == CredentialStatus::Unused => Lookup::Active(c),
            Some(_) => Lookup::Consumed,
            None => Lookup::Absent,
        };
        Ok(lookup)
    }

    #[instrument(skip(self), fields(credential_id = %id))]
    async fn try_consume(&self, id: CredentialId) -> Result<ConsumeOutcome> {
        let outcome =
            with_timeout(BACKEND, "try_consume", self.operation_timeout, self.consume_row(id))
                .await?;
        debug!(?outcome, "条件核销完成");
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<()> {
        with_timeout(BACKEND, "health_check", self.operation_timeout, async {
            self.db.health_check().await?;
            Ok(())
        })
        .await
    }
}
