//! PostgreSQL store implementations.
//!
//! Tables live in a configurable schema (see `migrations/`). The schema name
//! is interpolated into SQL, so it is validated as a plain identifier first.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use relay_domain::{AuditEntry, QueueJob};

use crate::error::{StoreError, StoreResult};
use crate::repository::{AuditLog, PurchaseQueue, QueueOptions, QueuedJob};

/// Check that `schema` is a bare SQL identifier.
pub fn validate_schema(schema: &str) -> StoreResult<()> {
    let mut chars = schema.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && schema.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::Config(format!("invalid schema name '{}'", schema)))
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// Audit log backed by `<schema>.audit_logs`.
pub struct PgAuditLog {
    pool: PgPool,
    insert_sql: String,
}

impl PgAuditLog {
    /// Create an audit log writing into `schema`.
    pub fn new(pool: PgPool, schema: &str) -> StoreResult<Self> {
        validate_schema(schema)?;
        let insert_sql = format!(
            "INSERT INTO {}.audit_logs (external_purchase_id, payload, source) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (external_purchase_id, source) DO NOTHING",
            schema
        );
        Ok(Self { pool, insert_sql })
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        let payload = serde_json::to_value(&entry.purchase)?;

        let result = sqlx::query(&self.insert_sql)
            .bind(&entry.purchase.external_id)
            .bind(payload)
            .bind(entry.source.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(external_id = %entry.purchase.external_id, source = %entry.source, "Audit entry already recorded");
        }
        Ok(())
    }
}

// =============================================================================
// Purchase Queue
// =============================================================================

/// Job queue backed by `<schema>.purchase_jobs`.
///
/// `job_key` carries a unique constraint; a repeat insert surfaces as
/// `StoreError::Duplicate`.
pub struct PgPurchaseQueue {
    pool: PgPool,
    options: QueueOptions,
    insert_sql: String,
}

impl PgPurchaseQueue {
    /// Create a queue writing into `schema`.
    pub fn new(pool: PgPool, schema: &str, options: QueueOptions) -> StoreResult<Self> {
        validate_schema(schema)?;
        let insert_sql = format!(
            "INSERT INTO {}.purchase_jobs \
             (id, job_key, queue_name, payload, max_attempts, backoff_delay_ms, status, enqueued_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)",
            schema
        );
        Ok(Self {
            pool,
            options,
            insert_sql,
        })
    }
}

#[async_trait]
impl PurchaseQueue for PgPurchaseQueue {
    async fn enqueue(&self, job: &QueueJob) -> StoreResult<()> {
        let queued = QueuedJob::new(job.clone(), self.options.clone());
        let payload = serde_json::to_value(&queued.job)?;

        sqlx::query(&self.insert_sql)
            .bind(queued.id)
            .bind(&queued.job_key)
            .bind(&queued.options.queue_name)
            .bind(payload)
            .bind(i32::try_from(queued.options.max_attempts).unwrap_or(i32::MAX))
            .bind(i64::try_from(queued.options.backoff_delay_ms).unwrap_or(i64::MAX))
            .bind(queued.enqueued_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Duplicate { .. } => StoreError::duplicate("job", &queued.job_key),
                other => other,
            })?;

        debug!(job_key = %queued.job_key, queue = %queued.options.queue_name, "Job queued");
        Ok(())
    }
}
