//! Storage trait definitions (Ports)
//!
//! The workflow consumes exactly one operation from each store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use relay_domain::{AuditEntry, QueueJob};

use crate::error::StoreResult;

/// Append-only audit trail
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an entry. Appending the same `(external_id, source)` twice is
    /// a no-op, not an error.
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()>;
}

/// Durable job queue
#[async_trait]
pub trait PurchaseQueue: Send + Sync {
    /// Submit a job keyed by the purchase's external id.
    ///
    /// Fails with `StoreError::Duplicate` if the key was already queued.
    async fn enqueue(&self, job: &QueueJob) -> StoreResult<()>;
}

/// Delivery options recorded with every job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    /// Logical queue name
    pub queue_name: String,
    /// Processing attempts before the job is parked
    pub max_attempts: u32,
    /// Base delay of the consumer's exponential backoff
    pub backoff_delay_ms: u64,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            queue_name: "purchases".to_string(),
            max_attempts: 3,
            backoff_delay_ms: 2000,
        }
    }
}

/// Job as stored by a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Storage identifier
    pub id: Uuid,
    /// Unique key (purchase external id)
    pub job_key: String,
    /// Delivery options at enqueue time
    pub options: QueueOptions,
    /// Payload
    pub job: QueueJob,
    /// Enqueue timestamp
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    /// Wrap `job` for storage.
    pub fn new(job: QueueJob, options: QueueOptions) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_key: job.job_key().to_string(),
            options,
            job,
            enqueued_at: Utc::now(),
        }
    }
}
