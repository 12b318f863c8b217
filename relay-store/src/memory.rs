//! In-memory store implementations
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use relay_domain::{AuditEntry, AuditSource, QueueJob};

use crate::error::{StoreError, StoreResult};
use crate::repository::{AuditLog, PurchaseQueue, QueueOptions, QueuedJob};

// =============================================================================
// Audit Log
// =============================================================================

/// In-memory audit log, deduplicated by `(external_id, source)`
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored entries in append order
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Entry for `(external_id, source)`, if recorded
    pub fn find(&self, external_id: &str, source: AuditSource) -> Option<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| entry.dedup_key() == (external_id, source))
            .cloned()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if entries.iter().any(|e| e.dedup_key() == entry.dedup_key()) {
            debug!(external_id = %entry.purchase.external_id, source = %entry.source, "Audit entry already recorded");
            return Ok(());
        }

        entries.push(entry.clone());
        Ok(())
    }
}

// =============================================================================
// Purchase Queue
// =============================================================================

/// In-memory queue with unique job keys
pub struct MemoryPurchaseQueue {
    options: QueueOptions,
    jobs: RwLock<HashMap<String, QueuedJob>>,
}

impl Default for MemoryPurchaseQueue {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

impl MemoryPurchaseQueue {
    /// Create an empty queue
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Job stored under `job_key`
    pub fn get(&self, job_key: &str) -> Option<QueuedJob> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).get(job_key).cloned()
    }
}

#[async_trait]
impl PurchaseQueue for MemoryPurchaseQueue {
    async fn enqueue(&self, job: &QueueJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let key = job.job_key();

        if jobs.contains_key(key) {
            return Err(StoreError::duplicate("job", key));
        }

        let queued = QueuedJob::new(job.clone(), self.options.clone());
        debug!(job_key = %queued.job_key, queue = %queued.options.queue_name, "Job queued");
        jobs.insert(queued.job_key.clone(), queued);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
