//! Records handed to the audit log and the job queue.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::purchase::Purchase;

/// Origin tag stored with every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSource {
    /// Purchase forwarded to the loyalty program
    Loyalty,
}

impl AuditSource {
    /// Stored tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSource::Loyalty => "loyalty",
        }
    }
}

impl fmt::Display for AuditSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write-once audit record, deduplicated by `(external_id, source)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Purchase as it was about to be forwarded
    pub purchase: Purchase,
    /// Where the purchase was forwarded
    pub source: AuditSource,
}

impl AuditEntry {
    /// Deduplication key.
    pub fn dedup_key(&self) -> (&str, AuditSource) {
        (self.purchase.external_id.as_str(), self.source)
    }
}

/// Downstream processing job, keyed by the purchase's external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    /// Purchase to process
    pub purchase: Purchase,
}

impl QueueJob {
    /// Unique job key.
    pub fn job_key(&self) -> &str {
        &self.purchase.external_id
    }
}
