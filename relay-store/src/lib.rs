//! Purchase Relay Storage Layer
//!
//! Persistence for the audit trail and the downstream job queue.
//!
//! # Architecture
//!
//! - **Ports**: `AuditLog` (idempotent append) and `PurchaseQueue` (unique
//!   enqueue)
//! - **In-memory**: fast implementations for tests and local runs
//! - **PostgreSQL**: production implementations (feature `postgres`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use relay_store::{AuditLog, MemoryAuditLog};
//! use relay_domain::{AuditEntry, AuditSource};
//!
//! let log = MemoryAuditLog::new();
//! log.append(&AuditEntry { purchase, source: AuditSource::Loyalty }).await?;
//! // A second append of the same (external id, source) is a no-op
//! log.append(&AuditEntry { purchase, source: AuditSource::Loyalty }).await?;
//! assert_eq!(log.len(), 1);
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryAuditLog, MemoryPurchaseQueue};
#[cfg(feature = "postgres")]
pub use postgres::{validate_schema, PgAuditLog, PgPurchaseQueue};
pub use repository::{AuditLog, PurchaseQueue, QueueOptions, QueuedJob};
