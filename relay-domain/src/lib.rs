//! Purchase Relay Domain Layer
//!
//! Pure domain types with zero I/O dependencies: the canonical purchase
//! shape, the records handed to the audit log and job queue, and the typed
//! error taxonomy shared by every other crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod error;
pub mod purchase;
pub mod records;

// Re-export commonly used types
pub use error::{AppError, AppResult, ErrorKind, UpstreamDetails};
pub use purchase::{Buyer, Metadata, Purchase, PurchaseItem, PurchaseOverlay};
pub use records::{AuditEntry, AuditSource, QueueJob};
