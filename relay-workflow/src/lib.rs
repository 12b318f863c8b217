//! Purchase Relay Workflow
//!
//! The purchase reconciliation use case: resolve the purchase, record the
//! audit entry, forward it to the loyalty program, enqueue the downstream job.
//!
//! Steps run strictly in order and the first failure aborts the rest.
//! Completed steps are not compensated: an audit entry written before a
//! loyalty failure stays in place.

#![warn(clippy::all)]

pub mod ports;
pub mod process_purchase;

pub use ports::{BookingGateway, LoyaltyGateway};
pub use process_purchase::{
    ProcessOutcome, ProcessPurchase, ProcessPurchaseInput, PurchaseStatus, ReconcileMode,
};
