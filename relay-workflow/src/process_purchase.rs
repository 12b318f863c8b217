//! Process Purchase use case.
//!
//! ```text
//! validate ─▶ resolve (direct | booking + overlay) ─▶ audit ─▶ loyalty ─▶ enqueue
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use relay_domain::{
    AppError, AppResult, AuditEntry, AuditSource, Buyer, Metadata, Purchase, PurchaseItem,
    PurchaseOverlay, QueueJob,
};
use relay_store::{AuditLog, PurchaseQueue};

use crate::ports::{BookingGateway, LoyaltyGateway};

// =============================================================================
// Input / Output
// =============================================================================

/// Caller-supplied purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPurchaseInput {
    /// Upstream identifier; also the queue job key
    pub external_purchase_id: String,
    /// Buyer identifier
    pub buyer_id: String,
    /// Total amount
    pub amount: Decimal,
    /// ISO 4217 currency
    pub currency: String,
    /// Line items (must be non-empty)
    pub items: Vec<PurchaseItem>,
    /// When the purchase happened
    pub purchased_at: DateTime<Utc>,
    /// Optional metadata
    pub metadata: Option<Metadata>,
}

impl ProcessPurchaseInput {
    fn into_purchase(self) -> Purchase {
        Purchase {
            id: self.external_purchase_id.clone(),
            external_id: self.external_purchase_id,
            buyer: Buyer { id: self.buyer_id },
            amount: self.amount,
            currency: self.currency,
            items: self.items,
            purchased_at: self.purchased_at,
            metadata: self.metadata,
        }
    }

    fn overlay(&self) -> PurchaseOverlay {
        PurchaseOverlay {
            buyer_id: self.buyer_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Terminal status of a processed purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Forwarded and enqueued
    Queued,
}

/// Successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    /// Final status
    pub status: PurchaseStatus,
}

/// How the purchase is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Built from caller input only
    Direct,
    /// Fetched from the booking system, then overlaid with caller input
    SourceAugmented,
}

// =============================================================================
// Use Case
// =============================================================================

/// Purchase reconciliation workflow.
pub struct ProcessPurchase {
    loyalty: Arc<dyn LoyaltyGateway>,
    audit: Arc<dyn AuditLog>,
    queue: Arc<dyn PurchaseQueue>,
    booking: Option<Arc<dyn BookingGateway>>,
}

impl ProcessPurchase {
    /// Workflow in direct mode.
    pub fn new(
        loyalty: Arc<dyn LoyaltyGateway>,
        audit: Arc<dyn AuditLog>,
        queue: Arc<dyn PurchaseQueue>,
    ) -> Self {
        Self {
            loyalty,
            audit,
            queue,
            booking: None,
        }
    }

    /// Switch to source-augmented mode, resolving purchases via `booking`.
    pub fn with_source(mut self, booking: Arc<dyn BookingGateway>) -> Self {
        self.booking = Some(booking);
        self
    }

    /// Active mode.
    pub fn mode(&self) -> ReconcileMode {
        if self.booking.is_some() {
            ReconcileMode::SourceAugmented
        } else {
            ReconcileMode::Direct
        }
    }

    /// Run the workflow.
    ///
    /// # Errors
    ///
    /// - `VALIDATION/400` when the request or the resolved purchase has no
    ///   items (nothing is audited, forwarded or queued)
    /// - booking and loyalty failures as classified upstream
    /// - `VALIDATION/409` when the purchase was already queued
    /// - `INTERNAL_ERROR/500` for storage failures
    pub async fn execute(&self, input: ProcessPurchaseInput) -> AppResult<ProcessOutcome> {
        let external_id = input.external_purchase_id.clone();

        let purchase = self.resolve(input).await?;
        debug!(external_id = %external_id, mode = ?self.mode(), "Purchase resolved");

        let entry = AuditEntry {
            purchase: purchase.clone(),
            source: AuditSource::Loyalty,
        };
        self.audit.append(&entry).await.map_err(|e| {
            warn!(external_id = %external_id, error = %e, "Audit append failed");
            AppError::internal("Failed to process purchase").with_cause(e)
        })?;

        self.loyalty.create_purchase(&purchase).await?;

        self.queue
            .enqueue(&QueueJob { purchase })
            .await
            .map_err(|e| {
                if e.is_duplicate() {
                    AppError::conflict("Purchase already queued").with_cause(e)
                } else {
                    AppError::internal("Failed to process purchase").with_cause(e)
                }
            })?;

        info!(external_id = %external_id, "Purchase queued");
        Ok(ProcessOutcome {
            status: PurchaseStatus::Queued,
        })
    }

    async fn resolve(&self, input: ProcessPurchaseInput) -> AppResult<Purchase> {
        if input.items.is_empty() {
            return Err(AppError::validation("Purchase items required"));
        }

        let purchase = match &self.booking {
            None => input.into_purchase(),
            Some(booking) => {
                let upstream = booking.get_purchase(&input.external_purchase_id).await?;
                upstream.overlay(input.overlay())
            },
        };

        // Upstream items replace the caller's in source mode
        if !purchase.has_items() {
            return Err(AppError::validation("Purchase items required"));
        }
        Ok(purchase)
    }
}

// =============================================================================
// Tests
// =============================================================================
