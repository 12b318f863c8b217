//! Purchase entity.
//!
//! A purchase is either built fresh from an inbound request or hydrated
//! from the booking system and then overlaid with request-supplied fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form purchase metadata (JSON object).
pub type Metadata = Map<String, Value>;

/// Buyer reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    /// Buyer identifier (phone number for the loyalty program)
    pub id: String,
}

/// Line item of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    /// Item identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Units bought (> 0)
    pub quantity: u32,
    /// Unit price (>= 0)
    pub price: Decimal,
}

/// Canonical purchase.
///
/// # Invariants
/// - `items` is non-empty (see [`Purchase::has_items`])
/// - `amount`/`currency` are not reconciled against the item sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    /// Internal identifier
    pub id: String,
    /// Identifier assigned by the upstream source (unique per source)
    pub external_id: String,
    /// Buyer reference
    pub buyer: Buyer,
    /// Total amount (> 0)
    pub amount: Decimal,
    /// ISO 4217 currency code
    pub currency: String,
    /// Line items
    pub items: Vec<PurchaseItem>,
    /// When the purchase happened
    pub purchased_at: DateTime<Utc>,
    /// Optional free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Request-supplied fields that take precedence over upstream data.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOverlay {
    /// Buyer id to force
    pub buyer_id: String,
    /// Amount to force
    pub amount: Decimal,
    /// Currency to force
    pub currency: String,
    /// Metadata merged over the upstream metadata
    pub metadata: Option<Metadata>,
}

impl Purchase {
    /// True when the purchase carries at least one item.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Apply request-supplied fields on top of this purchase.
    ///
    /// Amount, currency and buyer are replaced unconditionally. Metadata is
    /// shallow-merged with this purchase's metadata as the base; overlay keys
    /// win on conflict.
    pub fn overlay(mut self, overlay: PurchaseOverlay) -> Self {
        self.amount = overlay.amount;
        self.currency = overlay.currency;
        self.buyer = Buyer { id: overlay.buyer_id };
        self.metadata = merge_metadata(self.metadata.take(), overlay.metadata);
        self
    }
}

/// Shallow merge: keys from `overlay` replace keys from `base`.
pub fn merge_metadata(base: Option<Metadata>, overlay: Option<Metadata>) -> Option<Metadata> {
    match (base, overlay) {
        (None, None) => None,
        (Some(base), None) => Some(base),
        (None, Some(overlay)) => Some(overlay),
        (Some(mut base), Some(overlay)) => {
            base.extend(overlay);
            Some(base)
        },
    }
}

// =============================================================================
// Tests
// =============================================================================
