//! Upstream gateway ports consumed by the workflow.
//!
//! The workflow only needs one operation from each upstream adapter; these
//! traits name exactly that so tests can substitute fakes.

use async_trait::async_trait;

use relay_connectors::{BookingAdapter, LoyaltyAdapter};
use relay_domain::{AppResult, Purchase};

/// Loyalty program: receives every processed purchase.
#[async_trait]
pub trait LoyaltyGateway: Send + Sync {
    /// Forward a purchase.
    async fn create_purchase(&self, purchase: &Purchase) -> AppResult<()>;
}

/// Booking system: source of truth in source-augmented mode.
#[async_trait]
pub trait BookingGateway: Send + Sync {
    /// Fetch a purchase by its external id.
    async fn get_purchase(&self, external_purchase_id: &str) -> AppResult<Purchase>;
}

#[async_trait]
impl LoyaltyGateway for LoyaltyAdapter {
    async fn create_purchase(&self, purchase: &Purchase) -> AppResult<()> {
        LoyaltyAdapter::create_purchase(self, purchase).await
    }
}

#[async_trait]
impl BookingGateway for BookingAdapter {
    async fn get_purchase(&self, external_purchase_id: &str) -> AppResult<Purchase> {
        BookingAdapter::get_purchase(self, external_purchase_id).await
    }
}
