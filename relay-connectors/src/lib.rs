//! Purchase Relay Upstream Connectors
//!
//! Adapters for the loyalty program API and the booking system API.
//! Translate between upstream wire shapes and domain types; every call goes
//! through a `relay_exec::RequestExecutor`.

#![warn(clippy::all)]

pub mod booking;
pub mod loyalty;

pub use booking::BookingAdapter;
pub use loyalty::{
    normalize_phone, Gender, LoyaltyAdapter, RegisterBuyerPayload, RegisterBuyerResponse,
};
