//! Purchase Relay Daemon Library
//!
//! Composition root and HTTP surface for the purchase relay.
//!
//! # Architecture
//!
//! ```text
//! HTTP → trace context → purchase handler → ProcessPurchase
//!                                              ├─▶ Booking API   (source mode)
//!                                              ├─▶ Audit log
//!                                              ├─▶ Loyalty API
//!                                              └─▶ Purchase queue
//! ```
//!
//! # Components
//!
//! - **Config**: Environment-based configuration
//! - **AppContext**: Executors, adapters, stores and workflow, built once
//! - **API**: Health checks and purchase ingestion
//! - **CLI**: Operator commands for buyers and the database
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relayd::{api, AppContext, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let context = Arc::new(AppContext::build(Config::from_env()?).await?);
//!     let router = api::create_router(context);
//!     // serve router ...
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
#[cfg(feature = "postgres")]
pub mod db;
pub mod dto;
pub mod error;
pub mod signature;
pub mod trace;

// Re-exports for convenience
pub use config::{
    ApiConfig, Config, DatabaseConfig, Environment, HttpClientConfig, LogFormat, Profile,
    RequestLogging, UpstreamConfig,
};
pub use context::AppContext;
pub use error::{RelayError, RelayResult};
