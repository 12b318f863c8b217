//! Purchase Relay Daemon
//!
//! Serves the purchase ingestion API, or runs an operator subcommand.
//!
//! # Usage
//!
//! ```bash
//! # Start the HTTP server
//! cargo run -p relayd
//!
//! # Start with stub upstreams on a custom port
//! RELAY_ENV=test RELAY_API_PORT=8081 cargo run -p relayd
//!
//! # Operator commands
//! cargo run -p relayd -- buyer register 89139393094 Dmitry
//! cargo run -p relayd -- buyer lookup 89139393094
//! cargo run -p relayd --features postgres -- db migrate
//! ```
//!
//! # Environment Variables
//!
//! - `RELAY_ENV`: Environment (test, development, production)
//! - `RELAY_PROFILE`: Deployment profile (local, dev, stage, prod)
//! - `RELAY_API_HOST`: API host (default: 0.0.0.0)
//! - `RELAY_API_PORT`: API port (default: 3000)
//! - `RELAY_RECONCILE_MODE`: direct or source (default: direct)
//! - `LOYALTY_API_BASE_URL`, `LOYALTY_API_TOKEN`: Loyalty program API
//! - `BOOKING_API_BASE_URL`, `BOOKING_API_TOKEN`: Booking system API
//! - `DATABASE_URL`: PostgreSQL for audit log and queue (feature `postgres`)

use std::sync::Arc;

use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relayd::{api, cli, AppContext, Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("db") {
        init_tracing(LogFormat::Text)?;
        return run_db(args).await;
    }

    // Load configuration
    let config = Config::from_env()?;
    init_tracing(config.observability.log_format)?;

    match args.get(1).map(String::as_str) {
        None | Some("serve") => serve(config).await,
        Some("buyer") => cli::run_buyer_command(&config, args).await,
        Some(other) => Err(anyhow!("Unknown command: {}. Use serve, buyer or db", other)),
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("relayd=info".parse()?)
        .add_directive("relay_workflow=info".parse()?)
        .add_directive("relay_connectors=info".parse()?)
        .add_directive("relay_exec=info".parse()?);

    let (json, text) = match format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Text => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(json)
        .with(text)
        .with(filter)
        .init();
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service_name,
        environment = %config.environment,
        profile = %config.profile,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Purchase Relay"
    );

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let context = Arc::new(AppContext::build(config).await?);
    let router = api::create_router(context);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to {}: {}", addr, e))?;
    info!(address = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}

#[cfg(feature = "postgres")]
async fn run_db(args: Vec<String>) -> anyhow::Result<()> {
    relayd::db::run_db_command(args).await
}

#[cfg(not(feature = "postgres"))]
async fn run_db(_args: Vec<String>) -> anyhow::Result<()> {
    Err(anyhow!("db commands require building with --features postgres"))
}
