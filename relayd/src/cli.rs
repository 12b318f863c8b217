//! Buyer CLI subcommands for relayd.
//!
//! Provides `buyer register` and `buyer lookup`, talking to the loyalty
//! program through the same adapter the HTTP surface uses.

use anyhow::{anyhow, Result};
use tracing::{error, info};

use relay_connectors::RegisterBuyerPayload;
use relay_domain::AppError;

use crate::config::Config;
use crate::context::loyalty_adapter;

/// Retry budget for operator commands.
const CLI_MAX_RETRIES: u32 = 1;

/// Parsed `buyer` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyerCommand {
    /// Register a buyer, then confirm the registration
    Register {
        phone: String,
        name: Option<String>,
        external_id: Option<String>,
    },
    /// Report whether a buyer is registered
    Lookup { phone: String },
}

impl BuyerCommand {
    /// Parse `relayd buyer <register|lookup> ...` arguments.
    pub fn parse(args: &[String]) -> Result<Self> {
        let usage = || anyhow!("Usage: relayd buyer <register <phone> [name] [external_id]|lookup <phone>>");

        let sub = args.get(2).ok_or_else(usage)?;
        let phone = args.get(3).cloned().ok_or_else(usage)?;

        match sub.as_str() {
            "register" => Ok(BuyerCommand::Register {
                phone,
                name: args.get(4).cloned(),
                external_id: args.get(5).cloned(),
            }),
            "lookup" => Ok(BuyerCommand::Lookup { phone }),
            other => Err(anyhow!("Unknown buyer command: {}. Use register or lookup", other)),
        }
    }
}

/// Run buyer CLI subcommands.
///
/// Supported commands:
/// - `relayd buyer register <phone> [name] [external_id]` - Register and confirm
/// - `relayd buyer lookup <phone>` - Check registration status
pub async fn run_buyer_command(config: &Config, args: Vec<String>) -> Result<()> {
    let command = BuyerCommand::parse(&args)?;
    let adapter = loyalty_adapter(config, CLI_MAX_RETRIES)?;

    match command {
        BuyerCommand::Register {
            phone,
            name,
            external_id,
        } => {
            info!(phone = %phone, name = ?name, external_id = ?external_id, "Registering buyer");
            let payload = RegisterBuyerPayload {
                phone: Some(phone.clone()),
                name,
                external_id,
                ..RegisterBuyerPayload::default()
            };
            let response = adapter.register_buyer(&payload).await.map_err(report)?;
            info!(response = ?response, "Buyer registration answered");

            let registered = adapter.is_buyer_registered(&phone).await.map_err(report)?;
            info!(registered, "Registration status");
        },
        BuyerCommand::Lookup { phone } => {
            let registered = adapter.is_buyer_registered(&phone).await.map_err(report)?;
            info!(phone = %phone, registered, "Registration status");
        },
    }

    Ok(())
}

fn report(err: AppError) -> anyhow::Error {
    error!(
        code = %err.kind(),
        status = err.status_code(),
        details = ?err.details(),
        cause = ?err.cause().map(|c| c.to_string()),
        "Loyalty program request failed"
    );
    anyhow::Error::new(err)
}
