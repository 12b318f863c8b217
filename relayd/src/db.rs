//! Database CLI subcommands for relayd.
//!
//! Provides `db migrate` and `db status` commands.

use anyhow::{anyhow, Result};
use std::env;

use relay_db::{migrate, status};

/// Run database CLI subcommands.
///
/// Supported commands:
/// - `relayd db migrate` - Run pending migrations
/// - `relayd db status` - Check connectivity and migration status
pub async fn run_db_command(args: Vec<String>) -> Result<()> {
    if args.len() < 3 {
        return Err(anyhow!("Usage: relayd db <migrate|status>"));
    }

    // Load .env file if present (ignore errors)
    let _ = dotenvy::dotenv();

    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow!("DATABASE_URL environment variable is required for db commands"))?;

    // Must match the schema the stores write to (see Config)
    let schema = env::var("POSTGRES_SCHEMA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "public".to_string());

    let pool = sqlx::PgPool::connect(&database_url).await?;

    match args[2].as_str() {
        "migrate" => migrate(&pool, &schema).await?,
        "status" => status(&pool, &schema).await?,
        other => {
            return Err(anyhow!("Unknown db command: {}. Use migrate or status", other));
        },
    }

    Ok(())
}
