//! Database lifecycle management for Purchase Relay.
//!
//! Provides migration running and status checking for the audit and job
//! queue tables. Migrations are applied inside the configured schema, the
//! same one the PostgreSQL stores write to.

use sqlx::{PgPool, Row};
use tracing::{info, warn};

use relay_store::validate_schema;

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Statements preparing a migration connection for `schema`.
fn schema_setup(schema: &str) -> Result<[String; 2]> {
    validate_schema(schema)?;
    Ok([
        format!("CREATE SCHEMA IF NOT EXISTS {}", schema),
        format!("SET search_path TO {}", schema),
    ])
}

/// Run all pending migrations into `schema`.
///
/// Uses sqlx migrations from the workspace `migrations` directory. The
/// schema is created when missing, and the migration bookkeeping table
/// lives alongside the tables it tracks.
/// Idempotent: safe to run multiple times.
pub async fn migrate(pool: &PgPool, schema: &str) -> Result<()> {
    info!(schema, "Running database migrations...");

    let mut conn = pool.acquire().await?;
    for statement in schema_setup(schema)? {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }

    let outcome = sqlx::migrate!("../migrations").run(&mut *conn).await;

    // The connection goes back to the pool; do not leak the search path
    sqlx::query("RESET search_path").execute(&mut *conn).await?;
    outcome?;

    info!(schema, "Migrations completed successfully");
    Ok(())
}

/// Check database connectivity and migration status.
///
/// Logs the latest applied migrations in `schema`, or a hint when none are
/// applied.
pub async fn status(pool: &PgPool, schema: &str) -> Result<()> {
    validate_schema(schema)?;

    let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if result != 1 {
        return Err(anyhow::anyhow!("Database connectivity check failed"));
    }

    info!("Database connectivity: OK");

    // Runtime query: sqlx::query! would need a database at compile time
    let rows = sqlx::query(&format!(
        r#"
        SELECT version, description, installed_on::text AS installed_on, success
        FROM {}._sqlx_migrations
        ORDER BY version DESC
        LIMIT 10
        "#,
        schema
    ))
    .fetch_all(pool)
    .await;

    match rows {
        Ok(migrations) if !migrations.is_empty() => {
            info!("Latest migrations:");
            for migration in migrations {
                let version: i64 = migration.try_get("version")?;
                let description: String = migration.try_get("description")?;
                let installed_on: Option<String> = migration.try_get("installed_on")?;
                let success: bool = migration.try_get("success")?;

                info!(
                    version,
                    description = %description,
                    installed_on = installed_on.as_deref().unwrap_or("N/A"),
                    success,
                    "Migration applied"
                );
            }
        },
        Ok(_) => {
            warn!("No migrations found in database (run `relayd db migrate` first)");
        },
        Err(e) => {
            // Table might not exist yet
            if e.to_string().contains("_sqlx_migrations") {
                warn!("Migration table not found (run `relayd db migrate` first)");
            } else {
                return Err(e.into());
            }
        },
    }

    Ok(())
}
