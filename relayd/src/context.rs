//! Application context.
//!
//! Wires executors, adapters, stores and the workflow once at startup. The
//! resulting context is shared by `Arc` with every request handler.

use std::sync::Arc;

use tracing::{info, warn};

use relay_connectors::{BookingAdapter, LoyaltyAdapter};
use relay_exec::{ExecutorConfig, HttpExecutor, RequestExecutor, StubTransport};
use relay_store::{AuditLog, MemoryAuditLog, MemoryPurchaseQueue, PurchaseQueue};
use relay_workflow::{ProcessPurchase, ReconcileMode};

use crate::config::{Config, Environment, UpstreamConfig};
use crate::error::{RelayError, RelayResult};

/// Shared application state.
pub struct AppContext {
    /// Loaded configuration
    pub config: Config,
    /// Purchase reconciliation workflow
    pub workflow: ProcessPurchase,
}

impl AppContext {
    /// Assemble a context from an already-built workflow.
    pub fn new(config: Config, workflow: ProcessPurchase) -> Self {
        Self { config, workflow }
    }

    /// Build the context described by `config`.
    ///
    /// The test environment runs against stub transports and in-memory
    /// stores; other environments talk to the configured upstreams.
    pub async fn build(config: Config) -> RelayResult<Self> {
        let loyalty = Arc::new(loyalty_adapter(&config, config.http.max_retries)?);
        let (audit, queue) = stores(&config).await?;

        let mut workflow = ProcessPurchase::new(loyalty, audit, queue);
        if config.reconcile_mode == ReconcileMode::SourceAugmented {
            let executor = executor(&config, config.booking.as_ref(), config.http.max_retries)?;
            let token = config.booking.as_ref().map(|b| b.token.clone()).unwrap_or_default();
            workflow = workflow.with_source(Arc::new(BookingAdapter::new(executor, token)));
        }

        info!(
            environment = %config.environment,
            mode = ?workflow.mode(),
            "Application context ready"
        );

        Ok(Self::new(config, workflow))
    }
}

/// Build a loyalty adapter with its own executor and retry budget.
pub fn loyalty_adapter(config: &Config, max_retries: u32) -> RelayResult<LoyaltyAdapter> {
    let executor = executor(config, config.loyalty.as_ref(), max_retries)?;
    let token = config.loyalty.as_ref().map(|l| l.token.clone()).unwrap_or_default();
    Ok(LoyaltyAdapter::new(executor, token))
}

fn executor(
    config: &Config,
    upstream: Option<&UpstreamConfig>,
    max_retries: u32,
) -> RelayResult<Arc<dyn RequestExecutor>> {
    match (config.environment, upstream) {
        (Environment::Test, upstream) => {
            let base_url = upstream.map(|u| u.base_url.as_str()).unwrap_or("http://stub.local");
            let exec_config = executor_config(config, base_url, max_retries);
            Ok(Arc::new(HttpExecutor::with_transport(exec_config, StubTransport::new())))
        },
        (_, Some(upstream)) => {
            let exec_config = executor_config(config, &upstream.base_url, max_retries);
            Ok(Arc::new(HttpExecutor::new(exec_config)?))
        },
        (_, None) => Err(RelayError::Config("upstream API is not configured".to_string())),
    }
}

fn executor_config(config: &Config, base_url: &str, max_retries: u32) -> ExecutorConfig {
    ExecutorConfig::new(base_url)
        .with_timeout(config.http.timeout)
        .with_max_retries(max_retries)
}

async fn stores(config: &Config) -> RelayResult<(Arc<dyn AuditLog>, Arc<dyn PurchaseQueue>)> {
    let in_memory = || -> (Arc<dyn AuditLog>, Arc<dyn PurchaseQueue>) {
        (
            Arc::new(MemoryAuditLog::new()),
            Arc::new(MemoryPurchaseQueue::new(config.queue.clone())),
        )
    };

    let Some(database) = config.database.as_ref() else {
        if config.environment != Environment::Test {
            warn!("DATABASE_URL not set, audit log and queue are in-memory");
        }
        return Ok(in_memory());
    };

    #[cfg(feature = "postgres")]
    {
        use relay_store::{PgAuditLog, PgPurchaseQueue, StoreError};

        let pool = sqlx::PgPool::connect(&database.url)
            .await
            .map_err(StoreError::from)?;
        info!(schema = %database.schema, "Connected to PostgreSQL");

        let audit = PgAuditLog::new(pool.clone(), &database.schema)?;
        let queue = PgPurchaseQueue::new(pool, &database.schema, config.queue.clone())?;
        Ok((Arc::new(audit), Arc::new(queue)))
    }

    #[cfg(not(feature = "postgres"))]
    {
        warn!(
            schema = %database.schema,
            "DATABASE_URL set but built without the postgres feature, using in-memory stores"
        );
        Ok(in_memory())
    }
}
