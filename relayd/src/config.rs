//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Parsing goes through a lookup function so it can be exercised without
//! touching the process environment.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use relay_store::QueueOptions;
use relay_workflow::ReconcileMode;

use crate::error::{RelayError, RelayResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment (test, development, production)
    pub environment: Environment,
    /// Deployment profile (local, dev, stage, prod)
    pub profile: Profile,
    /// Service name reported in logs
    pub service_name: String,
    /// API server configuration
    pub api: ApiConfig,
    /// Security settings
    pub security: SecurityConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// How purchases are resolved
    pub reconcile_mode: ReconcileMode,
    /// Loyalty API (absent only in test)
    pub loyalty: Option<UpstreamConfig>,
    /// Booking API (required in source mode outside test)
    pub booking: Option<UpstreamConfig>,
    /// Outbound HTTP settings
    pub http: HttpClientConfig,
    /// PostgreSQL settings; in-memory stores when absent
    pub database: Option<DatabaseConfig>,
    /// Queue delivery options
    pub queue: QueueOptions,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Security settings.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// CORS origins; empty disables CORS headers
    pub allowed_origins: Vec<String>,
    /// Hide 5xx messages and details from clients
    pub mask_error_details: bool,
    /// HMAC secret for inbound purchase signatures
    pub webhook_secret: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Output format
    pub log_format: LogFormat,
    /// Per-request access logging
    pub request_logging: RequestLogging,
}

/// Upstream API endpoint and credential.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Base URL
    pub base_url: String,
    /// Access token
    pub token: String,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .finish()
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retry budget
    pub max_retries: u32,
}

/// PostgreSQL settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Schema holding the audit and job tables
    pub schema: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"***")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

/// Deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Developer machine
    Local,
    /// Shared development
    Dev,
    /// Staging
    Stage,
    /// Production
    Prod,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable
    Text,
    /// One JSON object per line
    Json,
}

/// Access logging mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestLogging {
    /// Log every request
    Standard,
    /// No access log
    Silent,
}

impl Profile {
    /// Whether 5xx error messages and details are hidden from clients.
    pub fn mask_error_details(&self) -> bool {
        !matches!(self, Profile::Local)
    }

    /// Access logging mode for this profile.
    pub fn request_logging(&self) -> RequestLogging {
        match self {
            Profile::Prod => RequestLogging::Silent,
            _ => RequestLogging::Standard,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> RelayResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> RelayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = parse_choice(
            "RELAY_ENV",
            var("RELAY_ENV").as_deref().unwrap_or("development"),
        )?;
        let profile = parse_choice("RELAY_PROFILE", var("RELAY_PROFILE").as_deref().unwrap_or("local"))?;

        let api = ApiConfig {
            host: var("RELAY_API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number("RELAY_API_PORT", var("RELAY_API_PORT"), 3000)?,
        };

        let log_format = match var("RELAY_LOG_FORMAT") {
            Some(raw) => parse_choice("RELAY_LOG_FORMAT", &raw)?,
            None if profile == Profile::Prod => LogFormat::Json,
            None => LogFormat::Text,
        };

        let reconcile_mode = match var("RELAY_RECONCILE_MODE").as_deref().unwrap_or("direct") {
            "direct" => ReconcileMode::Direct,
            "source" | "source-augmented" => ReconcileMode::SourceAugmented,
            other => {
                return Err(RelayError::Config(format!(
                    "Invalid RELAY_RECONCILE_MODE: {}. Expected: direct, source",
                    other
                )))
            },
        };

        let loyalty = upstream(&var, "LOYALTY_API_BASE_URL", "LOYALTY_API_TOKEN")?;
        let booking = upstream(&var, "BOOKING_API_BASE_URL", "BOOKING_API_TOKEN")?;

        if environment != Environment::Test {
            if loyalty.is_none() {
                return Err(RelayError::Config(
                    "LOYALTY_API_BASE_URL and LOYALTY_API_TOKEN are required".to_string(),
                ));
            }
            if reconcile_mode == ReconcileMode::SourceAugmented && booking.is_none() {
                return Err(RelayError::Config(
                    "BOOKING_API_BASE_URL and BOOKING_API_TOKEN are required in source mode"
                        .to_string(),
                ));
            }
        }

        let http = HttpClientConfig {
            timeout: Duration::from_millis(parse_number(
                "RELAY_HTTP_TIMEOUT_MS",
                var("RELAY_HTTP_TIMEOUT_MS"),
                5000,
            )?),
            max_retries: parse_number("RELAY_HTTP_MAX_RETRIES", var("RELAY_HTTP_MAX_RETRIES"), 3)?,
        };

        let database = var("DATABASE_URL").map(|url| DatabaseConfig {
            url,
            schema: var("POSTGRES_SCHEMA").unwrap_or_else(|| "public".to_string()),
        });

        let defaults = QueueOptions::default();
        let queue = QueueOptions {
            queue_name: var("QUEUE_NAME").unwrap_or(defaults.queue_name),
            max_attempts: parse_number("QUEUE_ATTEMPTS", var("QUEUE_ATTEMPTS"), defaults.max_attempts)?,
            backoff_delay_ms: parse_number(
                "QUEUE_BACKOFF_DELAY_MS",
                var("QUEUE_BACKOFF_DELAY_MS"),
                defaults.backoff_delay_ms,
            )?,
        };

        Ok(Self {
            environment,
            profile,
            service_name: var("RELAY_SERVICE_NAME").unwrap_or_else(|| "purchase-relay".to_string()),
            api,
            security: SecurityConfig {
                allowed_origins: var("RELAY_ALLOWED_ORIGINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(str::trim)
                            .filter(|origin| !origin.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                mask_error_details: profile.mask_error_details(),
                webhook_secret: var("RELAY_WEBHOOK_SECRET"),
            },
            observability: ObservabilityConfig {
                log_format,
                request_logging: profile.request_logging(),
            },
            reconcile_mode,
            loyalty,
            booking,
            http,
            database,
            queue,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            profile: Profile::Local,
            service_name: "purchase-relay".to_string(),
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            security: SecurityConfig {
                allowed_origins: Vec::new(),
                mask_error_details: false,
                webhook_secret: None,
            },
            observability: ObservabilityConfig {
                log_format: LogFormat::Text,
                request_logging: RequestLogging::Silent,
            },
            reconcile_mode: ReconcileMode::Direct,
            loyalty: None,
            booking: None,
            http: HttpClientConfig {
                timeout: Duration::from_millis(5000),
                max_retries: 3,
            },
            database: None,
            queue: QueueOptions::default(),
        }
    }
}

fn upstream<F>(var: &F, url_key: &str, token_key: &str) -> RelayResult<Option<UpstreamConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    match (var(url_key), var(token_key)) {
        (Some(base_url), Some(token)) => Ok(Some(UpstreamConfig { base_url, token })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(RelayError::Config(format!("{} is set but {} is missing", url_key, token_key))),
        (None, Some(_)) => Err(RelayError::Config(format!("{} is set but {} is missing", token_key, url_key))),
    }
}

fn parse_number<T: FromStr>(key: &str, raw: Option<String>, default: T) -> RelayResult<T> {
    match raw {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|_| RelayError::Config(format!("Invalid {} value: {}", key, val))),
        None => Ok(default),
    }
}

fn parse_choice<T>(key: &str, raw: &str) -> RelayResult<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|expected| RelayError::Config(format!("Invalid {}: {}. Expected: {}", key, raw, expected)))
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err("test, development, production".to_string()),
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Profile::Local),
            "dev" => Ok(Profile::Dev),
            "stage" => Ok(Profile::Stage),
            "prod" => Ok(Profile::Prod),
            _ => Err("local, dev, stage, prod".to_string()),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err("text, json".to_string()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Local => write!(f, "local"),
            Profile::Dev => write!(f, "dev"),
            Profile::Stage => write!(f, "stage"),
            Profile::Prod => write!(f, "prod"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> RelayResult<Config> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const LOYALTY: [(&str, &str); 2] = [
        ("LOYALTY_API_BASE_URL", "https://loyalty.example.com"),
        ("LOYALTY_API_TOKEN", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&LOYALTY).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.profile, Profile::Local);
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.service_name, "purchase-relay");
        assert_eq!(config.reconcile_mode, ReconcileMode::Direct);
        assert_eq!(config.http.timeout, Duration::from_millis(5000));
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.queue, QueueOptions::default());
        assert!(!config.security.mask_error_details);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_profile_settings() {
        assert!(!Profile::Local.mask_error_details());
        assert!(Profile::Dev.mask_error_details());
        assert!(Profile::Stage.mask_error_details());
        assert!(Profile::Prod.mask_error_details());

        assert_eq!(Profile::Stage.request_logging(), RequestLogging::Standard);
        assert_eq!(Profile::Prod.request_logging(), RequestLogging::Silent);
    }

    #[test]
    fn test_prod_profile_defaults_to_json_logs() {
        let mut vars = LOYALTY.to_vec();
        vars.push(("RELAY_PROFILE", "prod"));

        let config = load(&vars).unwrap();

        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.request_logging, RequestLogging::Silent);
        assert!(config.security.mask_error_details);
    }

    #[test]
    fn test_loyalty_required_outside_test() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));

        let config = load(&[("RELAY_ENV", "test")]).unwrap();
        assert!(config.loyalty.is_none());
    }

    #[test]
    fn test_source_mode_requires_booking() {
        let mut vars = LOYALTY.to_vec();
        vars.push(("RELAY_RECONCILE_MODE", "source"));
        assert!(load(&vars).is_err());

        vars.push(("BOOKING_API_BASE_URL", "https://booking.example.com"));
        vars.push(("BOOKING_API_TOKEN", "b"));
        let config = load(&vars).unwrap();
        assert_eq!(config.reconcile_mode, ReconcileMode::SourceAugmented);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        for (key, value) in [
            ("RELAY_API_PORT", "eighty"),
            ("RELAY_ENV", "staging"),
            ("RELAY_PROFILE", "qa"),
            ("RELAY_LOG_FORMAT", "xml"),
            ("RELAY_RECONCILE_MODE", "magic"),
            ("QUEUE_ATTEMPTS", "-1"),
        ] {
            let mut vars = LOYALTY.to_vec();
            vars.push((key, value));
            assert!(load(&vars).is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn test_allowed_origins_split() {
        let mut vars = LOYALTY.to_vec();
        vars.push(("RELAY_ALLOWED_ORIGINS", "https://a.io, https://b.io,,"));

        let config = load(&vars).unwrap();

        assert_eq!(config.security.allowed_origins, vec!["https://a.io", "https://b.io"]);
    }

    #[test]
    fn test_half_configured_upstream_rejected() {
        let err = load(&[("RELAY_ENV", "test"), ("BOOKING_API_TOKEN", "b")]).unwrap_err();
        assert!(err.to_string().contains("BOOKING_API_BASE_URL"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load(&LOYALTY).unwrap();
        let rendered = format!("{:?}", config.loyalty);

        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
    }
}
