// Centralized configuration management for UGCPay Backend
// Load ALL env vars ONCE at startup

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Accessor for the global configuration
pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,

    // Redis (queue backing store)
    pub redis_url: String,
    pub redis_pool_size: u32,
    pub redis_connection_timeout: u64,
    pub redis_command_timeout: u64,
    pub redis_retry_attempts: u32,
    pub redis_retry_delay_ms: u64,

    // Features
    pub disable_embedded_migrations: bool,

    // Nested configs
    pub server: ServerConfig,
    pub payouts: PayoutConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,
}

/// Payout scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Five-field cron expression for the weekly payout run
    pub cron: String,
    /// How often the worker polls for due jobs, in seconds
    pub worker_poll_interval: u64,
    /// Attempts before a job is moved to the failed list
    pub max_attempts: u32,
    /// Delay between retry attempts, in seconds
    pub retry_delay: u64,
    /// Seconds a leased occurrence may run before it is reclaimed
    pub lease_timeout: u64,
    /// Completed job records retained for inspection
    pub remove_on_complete: usize,
    /// Failed job records retained for inspection
    pub remove_on_fail: usize,
    /// Whether this process runs the payout worker
    pub enable_worker: bool,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get required env var
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        // Helper function to parse env var with default
        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_usize_or_default = |key: &str, default: &str| -> Result<usize, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid usize".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        // Parse bind address to extract port
        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let environment_str = get_or_default("ENVIRONMENT", "development");
        let environment = Environment::from(environment_str);

        // Database
        let database_url = get_required("DATABASE_URL")?;
        let database_max_connections = parse_or_default("DATABASE_MAX_CONNECTIONS", "100")?;
        let database_min_connections = parse_or_default("DATABASE_MIN_CONNECTIONS", "10")?;
        let database_connect_timeout = parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?;
        let database_idle_timeout = parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?;
        let database_max_lifetime = parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?;

        // Redis
        let redis_url = get_or_default("REDIS_URL", "redis://localhost:6379");
        let redis_pool_size = parse_or_default("REDIS_POOL_SIZE", "10")?;
        let redis_connection_timeout = parse_u64_or_default("REDIS_CONNECTION_TIMEOUT", "5")?;
        let redis_command_timeout = parse_u64_or_default("REDIS_COMMAND_TIMEOUT", "5")?;
        let redis_retry_attempts = parse_or_default("REDIS_RETRY_ATTEMPTS", "3")?;
        let redis_retry_delay_ms = parse_u64_or_default("REDIS_RETRY_DELAY_MS", "100")?;

        // Payout scheduling. Cadence default is every Friday at 02:00 UTC.
        let payout_cron = get_or_default("PAYOUT_CRON", "0 2 * * 5");
        let payout_worker_poll_interval =
            parse_u64_or_default("PAYOUT_WORKER_POLL_INTERVAL_SECONDS", "30")?;
        let payout_max_attempts = parse_or_default("PAYOUT_JOB_MAX_ATTEMPTS", "5")?;
        let payout_retry_delay = parse_u64_or_default("PAYOUT_JOB_RETRY_DELAY_SECONDS", "300")?;
        let payout_lease_timeout = parse_u64_or_default("PAYOUT_JOB_LEASE_SECONDS", "600")?;
        let payout_remove_on_complete = parse_usize_or_default("PAYOUT_KEEP_COMPLETED", "20")?;
        let payout_remove_on_fail = parse_usize_or_default("PAYOUT_KEEP_FAILED", "50")?;
        let payout_enable_worker = parse_bool_or_default("PAYOUT_ENABLE_WORKER", "true");

        let disable_embedded_migrations =
            parse_bool_or_default("DISABLE_EMBEDDED_MIGRATIONS", "false");

        let rust_log = get_or_default("RUST_LOG", "info");

        let server = ServerConfig {
            bind_address: bind_address.clone(),
            port,
            environment: environment.clone(),
            rust_log: rust_log.clone(),
        };

        let payouts = PayoutConfig {
            cron: payout_cron,
            worker_poll_interval: payout_worker_poll_interval,
            max_attempts: payout_max_attempts,
            retry_delay: payout_retry_delay,
            lease_timeout: payout_lease_timeout,
            remove_on_complete: payout_remove_on_complete,
            remove_on_fail: payout_remove_on_fail,
            enable_worker: payout_enable_worker,
        };

        Ok(AppConfig {
            bind_address,
            port,
            environment,
            rust_log,
            database_url,
            database_max_connections,
            database_min_connections,
            database_connect_timeout,
            database_idle_timeout,
            database_max_lifetime,
            redis_url,
            redis_pool_size,
            redis_connection_timeout,
            redis_command_timeout,
            redis_retry_attempts,
            redis_retry_delay_ms,
            disable_embedded_migrations,
            server,
            payouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_common_aliases() {
        assert_eq!(
            Environment::from("prod".to_string()),
            Environment::Production
        );
        assert_eq!(Environment::from("dev".to_string()), Environment::Development);
        assert_eq!(
            Environment::from("anything-else".to_string()),
            Environment::Development
        );
    }

    #[test]
    fn environment_display_round_trips() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!(
            Environment::from(Environment::Staging.to_string()),
            Environment::Staging
        );
    }
}
