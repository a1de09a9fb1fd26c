//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use std::time::Duration;
use tourney_engine::broadcast::{DEFAULT_INBOX_CAPACITY, DEFAULT_VIEWER_QUEUE_CAPACITY};
use tourney_engine::db::DatabaseConfig;
use tourney_engine::lifecycle::{DEFAULT_LIFECYCLE_LOCK_KEY, DEFAULT_SWEEP_INTERVAL};

const DEFAULT_PORT: u16 = 6969;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP/WebSocket bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Lifecycle scheduler configuration
    pub lifecycle: LifecycleConfig,
    /// Broadcast hub configuration
    pub broadcast: BroadcastConfig,
    /// Prometheus scrape address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
}

/// Lifecycle sweep settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Time between sweeps
    pub sweep_interval: Duration,
    /// Advisory lock key shared by every replica
    pub lock_key: i64,
}

/// Broadcast hub settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Capacity of the hub's inbox
    pub inbox_capacity: usize,
    /// Per-viewer outbound queue; a viewer that falls this far behind is dropped
    pub viewer_queue_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            lock_key: DEFAULT_LIFECYCLE_LOCK_KEY,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            viewer_queue_capacity: DEFAULT_VIEWER_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND", std::env::var("SERVER_BIND").ok())?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database = database.with_url(url);
        }

        let lifecycle = LifecycleConfig {
            sweep_interval: Duration::from_secs(parse_env_or(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL.as_secs(),
            )),
            lock_key: parse_env_or("LIFECYCLE_LOCK_KEY", DEFAULT_LIFECYCLE_LOCK_KEY),
        };

        let broadcast = BroadcastConfig {
            inbox_capacity: parse_env_or("HUB_INBOX_CAPACITY", DEFAULT_INBOX_CAPACITY),
            viewer_queue_capacity: parse_env_or(
                "VIEWER_QUEUE_CAPACITY",
                DEFAULT_VIEWER_QUEUE_CAPACITY,
            ),
        };

        let metrics_bind = parse_addr("METRICS_BIND", std::env::var("METRICS_BIND").ok())?;

        Ok(ServerConfig {
            bind,
            database,
            lifecycle,
            broadcast,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SWEEP_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.broadcast.inbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "HUB_INBOX_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.broadcast.viewer_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "VIEWER_QUEUE_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: format!(
                    "Must be at least DB_MIN_CONNECTIONS ({})",
                    self.database.min_connections
                ),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server bind address ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// Unlike numeric settings, a malformed address is an error rather than a default
fn parse_addr(var: &str, value: Option<String>) -> Result<Option<SocketAddr>, ConfigError> {
    value
        .map(|raw| {
            raw.parse().map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                reason: format!("'{raw}' is not an IP:PORT address"),
            })
        })
        .transpose()
}
