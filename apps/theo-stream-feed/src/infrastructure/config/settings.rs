//! Feed Configuration Settings
//!
//! Configuration types for the theo stream feed, loaded from environment
//! variables.

use std::time::Duration;

use crate::infrastructure::batch::BatchConfig;
use crate::infrastructure::stream::framing::DEFAULT_MAX_FRAME_BYTES;

/// Bar consolidation settings.
#[derive(Debug, Clone, Copy)]
pub struct ConsolidationSettings {
    /// Window length for consolidated subscriptions.
    pub period: Duration,
    /// Interval between clock-driven window scans.
    pub scan_interval: Duration,
}

impl Default for ConsolidationSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            scan_interval: Duration::from_secs(1),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { metrics_port: 9090 }
    }
}

/// Complete feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upstream theo server endpoint (`host:port`).
    pub endpoint: String,
    /// Maximum accepted frame payload size in bytes.
    pub max_frame_bytes: usize,
    /// Batch drain cadence and budgets.
    pub batch: BatchConfig,
    /// Consolidation window settings.
    pub consolidation: ConsolidationSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Underlyings to chain-subscribe at startup.
    pub underlyings: Vec<String>,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `THEO_SERVER` is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint =
            std::env::var("THEO_SERVER").unwrap_or_else(|_| "localhost:50051".to_string());

        if endpoint.is_empty() {
            return Err(ConfigError::EmptyValue("THEO_SERVER".to_string()));
        }
        if !endpoint.contains(':') {
            return Err(ConfigError::InvalidEndpoint(endpoint));
        }

        let batch_defaults = BatchConfig::default();
        let batch = BatchConfig {
            tick_interval: parse_env_duration_millis(
                "THEO_FEED_BATCH_INTERVAL_MS",
                batch_defaults.tick_interval,
            ),
            time_budget: parse_env_duration_millis(
                "THEO_FEED_BATCH_TIME_BUDGET_MS",
                batch_defaults.time_budget,
            ),
            max_items: parse_env_usize("THEO_FEED_BATCH_MAX_ITEMS", batch_defaults.max_items),
        };

        let consolidation = ConsolidationSettings {
            period: parse_env_duration_secs(
                "THEO_FEED_CONSOLIDATION_SECS",
                ConsolidationSettings::default().period,
            ),
            scan_interval: parse_env_duration_secs(
                "THEO_FEED_SCAN_INTERVAL_SECS",
                ConsolidationSettings::default().scan_interval,
            ),
        };

        let server = ServerSettings {
            metrics_port: parse_env_u16(
                "THEO_FEED_METRICS_PORT",
                ServerSettings::default().metrics_port,
            ),
        };

        let underlyings = std::env::var("THEO_FEED_UNDERLYINGS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_uppercase)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            endpoint,
            max_frame_bytes: parse_env_usize("THEO_FEED_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
            batch,
            consolidation,
            server,
            underlyings,
        })
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:50051".to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            batch: BatchConfig::default(),
            consolidation: ConsolidationSettings::default(),
            server: ServerSettings::default(),
            underlyings: Vec::new(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Endpoint is not of the form `host:port`.
    #[error("invalid endpoint (expected host:port): {0}")]
    InvalidEndpoint(String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
