//! Controller configuration
//!
//! Defines all configurable parameters for the controller including the
//! API server connection, resync cadence, and requeue backoff bounds.

use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this controller instance
    pub controller_id: String,

    /// API server base URL (e.g., "http://localhost:8080")
    pub api_url: String,

    /// How often the watcher relists all records
    pub resync_interval: Duration,

    /// Delay before the first retry of a requeued key
    pub backoff_initial: Duration,

    /// Cap on the requeue backoff
    pub backoff_max: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(controller_id: String, api_url: String) -> Self {
        Self {
            controller_id,
            api_url,
            resync_interval: Duration::from_secs(30),
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - API_URL (required)
    /// - CONTROLLER_ID (optional, default: random uuid)
    /// - RESYNC_INTERVAL (optional, seconds, default: 30)
    /// - BACKOFF_INITIAL_MS (optional, default: 500)
    /// - BACKOFF_MAX_MS (optional, default: 30000)
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("API_URL")
            .map_err(|_| anyhow::anyhow!("API_URL environment variable not set"))?;

        let controller_id = std::env::var("CONTROLLER_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let resync_interval = std::env::var("RESYNC_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let backoff_initial = std::env::var("BACKOFF_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));

        let backoff_max = std::env::var("BACKOFF_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            controller_id,
            api_url,
            resync_interval,
            backoff_initial,
            backoff_max,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.controller_id.is_empty() {
            anyhow::bail!("controller_id cannot be empty");
        }

        if self.api_url.is_empty() {
            anyhow::bail!("api_url cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.resync_interval.as_secs() == 0 {
            anyhow::bail!("resync_interval must be greater than 0");
        }

        if self.backoff_initial.is_zero() {
            anyhow::bail!("backoff_initial must be greater than 0");
        }

        if self.backoff_initial > self.backoff_max {
            anyhow::bail!("backoff_initial cannot exceed backoff_max");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            "http://localhost:8080".to_string(),
        )
    }
}
