//! Worker configuration.
//!
//! All settings come from the environment with sensible defaults, except the
//! transport URL which is required. Values are validated before the worker
//! starts so a bad deployment fails fast instead of at the first message.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the enrichment worker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL for the queue transport.
    pub redis_url: String,
    /// Name of the inbound scrape-target queue.
    pub scrape_queue: String,
    /// Name of the outbound scraped-article queue.
    pub scraped_queue: String,
    /// Number of worker tasks in the pool.
    pub num_workers: usize,
    /// How long a single inbound pop blocks before returning empty.
    pub poll_interval: Duration,
    /// Upper bound on one network scrape attempt.
    pub scrape_timeout: Duration,
    /// File touched periodically while the transport is connected.
    pub heartbeat_file: PathBuf,
    /// Interval between heartbeat emissions.
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            scrape_queue: "scrape_targets".to_string(),
            scraped_queue: "scraped_articles".to_string(),
            num_workers: 5,
            poll_interval: Duration::from_secs(5),
            scrape_timeout: Duration::from_secs(30),
            heartbeat_file: PathBuf::from("/tmp/scraperank-heartbeat"),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (required)
    /// - `SCRAPE_QUEUE`: inbound queue name (default: scrape_targets)
    /// - `SCRAPED_QUEUE`: outbound queue name (default: scraped_articles)
    /// - `NUM_WORKERS`: worker pool size (default: 5)
    /// - `POLL_INTERVAL_SECS`: inbound pop timeout (default: 5)
    /// - `SCRAPE_TIMEOUT_SECS`: network scrape deadline (default: 30)
    /// - `HEARTBEAT_FILE`: liveness file path (default: /tmp/scraperank-heartbeat)
    /// - `HEARTBEAT_INTERVAL_SECS`: liveness interval (default: 10)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `REDIS_URL` is missing or any value fails to
    /// parse or validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.redis_url = std::env::var("REDIS_URL")
            .map_err(|_| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?;

        if let Ok(val) = std::env::var("SCRAPE_QUEUE") {
            config.scrape_queue = val;
        }

        if let Ok(val) = std::env::var("SCRAPED_QUEUE") {
            config.scraped_queue = val;
        }

        if let Ok(val) = std::env::var("NUM_WORKERS") {
            config.num_workers = parse_env_value(&val, "NUM_WORKERS")?;
        }

        if let Ok(val) = std::env::var("POLL_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "POLL_INTERVAL_SECS")?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("SCRAPE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "SCRAPE_TIMEOUT_SECS")?;
            config.scrape_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("HEARTBEAT_FILE") {
            config.heartbeat_file = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("HEARTBEAT_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "HEARTBEAT_INTERVAL_SECS")?;
            config.heartbeat_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if self.scrape_queue.is_empty() || self.scraped_queue.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "queue names cannot be empty".to_string(),
            ));
        }

        if self.scrape_queue == self.scraped_queue {
            return Err(ConfigError::ValidationFailed(
                "inbound and outbound queues must differ".to_string(),
            ));
        }

        if self.num_workers == 0 {
            return Err(ConfigError::ValidationFailed(
                "num_workers must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be at least 1 second".to_string(),
            ));
        }

        if self.scrape_timeout.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "scrape_timeout must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_interval.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the number of workers.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Builder method to set the queue names.
    pub fn with_queues(mut self, scrape: impl Into<String>, scraped: impl Into<String>) -> Self {
        self.scrape_queue = scrape.into();
        self.scraped_queue = scraped.into();
        self
    }

    /// Builder method to set the scrape timeout.
    pub fn with_scrape_timeout(mut self, timeout: Duration) -> Self {
        self.scrape_timeout = timeout;
        self
    }
}

/// Parses an environment variable value into the target type.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
