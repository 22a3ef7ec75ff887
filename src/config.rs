use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::clients::ClientSettings;
use crate::retry::RetryConfig;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_SYNC_HEALTH_WINDOW_SECS: u64 = 900;
const DEFAULT_RATE_LIMIT_CAPACITY: u32 = 5;
const DEFAULT_RATE_LIMIT_REFILL_PER_SEC: f64 = 1.0;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_BUCKET_IDLE_PURGE_SECS: u64 = 3600;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Seconds between scheduled full syncs
    #[serde(default = "default_sync_interval_secs")]
    #[validate(range(min = 1, message = "sync_interval_secs must be at least 1"))]
    pub sync_interval_secs: u64,

    /// A channel counts as healthy when it synced within this many seconds
    #[serde(default = "default_sync_health_window_secs")]
    #[validate(range(min = 1, message = "sync_health_window_secs must be at least 1"))]
    pub sync_health_window_secs: u64,

    /// Token bucket capacity per channel
    #[serde(default = "default_rate_limit_capacity")]
    pub rate_limit_capacity: u32,

    /// Tokens refilled per second per channel
    #[serde(default = "default_rate_limit_refill_per_sec")]
    #[validate(custom = "validate_refill_rate")]
    pub rate_limit_refill_per_sec: f64,

    /// Attempts per remote push, including the first
    #[serde(default = "default_retry_max_attempts")]
    #[validate(range(min = 1, message = "retry_max_attempts must be at least 1"))]
    pub retry_max_attempts: u32,

    /// Constant backoff between retry attempts, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Bounded capacity of the in-process event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Rate limit buckets idle for longer than this are purged
    #[serde(default = "default_bucket_idle_purge_secs")]
    pub bucket_idle_purge_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            sync_interval_secs: default_sync_interval_secs(),
            sync_health_window_secs: default_sync_health_window_secs(),
            rate_limit_capacity: default_rate_limit_capacity(),
            rate_limit_refill_per_sec: default_rate_limit_refill_per_sec(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            bucket_idle_purge_secs: default_bucket_idle_purge_secs(),
        }
    }
}

impl AppConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn sync_health_window(&self) -> Duration {
        Duration::from_secs(self.sync_health_window_secs)
    }

    pub fn bucket_idle_purge(&self) -> Duration {
        Duration::from_secs(self.bucket_idle_purge_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            rate_limit_capacity: self.rate_limit_capacity,
            rate_limit_refill_per_second: self.rate_limit_refill_per_sec,
            retry: self.retry_config(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_sync_health_window_secs() -> u64 {
    DEFAULT_SYNC_HEALTH_WINDOW_SECS
}

fn default_rate_limit_capacity() -> u32 {
    DEFAULT_RATE_LIMIT_CAPACITY
}

fn default_rate_limit_refill_per_sec() -> f64 {
    DEFAULT_RATE_LIMIT_REFILL_PER_SEC
}

fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_bucket_idle_purge_secs() -> u64 {
    DEFAULT_BUCKET_IDLE_PURGE_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_refill_rate(rate: f64) -> Result<(), ValidationError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("rate_limit_refill_per_sec");
        err.message = Some("rate_limit_refill_per_sec must be a positive number".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter.
/// An explicit RUST_LOG always wins.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("stockpilot={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("sync_interval_secs", DEFAULT_SYNC_INTERVAL_SECS as i64)?
        .set_default(
            "sync_health_window_secs",
            DEFAULT_SYNC_HEALTH_WINDOW_SECS as i64,
        )?
        .set_default("rate_limit_capacity", DEFAULT_RATE_LIMIT_CAPACITY as i64)?
        .set_default(
            "rate_limit_refill_per_sec",
            DEFAULT_RATE_LIMIT_REFILL_PER_SEC,
        )?
        .set_default("retry_max_attempts", DEFAULT_RETRY_MAX_ATTEMPTS as i64)?
        .set_default("retry_backoff_ms", DEFAULT_RETRY_BACKOFF_MS as i64)?
        .set_default(
            "event_channel_capacity",
            DEFAULT_EVENT_CHANNEL_CAPACITY as i64,
        )?
        .set_default(
            "bucket_idle_purge_secs",
            DEFAULT_BUCKET_IDLE_PURGE_SECS as i64,
        )?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
