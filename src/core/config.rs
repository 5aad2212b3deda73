//! Configuration management for redtrace.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable and CLI overrides (applied by the CLI)
//! - Validation and defaults

use crate::core::{RedtraceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for redtrace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
    /// Debug mode, overrides `logging.level` with `debug`
    #[serde(skip)]
    pub debug: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Retention window applied to every written key
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Upper bound on a single engine write
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Upper bound on a single engine read
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Maximum catalog rows returned by an operations lookup
    pub catalog_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record per-index read/write counters
    pub enabled: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            ttl: Duration::from_secs(60),
            write_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            catalog_limit: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        // The tracing host only captures warnings and above.
        LoggingConfig {
            level: LogLevel::Warn,
            structured: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig { enabled: true }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.ttl < Duration::from_secs(1) {
            return Err(RedtraceError::config(format!(
                "ttl must be at least one second, got {:?}",
                self.storage.ttl
            )));
        }

        if self.storage.write_timeout.is_zero() {
            return Err(RedtraceError::config("write_timeout must be greater than 0"));
        }

        if self.storage.read_timeout.is_zero() {
            return Err(RedtraceError::config("read_timeout must be greater than 0"));
        }

        if self.storage.catalog_limit == 0 {
            return Err(RedtraceError::config("catalog_limit must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| RedtraceError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub async fn from_file(self, path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RedtraceError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        self.from_yaml(&content)
    }

    /// Set the retention window
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.storage.ttl = ttl;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.storage.write_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.storage.read_timeout = timeout;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable or disable metrics
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.config.metrics.enabled = enabled;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
