//! Configuration management
//!
//! Handles loading and validating exporter configuration from TOML files.
//! Every section is optional; defaults target a stock EC2 instance.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::sampler::TERMINATION_TIME_URL;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    /// Termination-time endpoint
    #[serde(default = "default_metadata_url")]
    pub url: String,
    /// Bound on the whole request in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: default_metadata_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Metrics server bind address
    #[serde(default = "default_metrics_addr")]
    pub bind_addr: SocketAddr,
    /// Export the exporter's own counters alongside the termination gauges
    #[serde(default = "default_true")]
    pub self_metrics: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_metrics_addr(),
            self_metrics: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_metadata_url() -> String { TERMINATION_TIME_URL.to_string() }
fn default_timeout_ms() -> u64 { 1000 }
fn default_metrics_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 9189)) }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.metadata.timeout_ms == 0 {
            anyhow::bail!("metadata.timeout_ms must be > 0");
        }
        let url = &self.metadata.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("metadata.url must be an http(s) URL, got {:?}", url);
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => anyhow::bail!("logging.format must be \"json\" or \"pretty\", got {:?}", other),
        }
        Ok(())
    }
}
