//! Minimal configuration loading for Stride.
//!
//! This crate provides configuration loading with minimal dependencies so
//! it can be imported by every Stride crate without dragging the engine's
//! dependency tree along.
//!
//! # Usage
//!
//! ```rust,no_run
//! use strideconf::StrideConfig;
//!
//! let config = StrideConfig::load().expect("Failed to load config");
//!
//! println!("tick interval: {:?}", config.session.tick_interval());
//! println!("log level: {}", config.telemetry.log_level);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/stride/config.toml` (system)
//! 2. `~/.config/stride/config.toml` (user)
//! 3. `./stride.toml` (local override)
//! 4. Environment variables (`STRIDE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [session]
//! tick_interval_ms = 100
//! metrics = ["heart_rate", "active_calories", "distance"]
//! update_buffer = 256
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;

pub use loader::{discover_config_files, discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Session engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Elapsed-time tick cadence in milliseconds.
    /// Default: 100
    #[serde(default = "SessionConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Metric kinds to request from the authorization and sample
    /// collaborators. Kinds the aggregator has no rule for are ignored
    /// at delivery time.
    /// Default: heart_rate, active_calories, distance
    #[serde(default = "SessionConfig::default_metrics")]
    pub metrics: Vec<String>,

    /// Capacity of the observer update channel. A lagging observer loses
    /// old updates rather than blocking the engine.
    /// Default: 256
    #[serde(default = "SessionConfig::default_update_buffer")]
    pub update_buffer: usize,
}

impl SessionConfig {
    fn default_tick_interval_ms() -> u64 {
        100
    }

    fn default_metrics() -> Vec<String> {
        vec![
            "heart_rate".to_string(),
            "active_calories".to_string(),
            "distance".to_string(),
        ]
    }

    fn default_update_buffer() -> usize {
        256
    }

    /// Tick cadence as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            metrics: Self::default_metrics(),
            update_buffer: Self::default_update_buffer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Complete Stride configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrideConfig {
    /// Session engine settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl StrideConfig {
    /// Load config from standard locations plus environment overlay.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::load_with_sources()?.0)
    }

    /// Load config and report where values came from.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        loader::load(None)
    }

    /// Load config with an explicit file taking the place of the local
    /// override (CLI `--config` flag).
    pub fn load_from(path: &std::path::Path) -> Result<(Self, ConfigSources), ConfigError> {
        loader::load(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StrideConfig::default();
        assert_eq!(config.session.tick_interval_ms, 100);
        assert_eq!(config.session.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.session.update_buffer, 256);
        assert_eq!(config.session.metrics.len(), 3);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: StrideConfig = toml::from_str(
            r#"
            [session]
            tick_interval_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.session.tick_interval_ms, 50);
        assert_eq!(config.session.update_buffer, 256);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_full_toml() {
        let config: StrideConfig = toml::from_str(
            r#"
            [session]
            tick_interval_ms = 250
            metrics = ["heart_rate"]
            update_buffer = 16

            [telemetry]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.tick_interval_ms, 250);
        assert_eq!(config.session.metrics, vec!["heart_rate"]);
        assert_eq!(config.session.update_buffer, 16);
        assert_eq!(config.telemetry.log_level, "debug");
    }
}
