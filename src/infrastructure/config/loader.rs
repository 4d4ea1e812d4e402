//! Layered configuration loading and validation.

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Default project config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "deskbridge.yaml";

/// Prefix of environment overrides, e.g. `DESKBRIDGE_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "DESKBRIDGE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `server.host` is empty.
    #[error("Server host cannot be empty")]
    EmptyHost,

    /// `server.port` is zero.
    #[error("Invalid port: 0")]
    InvalidPort,

    /// `stream.heartbeat_interval_ms` is zero.
    #[error("Invalid heartbeat_interval_ms: {0}. Must be at least 1")]
    InvalidHeartbeatInterval(u64),

    /// `stream.max_dispatch_per_tick` is zero.
    #[error("Invalid max_dispatch_per_tick: {0}. Must be at least 1")]
    InvalidMaxDispatch(usize),

    /// A display dimension is zero.
    #[error("Invalid display size: {0}x{1}. Both dimensions must be positive")]
    InvalidDisplaySize(u32, u32),

    /// A seeded window is degenerate.
    #[error("Invalid window '{title}': {reason}")]
    InvalidWindow {
        /// Title of the seeded window.
        title: String,
        /// What is wrong with it.
        reason: String,
    },

    /// `desktop.screenshot_path` is empty.
    #[error("Screenshot path cannot be empty")]
    EmptyScreenshotPath,

    /// Unknown `logging.level`.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown `logging.format`.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `deskbridge.yaml` in the working directory (optional)
    /// 3. Environment variables (`DESKBRIDGE_*` prefix, `__` between sections)
    pub fn load() -> Result<Config> {
        Self::load_with(None)
    }

    /// Like [`load`](Self::load), with an explicit file in place of
    /// `deskbridge.yaml`. An explicit file must exist.
    pub fn load_with(path: Option<&Path>) -> Result<Config> {
        let file = match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("Config file not found: {}", path.display());
                }
                Yaml::file(path)
            }
            None => Yaml::file(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if config.stream.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeatInterval(0));
        }
        if config.stream.max_dispatch_per_tick == 0 {
            return Err(ConfigError::InvalidMaxDispatch(0));
        }

        let display = &config.display;
        if display.width == 0 || display.height == 0 {
            return Err(ConfigError::InvalidDisplaySize(display.width, display.height));
        }
        for window in &display.windows {
            if window.title.is_empty() {
                return Err(ConfigError::InvalidWindow {
                    title: String::new(),
                    reason: "title cannot be empty".to_string(),
                });
            }
            if window.width == 0 || window.height == 0 {
                return Err(ConfigError::InvalidWindow {
                    title: window.title.clone(),
                    reason: format!("size {}x{} must be positive", window.width, window.height),
                });
            }
        }

        if config.capture.screenshot_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyScreenshotPath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
