//! Configuration model, deserialized by the config loader.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for deskbridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Event stream configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Virtual display configuration
    #[serde(default)]
    pub display: DisplayConfig,

    /// Screen capture configuration
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to allow cross-origin requests
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: default_true(),
        }
    }
}

/// Event stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamConfig {
    /// Interval between dispatch cycles; one heartbeat is sent per cycle
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Maximum number of requests dispatched in a single cycle
    #[serde(default = "default_max_dispatch_per_tick")]
    pub max_dispatch_per_tick: usize,
}

const fn default_heartbeat_interval_ms() -> u64 {
    1000
}

const fn default_max_dispatch_per_tick() -> usize {
    1
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_dispatch_per_tick: default_max_dispatch_per_tick(),
        }
    }
}

/// A window present on the virtual display at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSeed {
    /// Title shown for the window
    pub title: String,
    /// Left edge in screen coordinates
    #[serde(default)]
    pub x: i32,
    /// Top edge in screen coordinates
    #[serde(default)]
    pub y: i32,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
}

/// Virtual display configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DisplayConfig {
    /// Screen width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Screen height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Windows open at startup, topmost last
    #[serde(default)]
    pub windows: Vec<WindowSeed>,
}

const fn default_width() -> u32 {
    1920
}

const fn default_height() -> u32 {
    1080
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            windows: vec![],
        }
    }
}

/// Screen capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CaptureConfig {
    /// Where the `screenshot` tool writes its image
    #[serde(default = "default_screenshot_path")]
    pub screenshot_path: PathBuf,
}

fn default_screenshot_path() -> PathBuf {
    PathBuf::from("mcp_screenshot.ppm")
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            screenshot_path: default_screenshot_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
