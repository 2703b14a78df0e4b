use config::{Config, Environment, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::dashboard::StatsPeriod;

/// Main configuration struct
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Grid service connection
    #[serde(default)]
    pub api: ApiConfig,
    /// What the dashboard watches and how often
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the grid service, e.g. "http://localhost:8000"
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for every HTTP call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Trading pair whose orders and market data are shown
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Rows per page of the order table
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// "all", "day", "week" or "month"
    #[serde(default)]
    pub stats_period: StatsPeriod,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            poll_interval_secs: default_poll_interval_secs(),
            page_size: default_page_size(),
            stats_period: StatsPeriod::default(),
        }
    }
}

fn default_symbol() -> String {
    "AIPG_USDT".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    crate::dashboard::DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Enable local dashboard server
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    /// Server port (default 3000)
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Server host (default 127.0.0.1)
    #[serde(default = "default_server_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            port: default_server_port(),
            host: default_server_host(),
        }
    }
}

fn default_server_enabled() -> bool {
    false
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

impl Settings {
    /// Load settings from a configuration file.
    ///
    /// A missing file is fine; every value has a default. Environment
    /// variables override the file, e.g. `APP_API__BASE_URL=...`.
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        s.try_deserialize()
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dashboard.poll_interval_secs.max(1))
    }
}
