use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub detail: DetailConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_watchlist_refresh")]
    pub watchlist_refresh_secs: u64,
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_gauge_width")]
    pub gauge_width: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailConfig {
    #[serde(default = "default_series_interval")]
    pub interval: String,
    #[serde(default = "default_series_window")]
    pub window: String,
    #[serde(default = "default_chart_width")]
    pub chart_width: usize,
    #[serde(default = "default_chart_height")]
    pub chart_height: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub prometheus_enabled: bool,
}

fn default_poll_interval() -> u64 { 10 }
fn default_watchlist_refresh() -> u64 { 30 }
fn default_frame_interval() -> u64 { 1000 }
fn default_request_timeout() -> u64 { 10 }
fn default_gauge_width() -> usize { 20 }
fn default_series_interval() -> String { "1m".to_string() }
fn default_series_window() -> String { "6h".to_string() }
fn default_chart_width() -> usize { 60 }
fn default_chart_height() -> usize { 8 }
fn default_log_level() -> String { "info".to_string() }

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            watchlist_refresh_secs: default_watchlist_refresh(),
            frame_interval_ms: default_frame_interval(),
            request_timeout_secs: default_request_timeout(),
            gauge_width: default_gauge_width(),
        }
    }
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            interval: default_series_interval(),
            window: default_series_window(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_enabled: false,
        }
    }
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn watchlist_refresh(&self) -> Duration {
        Duration::from_secs(self.watchlist_refresh_secs.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(50))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Deployment-time settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub api_base: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields `None`.
    pub fn load_optional(path: &str) -> Result<Option<Self>> {
        if !Path::new(path).exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let api_base = std::env::var("SRR_API_BASE")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let api_base = api_base.trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            anyhow::bail!("SRR_API_BASE is set but empty");
        }

        Ok(Self { api_base })
    }
}
