mod app;
mod config;
mod data;
mod monitoring;
mod polling;
mod view;
mod watchlist;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;

use app::Dashboard;
use config::{Config, EnvConfig};
use data::api::ApiClient;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = Config::load_optional(CONFIG_PATH)?;
    let env_config = EnvConfig::load()?;
    let missing = loaded.is_none();
    let config = loaded.unwrap_or_default();

    monitoring::telemetry::init_tracing(&config.monitoring.log_level);

    tracing::info!("Short-Risk Radar starting...");
    if missing {
        tracing::warn!("Config file {} not found, using defaults", CONFIG_PATH);
    }
    tracing::info!(
        "Tile poll every {:?}, watchlist refresh every {:?}",
        config.dashboard.poll_interval(),
        config.dashboard.watchlist_refresh()
    );
    if config.monitoring.prometheus_enabled && monitoring::telemetry::render_metrics().is_none() {
        tracing::warn!("prometheus_enabled is set but the `metrics` feature is off");
    }

    let client = ApiClient::new(env_config.api_base.clone(), config.dashboard.request_timeout())
        .context("Failed to build HTTP client")?;
    tracing::info!("Backend: {}", client.base_url());

    Dashboard::new(config, Arc::new(client)).run().await
}
