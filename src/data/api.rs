//! HTTP client for the Short-Risk Radar backend.
//!
//! The backend owns the watchlist, computes metrics and serves history; this
//! module only speaks its JSON API. Everything above it talks to the
//! [`DashboardBackend`] trait so pollers and the watchlist controller can be
//! exercised against an in-memory backend.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::data::timeseries::{normalize_points, SeriesQuery, TimeSeriesResponse};
use crate::data::types::{
    AvailableContract, DebugMode, HealthStatus, MetricSnapshot, RulesExplanation, Symbol,
    TimeSeriesPoint,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Snapshot for {got} returned when {expected} was requested")]
    SymbolMismatch { expected: String, got: String },

    #[error("Backend rejected request: {0}")]
    Rejected(String),
}

impl ApiError {
    /// True when the backend answered at all (a round trip happened).
    pub fn has_response(&self) -> bool {
        !matches!(self, ApiError::Transport(_))
    }
}

/// Port onto the backend API.
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn watchlist(&self) -> Result<Vec<String>, ApiError>;
    async fn add_symbol(&self, symbol: &Symbol) -> Result<(), ApiError>;
    async fn remove_symbol(&self, symbol: &Symbol) -> Result<(), ApiError>;
    async fn available_contracts(
        &self,
        include_spot: bool,
    ) -> Result<Vec<AvailableContract>, ApiError>;
    async fn metrics(&self, symbol: &Symbol) -> Result<MetricSnapshot, ApiError>;
    async fn timeseries(
        &self,
        symbol: &Symbol,
        query: &SeriesQuery,
    ) -> Result<Vec<TimeSeriesPoint>, ApiError>;
    async fn rules(&self, symbol: &Symbol) -> Result<RulesExplanation, ApiError>;
    async fn debug_mode(&self) -> Result<DebugMode, ApiError>;
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

/// Fetch a snapshot and check it belongs to the requested symbol.
pub async fn fetch_checked_snapshot(
    backend: &dyn DashboardBackend,
    symbol: &Symbol,
) -> Result<MetricSnapshot, ApiError> {
    let snapshot = backend.metrics(symbol).await?;
    if !snapshot.symbol.trim().eq_ignore_ascii_case(symbol.as_str()) {
        return Err(ApiError::SymbolMismatch {
            expected: symbol.to_string(),
            got: snapshot.symbol,
        });
    }
    Ok(snapshot)
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SymbolBody<'a> {
    symbol: &'a str,
}

#[derive(Debug, Deserialize)]
struct WatchlistResponse {
    #[serde(default)]
    watchlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    detail: Option<String>,
}

fn default_ok() -> bool { true }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AvailableResponse {
    List(Vec<AvailableContract>),
    Wrapped { symbols: Vec<AvailableContract> },
}

impl ApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))
    }

    async fn mutate(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response: MutationResponse = self.get_json(request).await?;
        if !response.ok {
            return Err(ApiError::Rejected(
                response.detail.unwrap_or_else(|| "ok=false".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DashboardBackend for ApiClient {
    async fn watchlist(&self) -> Result<Vec<String>, ApiError> {
        let response: WatchlistResponse = self
            .get_json(self.client.get(self.url("/symbols")))
            .await?;
        Ok(response.watchlist)
    }

    async fn add_symbol(&self, symbol: &Symbol) -> Result<(), ApiError> {
        debug!("POST /symbols {}", symbol);
        let body = SymbolBody { symbol: symbol.as_str() };
        self.mutate(self.client.post(self.url("/symbols")).json(&body))
            .await
    }

    async fn remove_symbol(&self, symbol: &Symbol) -> Result<(), ApiError> {
        debug!("DELETE /symbols {}", symbol);
        let body = SymbolBody { symbol: symbol.as_str() };
        self.mutate(self.client.delete(self.url("/symbols")).json(&body))
            .await
    }

    async fn available_contracts(
        &self,
        include_spot: bool,
    ) -> Result<Vec<AvailableContract>, ApiError> {
        let request = self
            .client
            .get(self.url("/symbols/available"))
            .query(&[("include_spot", include_spot)]);

        let response: AvailableResponse = self.get_json(request).await?;
        Ok(match response {
            AvailableResponse::List(list) => list,
            AvailableResponse::Wrapped { symbols } => symbols,
        })
    }

    async fn metrics(&self, symbol: &Symbol) -> Result<MetricSnapshot, ApiError> {
        self.get_json(self.client.get(self.url(&format!("/metrics/{}", symbol))))
            .await
    }

    async fn timeseries(
        &self,
        symbol: &Symbol,
        query: &SeriesQuery,
    ) -> Result<Vec<TimeSeriesPoint>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/timeseries/{}", symbol)))
            .query(&[
                ("metric", query.metric.query_name()),
                ("interval", query.interval.as_str()),
                ("window", query.window.as_str()),
            ]);

        let response: TimeSeriesResponse = self.get_json(request).await?;
        Ok(normalize_points(&response.points))
    }

    async fn rules(&self, symbol: &Symbol) -> Result<RulesExplanation, ApiError> {
        self.get_json(self.client.get(self.url(&format!("/rules/{}", symbol))))
            .await
    }

    async fn debug_mode(&self) -> Result<DebugMode, ApiError> {
        self.get_json(self.client.get(self.url("/debug/mode"))).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json(self.client.get(self.url("/health/ready"))).await
    }
}
