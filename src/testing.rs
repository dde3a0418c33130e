//! In-memory backend for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::data::api::{ApiError, DashboardBackend};
use crate::data::timeseries::{SeriesMetric, SeriesQuery};
use crate::data::types::{
    AvailableContract, DebugMode, HealthStatus, MetricSnapshot, RulesExplanation, Symbol,
    TimeSeriesPoint,
};

pub fn snapshot(symbol: &str, srs: f64, light: &str) -> MetricSnapshot {
    MetricSnapshot {
        symbol: symbol.to_string(),
        ts: Some(chrono::Utc::now().timestamp_millis()),
        mark: Some(65_000.0),
        index: Some(64_990.0),
        basis_pct: Some(0.015),
        basis_twap15_pct: Some(0.012),
        funding_1h_pct: Some(0.01),
        funding_daily_est_pct: Some(0.24),
        oi_usdt: Some(2_500_000_000.0),
        delta_oi_1h_usdt: Some(-1_250_000.0),
        perp_dominance_pct: Some(62.5),
        orderbook_imbalance: Some(1.2),
        srs: Some(srs),
        traffic_light: Some(light.to_string()),
        ..MetricSnapshot::default()
    }
}

#[derive(Default)]
pub struct FakeBackend {
    watchlist: Mutex<Vec<String>>,
    snapshots: Mutex<HashMap<String, MetricSnapshot>>,
    series: Mutex<HashMap<SeriesMetric, Vec<TimeSeriesPoint>>>,
    metrics_gate: Mutex<Option<Arc<Semaphore>>>,
    mutation_calls: AtomicUsize,
    reject_duplicates: AtomicBool,
    reject_all: AtomicBool,
    fail_mutations: AtomicBool,
}

impl FakeBackend {
    pub fn new(watchlist: &[&str]) -> Self {
        let backend = Self::default();
        *backend.watchlist.lock().unwrap() = watchlist.iter().map(|s| s.to_string()).collect();
        backend
    }

    pub fn set_snapshot(&self, snap: MetricSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snap.symbol.to_uppercase(), snap);
    }

    /// Serve a snapshot claiming to be `reported` when `requested` is asked for.
    pub fn set_snapshot_as(&self, requested: &str, reported: &str, srs: f64) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(requested.to_string(), snapshot(reported, srs, "YELLOW"));
    }

    pub fn set_series(&self, metric: SeriesMetric, points: Vec<TimeSeriesPoint>) {
        self.series.lock().unwrap().insert(metric, points);
    }

    /// Make `/metrics` wait for a permit on the returned semaphore.
    pub fn gate_metrics(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.metrics_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn reject_duplicates(&self, on: bool) {
        self.reject_duplicates.store(on, Ordering::SeqCst);
    }

    pub fn reject_all(&self, on: bool) {
        self.reject_all.store(on, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, on: bool) {
        self.fail_mutations.store(on, Ordering::SeqCst);
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    fn check_mutation(&self) -> Result<(), ApiError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".into()));
        }
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected("rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DashboardBackend for FakeBackend {
    async fn watchlist(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.watchlist.lock().unwrap().clone())
    }

    async fn add_symbol(&self, symbol: &Symbol) -> Result<(), ApiError> {
        self.check_mutation()?;
        let mut list = self.watchlist.lock().unwrap();
        if list.iter().any(|s| s == symbol.as_str()) {
            if self.reject_duplicates.load(Ordering::SeqCst) {
                return Err(ApiError::Status { status: 409, body: "exists".into() });
            }
            return Ok(());
        }
        list.push(symbol.to_string());
        Ok(())
    }

    async fn remove_symbol(&self, symbol: &Symbol) -> Result<(), ApiError> {
        self.check_mutation()?;
        self.watchlist.lock().unwrap().retain(|s| s != symbol.as_str());
        Ok(())
    }

    async fn available_contracts(
        &self,
        include_spot: bool,
    ) -> Result<Vec<AvailableContract>, ApiError> {
        let all = vec![
            AvailableContract { symbol: "BTCUSDT".into(), has_spot: true },
            AvailableContract { symbol: "MEMEUSDT".into(), has_spot: false },
        ];
        Ok(all.into_iter().filter(|c| include_spot || !c.has_spot).collect())
    }

    async fn metrics(&self, symbol: &Symbol) -> Result<MetricSnapshot, ApiError> {
        let gate = self.metrics_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            permit.forget();
        }
        self.snapshots
            .lock()
            .unwrap()
            .get(symbol.as_str())
            .cloned()
            .ok_or(ApiError::Status { status: 404, body: "No snapshot yet".into() })
    }

    async fn timeseries(
        &self,
        _symbol: &Symbol,
        query: &SeriesQuery,
    ) -> Result<Vec<TimeSeriesPoint>, ApiError> {
        Ok(self
            .series
            .lock()
            .unwrap()
            .get(&query.metric)
            .cloned()
            .unwrap_or_default())
    }

    async fn rules(&self, _symbol: &Symbol) -> Result<RulesExplanation, ApiError> {
        Ok(RulesExplanation {
            traffic_light: Some("RED".into()),
            reasons: vec!["funding_1h < 0 and basis_twap15 ≤ 0 (perp discount)".into()],
        })
    }

    async fn debug_mode(&self) -> Result<DebugMode, ApiError> {
        Ok(DebugMode { use_ws: true })
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus { status: "ready".into() })
    }
}
