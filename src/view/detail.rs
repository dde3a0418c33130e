use futures::FutureExt;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DetailConfig;
use crate::data::api::DashboardBackend;
use crate::data::timeseries::{SeriesMetric, SeriesQuery};
use crate::data::types::{MetricSnapshot, RulesExplanation, Symbol, TimeSeriesPoint};
use crate::polling::poller::{FetchFn, MetricPoller, PollPhase};
use crate::view::board::snapshot_fetch;
use crate::view::chart::AreaChart;
use crate::view::format::{format_compact, format_number};
use crate::view::risk::{assess, RiskLevel};

/// Per-symbol drill-down. Owns its pollers; dropping the view stops them.
pub struct DetailView {
    symbol: Symbol,
    config: DetailConfig,
    snapshot: MetricPoller<MetricSnapshot>,
    rules: MetricPoller<RulesExplanation>,
    series: Vec<(SeriesMetric, MetricPoller<Vec<TimeSeriesPoint>>)>,
}

impl DetailView {
    pub fn open(
        backend: Arc<dyn DashboardBackend>,
        symbol: Symbol,
        config: DetailConfig,
        poll_interval: Duration,
    ) -> Self {
        let snapshot = MetricPoller::spawn(
            format!("metrics/{}", symbol),
            poll_interval,
            snapshot_fetch(backend.clone(), symbol.clone()),
        );
        let rules = MetricPoller::spawn(
            format!("rules/{}", symbol),
            poll_interval,
            rules_fetch(backend.clone(), symbol.clone()),
        );

        let series = SeriesMetric::ALL
            .iter()
            .map(|&metric| {
                let query = SeriesQuery {
                    metric,
                    interval: config.interval.clone(),
                    window: config.window.clone(),
                };
                let poller = MetricPoller::spawn(
                    format!("timeseries/{}/{}", symbol, metric),
                    poll_interval,
                    series_fetch(backend.clone(), symbol.clone(), query),
                );
                (metric, poller)
            })
            .collect();

        let view = Self {
            symbol,
            config,
            snapshot,
            rules,
            series,
        };
        info!("Opened detail view for {} ({} pollers)", view.symbol, view.poller_count());
        view
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn poller_count(&self) -> usize {
        2 + self.series.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<- back   {} Detail", self.symbol);

        let snap = self.snapshot.snapshot();
        match snap.data.as_deref() {
            Some(s) => {
                let risk = assess(s);
                let srs = risk.srs.map(format_number).unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(
                    out,
                    "SRS {} / {} (band {}) -> {}",
                    srs, risk.light, risk.srs_band, risk.action
                );
                if risk.bands_disagree() {
                    let _ = writeln!(out, "  score band and upstream light disagree");
                }
                for (key, value) in &s.extra {
                    let _ = writeln!(out, "  {}: {}", key, format_compact(value));
                }
            }
            None => {
                let _ = writeln!(out, "Loading snapshot…");
            }
        }

        let rules = self.rules.snapshot();
        if let Some(explanation) = rules.data.as_deref() {
            let light = RiskLevel::from_upstream(explanation.traffic_light.as_deref());
            let _ = writeln!(out, "Rules: {}", light);
            for reason in &explanation.reasons {
                let _ = writeln!(out, "  - {}", reason);
            }
        }

        for (metric, poller) in &self.series {
            let state = poller.snapshot();
            let points: &[TimeSeriesPoint] =
                state.data.as_deref().map(Vec::as_slice).unwrap_or(&[]);
            let title = match (state.phase, &state.error) {
                (PollPhase::Error, Some(err)) => format!("{} ({})", metric.title(), err),
                _ => metric.title().to_string(),
            };
            let _ = writeln!(out);
            let chart = AreaChart::new(&title, points);
            out.push_str(&chart.render(self.config.chart_width, self.config.chart_height));
        }
        out
    }
}

impl Drop for DetailView {
    fn drop(&mut self) {
        info!("Closing detail view for {}", self.symbol);
    }
}

fn rules_fetch(backend: Arc<dyn DashboardBackend>, symbol: Symbol) -> FetchFn<RulesExplanation> {
    Arc::new(move || {
        let backend = backend.clone();
        let symbol = symbol.clone();
        async move { backend.rules(&symbol).await }.boxed()
    })
}

fn series_fetch(
    backend: Arc<dyn DashboardBackend>,
    symbol: Symbol,
    query: SeriesQuery,
) -> FetchFn<Vec<TimeSeriesPoint>> {
    Arc::new(move || {
        let backend = backend.clone();
        let symbol = symbol.clone();
        let query = query.clone();
        async move { backend.timeseries(&symbol, &query).await }.boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{snapshot, FakeBackend};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn series_points(view: &DetailView, metric: SeriesMetric) -> Vec<TimeSeriesPoint> {
        view.series
            .iter()
            .find(|(m, _)| *m == metric)
            .and_then(|(_, poller)| poller.snapshot().data)
            .map(|points| points.as_ref().clone())
            .unwrap_or_default()
    }

    fn open(backend: Arc<FakeBackend>) -> DetailView {
        DetailView::open(
            backend,
            Symbol::parse("BTCUSDT").unwrap(),
            DetailConfig { chart_width: 20, chart_height: 4, ..DetailConfig::default() },
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn test_detail_runs_series_pollers() {
        let backend = Arc::new(FakeBackend::new(&["BTCUSDT"]));
        let mut snap = snapshot("BTCUSDT", 72.0, "RED");
        snap.extra.insert("liq_24h_usdt".into(), serde_json::json!(1_250_000));
        backend.set_snapshot(snap);
        backend.set_series(
            SeriesMetric::Basis,
            vec![
                TimeSeriesPoint { timestamp: 1000, value: 5.0 },
                TimeSeriesPoint { timestamp: 2000, value: 7.0 },
            ],
        );

        let view = open(backend);
        assert_eq!(view.poller_count(), 6);

        let mut rx = view.series[0].1.subscribe();
        timeout(WAIT, rx.wait_for(|s| s.data.is_some())).await.unwrap().unwrap();
        let mut snap_rx = view.snapshot.subscribe();
        timeout(WAIT, snap_rx.wait_for(|s| s.data.is_some())).await.unwrap().unwrap();
        let mut rules_rx = view.rules.subscribe();
        timeout(WAIT, rules_rx.wait_for(|s| s.data.is_some())).await.unwrap().unwrap();

        assert_eq!(series_points(&view, SeriesMetric::Basis).len(), 2);
        assert!(series_points(&view, SeriesMetric::Funding).is_empty());

        let text = view.render();
        assert!(text.contains("BTCUSDT Detail"));
        assert!(text.contains("SRS 72 / RED (band RED) -> DO NOT SHORT"));
        assert!(text.contains("perp discount"));
        assert!(text.contains("liq_24h_usdt: 1.25M"));
        assert!(!text.contains("disagree"));
        assert!(text.contains("Funding 1h%"));
        assert!(text.contains("no data"));
    }

    #[tokio::test]
    async fn test_drop_cancels_all_pollers() {
        let backend = Arc::new(FakeBackend::new(&["BTCUSDT"]));
        let view = open(backend);
        let receivers: Vec<_> = view.series.iter().map(|(_, p)| p.subscribe()).collect();

        drop(view);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let cycles: Vec<u64> = receivers.iter().map(|rx| rx.borrow().applied_cycle()).collect();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let later: Vec<u64> = receivers.iter().map(|rx| rx.borrow().applied_cycle()).collect();

        assert_eq!(cycles, later);
    }
}
