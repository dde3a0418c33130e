use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::data::types::TimeSeriesPoint;

/// Series served by `/timeseries/{symbol}` and charted in the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesMetric {
    Basis,
    Funding,
    OpenInterest,
    Dominance,
}

impl SeriesMetric {
    pub const ALL: [SeriesMetric; 4] = [
        SeriesMetric::Basis,
        SeriesMetric::Funding,
        SeriesMetric::OpenInterest,
        SeriesMetric::Dominance,
    ];

    /// Value of the `metric` query parameter.
    pub fn query_name(&self) -> &'static str {
        match self {
            SeriesMetric::Basis => "basis",
            SeriesMetric::Funding => "funding",
            SeriesMetric::OpenInterest => "oi",
            SeriesMetric::Dominance => "dominance",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SeriesMetric::Basis => "Basis (1m)",
            SeriesMetric::Funding => "Funding 1h%",
            SeriesMetric::OpenInterest => "Open Interest (USDT)",
            SeriesMetric::Dominance => "Perp Dominance%",
        }
    }
}

impl fmt::Display for SeriesMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_name())
    }
}

#[derive(Debug, Clone)]
pub struct SeriesQuery {
    pub metric: SeriesMetric,
    pub interval: String,
    pub window: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimeSeriesResponse {
    #[serde(default)]
    pub points: Vec<Value>,
}

/// Wire encodings of a single point.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Tuple(f64, f64),
    Object {
        #[serde(alias = "timestamp")]
        ts: f64,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        v: Option<f64>,
    },
}

impl RawPoint {
    fn into_point(self) -> Option<TimeSeriesPoint> {
        let (ts, value) = match self {
            RawPoint::Tuple(ts, value) => (ts, Some(value)),
            RawPoint::Object { ts, value, v } => (ts, value.or(v)),
        };
        let value = value?;
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        let in_range = ts >= i64::MIN as f64 && ts < i64::MAX as f64;
        if !in_range || !value.is_finite() {
            return None;
        }
        Some(TimeSeriesPoint {
            timestamp: ts as i64,
            value,
        })
    }
}

/// Convert heterogeneous wire points into `{timestamp, value}` pairs.
///
/// Elements that match neither encoding, or carry no finite value, are
/// dropped and show up as gaps in the chart.
pub fn normalize_points(raw: &[Value]) -> Vec<TimeSeriesPoint> {
    raw.iter()
        .filter_map(|p| RawPoint::deserialize(p).ok())
        .filter_map(RawPoint::into_point)
        .collect()
}
