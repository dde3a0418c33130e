use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_.\-]{0,31}$").expect("static symbol pattern"));

/// Uppercase trading symbol, e.g. `BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("Symbol is empty")]
    Empty,

    #[error("Invalid symbol: {0:?}")]
    Invalid(String),
}

impl Symbol {
    /// Trim and uppercase `raw`, then validate it.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(SymbolError::Empty);
        }
        if !SYMBOL_RE.is_match(&normalized) {
            return Err(SymbolError::Invalid(normalized));
        }
        Ok(Self(normalized))
    }

    /// Accept an identifier the backend already owns: trim and uppercase
    /// only. Blank entries yield `None`.
    pub fn from_backend(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return None;
        }
        Some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Symbol::from_backend(&raw).ok_or_else(|| serde::de::Error::custom("blank symbol"))
    }
}

/// Latest metrics for one symbol, as served by `/metrics/{symbol}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub symbol: String,
    #[serde(default)]
    pub ts: Option<i64>,
    #[serde(default)]
    pub mark: Option<f64>,
    #[serde(default)]
    pub index: Option<f64>,
    #[serde(default)]
    pub basis_pct: Option<f64>,
    #[serde(default)]
    pub basis_twap15_pct: Option<f64>,
    #[serde(default)]
    pub funding_1h_pct: Option<f64>,
    #[serde(default)]
    pub funding_daily_est_pct: Option<f64>,
    #[serde(default)]
    pub funding_interval_hours: Option<u32>,
    #[serde(default)]
    pub next_funding_in_sec: Option<i64>,
    #[serde(default)]
    pub oi_usdt: Option<f64>,
    #[serde(default)]
    pub delta_oi_1h_usdt: Option<f64>,
    #[serde(default)]
    pub perp_dominance_pct: Option<f64>,
    #[serde(default)]
    pub dominance_unknown: Option<bool>,
    #[serde(default)]
    pub orderbook_imbalance: Option<f64>,
    #[serde(default)]
    pub has_spot: Option<bool>,
    #[serde(default)]
    pub fut_vol24_usdt: Option<f64>,
    #[serde(default)]
    pub spot_vol24_usdt: Option<f64>,
    #[serde(default)]
    pub borrow: Option<BorrowInfo>,
    #[serde(default)]
    pub srs: Option<f64>,
    #[serde(default)]
    pub traffic_light: Option<String>,
    #[serde(default)]
    pub rule_reasons: Option<Vec<String>>,
    /// Fields this client does not model yet.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BorrowInfo {
    #[serde(default)]
    pub shortable: bool,
    #[serde(default)]
    pub venues: Vec<BorrowVenue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowVenue {
    pub ex: String,
    pub apr_pct: f64,
}

impl MetricSnapshot {
    pub fn is_dominance_unknown(&self) -> bool {
        self.dominance_unknown.unwrap_or(false)
    }

    pub fn reasons(&self) -> &[String] {
        self.rule_reasons.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableContract {
    pub symbol: String,
    #[serde(default)]
    pub has_spot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugMode {
    #[serde(default)]
    pub use_ws: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesExplanation {
    #[serde(default)]
    pub traffic_light: Option<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::parse("  btcusdt ").unwrap().as_str(), "BTCUSDT");
        assert_eq!(Symbol::parse("1000pepeusdt").unwrap().as_str(), "1000PEPEUSDT");
        assert_eq!(Symbol::parse("btcusdt_250926").unwrap().as_str(), "BTCUSDT_250926");
        assert_eq!(Symbol::parse("1000pepe-usdt").unwrap().as_str(), "1000PEPE-USDT");
    }

    #[test]
    fn test_backend_symbols_are_not_validated() {
        assert_eq!(Symbol::from_backend(" btc/usdt ").unwrap().as_str(), "BTC/USDT");
        assert!(Symbol::from_backend("  ").is_none());
    }

    #[test]
    fn test_symbol_rejects_empty_and_garbage() {
        assert_eq!(Symbol::parse("   "), Err(SymbolError::Empty));
        assert!(matches!(Symbol::parse("BTC/USDT"), Err(SymbolError::Invalid(_))));
        assert!(matches!(Symbol::parse("BTC USDT"), Err(SymbolError::Invalid(_))));
        assert!(matches!(Symbol::parse("_BTC"), Err(SymbolError::Invalid(_))));
    }

    #[test]
    fn test_snapshot_tolerates_missing_optional_fields() {
        let snap: MetricSnapshot = serde_json::from_str(
            r#"{"symbol":"ETHUSDT","ts":1700000000000,"mark":2000.5,
                "srs":55,"traffic_light":"red"}"#,
        )
        .unwrap();

        assert_eq!(snap.symbol, "ETHUSDT");
        assert_eq!(snap.srs, Some(55.0));
        assert!(snap.reasons().is_empty());
        assert!(!snap.is_dominance_unknown());
        assert!(snap.oi_usdt.is_none());
        assert!(snap.extra.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_unknown_fields() {
        let snap: MetricSnapshot = serde_json::from_str(
            r#"{"symbol":"ETHUSDT","liq_24h_usdt":1250000,"venue":"binance"}"#,
        )
        .unwrap();

        assert_eq!(snap.extra.len(), 2);
        assert_eq!(snap.extra["venue"], "binance");
    }
}
