use std::fmt;

use crate::data::types::{BorrowInfo, MetricSnapshot, Symbol};
use crate::polling::poller::{PollPhase, PollState};
use crate::view::format::{format_number, format_optional};
use crate::view::risk::{assess, clamp_srs, RiskAssessment};

pub const DOMINANCE_UNKNOWN: &str = "unknown";

/// One symbol's summary card.
#[derive(Debug, Clone)]
pub enum Tile {
    Loading {
        symbol: Symbol,
        last_error: Option<String>,
    },
    Ready(Box<TileView>),
}

#[derive(Debug, Clone)]
pub struct TileView {
    /// Symbol as reported by the snapshot itself.
    pub symbol: String,
    pub link: String,
    pub risk: RiskAssessment,
    pub gauge: String,
    pub age_secs: Option<i64>,
    pub latency_ms: Option<u64>,
    pub fields: Vec<(&'static str, String)>,
    pub reasons: Vec<String>,
    /// Set when the latest cycle failed and an older snapshot is shown.
    pub stale_error: Option<String>,
}

impl Tile {
    pub fn build(
        symbol: &Symbol,
        state: &PollState<MetricSnapshot>,
        now_ms: i64,
        gauge_width: usize,
    ) -> Self {
        let Some(snapshot) = state.data.as_deref() else {
            return Tile::Loading {
                symbol: symbol.clone(),
                last_error: state.error.clone(),
            };
        };

        let risk = assess(snapshot);
        let stale_error = match state.phase {
            PollPhase::Error => state.error.clone(),
            _ => None,
        };

        Tile::Ready(Box::new(TileView {
            symbol: snapshot.symbol.clone(),
            link: format!("/symbol/{}", snapshot.symbol),
            gauge: srs_gauge(snapshot.srs.unwrap_or(0.0), gauge_width),
            risk,
            age_secs: snapshot.ts.map(|ts| age_secs(ts, now_ms)),
            latency_ms: state.latency.map(|l| l.millis()),
            fields: tile_fields(snapshot),
            reasons: snapshot.reasons().to_vec(),
            stale_error,
        }))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Tile::Loading { .. })
    }
}

/// Whole seconds since `ts_ms`, never negative.
pub fn age_secs(ts_ms: i64, now_ms: i64) -> i64 {
    let diff = now_ms.saturating_sub(ts_ms).max(0);
    (diff as f64 / 1000.0).round() as i64
}

/// Fixed-width bar for the score, clamped to [0, 100].
pub fn srs_gauge(srs: f64, width: usize) -> String {
    let filled = ((clamp_srs(srs) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn tile_fields(s: &MetricSnapshot) -> Vec<(&'static str, String)> {
    let funding = match s.funding_interval_hours {
        Some(h) if h > 0 => format!("{} ({}h)", format_optional(s.funding_1h_pct), h),
        _ => format_optional(s.funding_1h_pct),
    };
    let dominance = if s.is_dominance_unknown() {
        DOMINANCE_UNKNOWN.to_string()
    } else {
        format_optional(s.perp_dominance_pct)
    };
    let spot = match s.has_spot {
        Some(true) => "yes",
        Some(false) => "no",
        None => "n/a",
    };

    let mut fields = vec![
        ("Mark", format_optional(s.mark)),
        ("Index", format_optional(s.index)),
        ("Basis%", format_optional(s.basis_pct)),
        ("TWAP15%", format_optional(s.basis_twap15_pct)),
        ("Funding 1h%", funding),
        ("Daily Est%", format_optional(s.funding_daily_est_pct)),
        ("OI (USDT)", format_optional(s.oi_usdt)),
        ("ΔOI 1h", format_optional(s.delta_oi_1h_usdt)),
        ("Dom%", dominance),
        ("OB Imb", format_optional(s.orderbook_imbalance)),
        ("Spot", spot.to_string()),
        ("Fut Vol24", format_optional(s.fut_vol24_usdt)),
        ("Spot Vol24", format_optional(s.spot_vol24_usdt)),
        ("Borrow", borrow_summary(s.borrow.as_ref())),
    ];
    if let Some(secs) = s.next_funding_in_sec {
        fields.push(("Next funding", format_countdown(secs)));
    }
    fields
}

/// Cheapest venue to borrow from, if any.
fn borrow_summary(borrow: Option<&BorrowInfo>) -> String {
    match borrow {
        None => "n/a".to_string(),
        Some(b) if !b.shortable => "not shortable".to_string(),
        Some(b) => b
            .venues
            .iter()
            .min_by(|x, y| x.apr_pct.total_cmp(&y.apr_pct))
            .map(|v| format!("{} {}%", v.ex, format_number(v.apr_pct)))
            .unwrap_or_else(|| "shortable".to_string()),
    }
}

fn format_countdown(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else {
        format!("{}m{:02}s", m, s)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tile::Loading { symbol, last_error } => {
                write!(f, "[ ] Loading {}…", symbol)?;
                if let Some(err) = last_error {
                    write!(f, " ({})", err)?;
                }
                writeln!(f)
            }
            Tile::Ready(view) => write!(f, "{}", view),
        }
    }
}

impl fmt::Display for TileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let risk = &self.risk;
        let srs = risk.srs.map(format_number).unwrap_or_else(|| "n/a".to_string());

        write!(f, "[{}] {}  {}", risk.light.marker(), self.symbol, self.link)?;
        if let Some(age) = self.age_secs {
            write!(f, "  age {}s", age)?;
        }
        if let Some(ms) = self.latency_ms {
            write!(f, "  api {}ms", ms)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "    SRS {} {} band {} | light {} -> {}",
            srs, self.gauge, risk.srs_band, risk.light, risk.action
        )?;
        if risk.bands_disagree() {
            writeln!(f, "    (score band and light disagree)")?;
        }

        for pair in self.fields.chunks(2) {
            write!(f, "   ")?;
            for (label, value) in pair {
                write!(f, " {:<12} {:>12}", label, value)?;
            }
            writeln!(f)?;
        }

        if !self.reasons.is_empty() {
            let tags: Vec<String> = self.reasons.iter().map(|r| format!("[{}]", r)).collect();
            writeln!(f, "    {}", tags.join(" "))?;
        }
        if let Some(err) = &self.stale_error {
            writeln!(f, "    (stale: {})", err)?;
        }
        Ok(())
    }
}
