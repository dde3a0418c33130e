use std::fmt;

use crate::data::types::MetricSnapshot;

pub const SRS_RED_MIN: f64 = 70.0;
pub const SRS_YELLOW_MIN: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Red,
    Yellow,
    Green,
}

impl RiskLevel {
    /// Parse an upstream category, case-insensitively. Missing or unknown
    /// values fall back to `Yellow`.
    pub fn from_upstream(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("RED") => RiskLevel::Red,
            Some("GREEN") => RiskLevel::Green,
            _ => RiskLevel::Yellow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Red => "RED",
            RiskLevel::Yellow => "YELLOW",
            RiskLevel::Green => "GREEN",
        }
    }

    /// One-character light for compact rendering.
    pub fn marker(&self) -> char {
        match self {
            RiskLevel::Red => 'R',
            RiskLevel::Yellow => 'Y',
            RiskLevel::Green => 'G',
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band derived from the numeric score alone. Non-finite scores count as 0.
pub fn srs_band(srs: f64) -> RiskLevel {
    let srs = if srs.is_finite() { srs } else { 0.0 };
    if srs >= SRS_RED_MIN {
        RiskLevel::Red
    } else if srs >= SRS_YELLOW_MIN {
        RiskLevel::Yellow
    } else {
        RiskLevel::Green
    }
}

pub fn action_label(light: RiskLevel) -> &'static str {
    match light {
        RiskLevel::Red => "DO NOT SHORT",
        RiskLevel::Green => "SHORT WINDOW",
        RiskLevel::Yellow => "BASIS-ONLY",
    }
}

/// Score limited to [0, 100] for gauges; non-finite becomes 0.
pub fn clamp_srs(srs: f64) -> f64 {
    if srs.is_finite() {
        srs.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Both classifications of a snapshot. `light` and `srs_band` are derived
/// independently and may disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub light: RiskLevel,
    pub srs_band: RiskLevel,
    pub action: &'static str,
    pub srs: Option<f64>,
}

impl RiskAssessment {
    pub fn bands_disagree(&self) -> bool {
        self.light != self.srs_band
    }
}

pub fn assess(snapshot: &MetricSnapshot) -> RiskAssessment {
    let light = RiskLevel::from_upstream(snapshot.traffic_light.as_deref());
    RiskAssessment {
        light,
        srs_band: srs_band(snapshot.srs.unwrap_or(0.0)),
        action: action_label(light),
        srs: snapshot.srs,
    }
}
