//! Text area charts for the detail view.

use chrono::{Local, TimeZone};
use std::fmt::Write as _;

use crate::data::types::TimeSeriesPoint;
use crate::view::format::format_number;

const FULL: char = '█';
const HALF: char = '▄';

/// One series, scaled to its own min/max.
pub struct AreaChart<'a> {
    title: &'a str,
    points: &'a [TimeSeriesPoint],
}

impl<'a> AreaChart<'a> {
    pub fn new(title: &'a str, points: &'a [TimeSeriesPoint]) -> Self {
        Self { title, points }
    }

    pub fn render(&self, width: usize, height: usize) -> String {
        let width = width.max(2);
        let height = height.max(1);
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);

        let Some(columns) = self.columns(width) else {
            for row in 0..height {
                let body = if row == height / 2 {
                    center("no data", width)
                } else {
                    " ".repeat(width)
                };
                let _ = writeln!(out, "{:>10} |{}", "", body);
            }
            let _ = writeln!(out, "{:>10} +{}", "", "-".repeat(width));
            return out;
        };

        let (lo, hi) = value_range(&columns);
        for row in 0..height {
            // Row 0 is the top of the chart.
            let level_top = (height - row) as f64;
            let label = if row == 0 {
                format_number(hi)
            } else if row == height - 1 {
                format_number(lo)
            } else {
                String::new()
            };

            let body: String = columns
                .iter()
                .map(|col| match col {
                    None => ' ',
                    Some(v) => {
                        let filled = (v - lo) / (hi - lo) * height as f64;
                        if filled >= level_top {
                            FULL
                        } else if filled >= level_top - 0.5 {
                            HALF
                        } else {
                            ' '
                        }
                    }
                })
                .collect();
            let _ = writeln!(out, "{:>10} |{}", label, body);
        }
        let _ = writeln!(out, "{:>10} +{}", "", "-".repeat(width));

        let first = self.points.iter().map(|p| p.timestamp).min().unwrap_or(0);
        let last = self.points.iter().map(|p| p.timestamp).max().unwrap_or(0);
        let start = format_ts(first);
        let end = format_ts(last);
        let gap = (width + 1).saturating_sub(start.len() + end.len()).max(1);
        let _ = writeln!(out, "{:>10}  {}{}{}", "", start, " ".repeat(gap), end);
        out
    }

    /// Bucket points into `width` columns by time; empty columns after the
    /// first point carry the previous value forward.
    fn columns(&self, width: usize) -> Option<Vec<Option<f64>>> {
        let mut points: Vec<&TimeSeriesPoint> =
            self.points.iter().filter(|p| p.value.is_finite()).collect();
        if points.is_empty() {
            return None;
        }
        points.sort_by_key(|p| p.timestamp);

        let t0 = points[0].timestamp;
        let t1 = points[points.len() - 1].timestamp;
        let span = (t1 as i128 - t0 as i128) as f64;

        let mut columns: Vec<Option<f64>> = vec![None; width];
        for p in &points {
            let col = if span > 0.0 {
                let offset = (p.timestamp as i128 - t0 as i128) as f64;
                ((offset / span) * (width - 1) as f64).round() as usize
            } else {
                0
            };
            columns[col.min(width - 1)] = Some(p.value);
        }

        let mut carry = None;
        for col in columns.iter_mut() {
            match col {
                Some(v) => carry = Some(*v),
                None => *col = carry,
            }
        }
        Some(columns)
    }
}

fn value_range(columns: &[Option<f64>]) -> (f64, f64) {
    let values = columns.iter().flatten().copied();
    let lo = values.clone().fold(f64::INFINITY, f64::min);
    let hi = values.fold(f64::NEG_INFINITY, f64::max);
    if (hi - lo).abs() < f64::EPSILON {
        let pad = if lo.abs() > 0.0 { lo.abs() * 0.01 } else { 1.0 };
        return (lo - pad, hi + pad);
    }
    (lo, hi)
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    let left = (width - len) / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(width - len - left))
}

/// Local wall-clock time of an epoch-millisecond timestamp.
pub fn format_ts(ts_ms: i64) -> String {
    match Local.timestamp_millis_opt(ts_ms).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => ts_ms.to_string(),
    }
}
