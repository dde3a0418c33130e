use serde_json::Value;

/// Compact human-readable rendering of an arbitrary JSON value.
///
/// Numbers (and numeric strings) at or above 1e3/1e6/1e9 in magnitude get a
/// two-decimal `K`/`M`/`B` suffix; smaller ones print as-is. Anything that
/// does not convert to a finite number is returned in its literal form.
pub fn format_compact(value: &Value) -> String {
    match to_number(value) {
        Some(n) if n.is_finite() => format_finite(n),
        _ => literal(value),
    }
}

/// Same rules as [`format_compact`] for a float already in hand.
pub fn format_number(n: f64) -> String {
    if n.is_finite() {
        format_finite(n)
    } else {
        n.to_string()
    }
}

/// `None` renders as `n/a`.
pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "n/a".to_string())
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_finite(n: f64) -> String {
    let abs = n.abs();
    if abs >= 1e9 {
        format!("{:.2}B", n / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", n / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", n / 1e3)
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}
