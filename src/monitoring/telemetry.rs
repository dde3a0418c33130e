use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr; stdout carries the
/// dashboard frames. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Endpoint label without the symbol, e.g. `metrics/BTCUSDT` -> `metrics`.
fn endpoint_of(label: &str) -> &str {
    label.split('/').next().unwrap_or(label)
}

#[cfg(feature = "metrics")]
mod prom {
    use prometheus::{
        Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    };
    use std::sync::LazyLock;

    pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

    pub static POLL_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
        let hist = HistogramVec::new(
            HistogramOpts::new("srr_poll_latency_seconds", "Round trip of dashboard polls"),
            &["endpoint"],
        )
        .expect("valid histogram opts");
        REGISTRY.register(Box::new(hist.clone())).ok();
        hist
    });

    pub static POLL_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
        let counter = IntCounterVec::new(
            Opts::new("srr_poll_errors_total", "Failed dashboard polls"),
            &["endpoint"],
        )
        .expect("valid counter opts");
        REGISTRY.register(Box::new(counter.clone())).ok();
        counter
    });

    pub fn render() -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&REGISTRY.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(feature = "metrics")]
pub fn record_poll(label: &str, elapsed: Duration, ok: bool) {
    let endpoint = endpoint_of(label);
    prom::POLL_LATENCY
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
    if !ok {
        prom::POLL_ERRORS.with_label_values(&[endpoint]).inc();
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_poll(label: &str, elapsed: Duration, ok: bool) {
    tracing::trace!(
        endpoint = endpoint_of(label),
        elapsed_ms = elapsed.as_millis() as u64,
        ok,
        "poll settled"
    );
}

/// Prometheus text exposition, or `None` when built without `metrics`.
pub fn render_metrics() -> Option<String> {
    #[cfg(feature = "metrics")]
    {
        Some(prom::render())
    }
    #[cfg(not(feature = "metrics"))]
    {
        None
    }
}
