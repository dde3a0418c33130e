//! Cancelable fixed-interval fetch loop.
//!
//! A [`MetricPoller`] owns one spawned task that repeatedly runs a fetch
//! future and publishes the outcome through a `watch` channel. Dropping the
//! handle aborts the task, so whoever owns the handle owns the timer.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::data::api::ApiError;
use crate::monitoring::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    Ready,
    Error,
}

/// Round trip of the most recent fetch that got a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub round_trip: Duration,
}

impl LatencySample {
    pub fn millis(&self) -> u64 {
        self.round_trip.as_millis() as u64
    }
}

#[derive(Debug)]
pub struct PollState<T> {
    pub phase: PollPhase,
    pub data: Option<Arc<T>>,
    pub error: Option<String>,
    pub latency: Option<LatencySample>,
    started_cycle: u64,
    applied_cycle: u64,
}

impl<T> Clone for PollState<T> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase,
            data: self.data.clone(),
            error: self.error.clone(),
            latency: self.latency,
            started_cycle: self.started_cycle,
            applied_cycle: self.applied_cycle,
        }
    }
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            phase: PollPhase::Idle,
            data: None,
            error: None,
            latency: None,
            started_cycle: 0,
            applied_cycle: 0,
        }
    }
}

impl<T> PollState<T> {
    /// Enter `Fetching` and return the number of the new cycle.
    pub fn begin_cycle(&mut self) -> u64 {
        self.started_cycle += 1;
        self.phase = PollPhase::Fetching;
        self.started_cycle
    }

    /// Apply the outcome of `cycle`. Returns false when the outcome was
    /// discarded because a newer cycle has already started.
    pub fn apply(
        &mut self,
        cycle: u64,
        outcome: Result<T, ApiError>,
        latency: Option<LatencySample>,
    ) -> bool {
        if cycle < self.started_cycle || cycle <= self.applied_cycle {
            return false;
        }
        self.applied_cycle = cycle;
        if latency.is_some() {
            self.latency = latency;
        }
        match outcome {
            Ok(data) => {
                self.data = Some(Arc::new(data));
                self.error = None;
                self.phase = PollPhase::Ready;
            }
            Err(err) => {
                self.error = Some(err.to_string());
                self.phase = PollPhase::Error;
            }
        }
        true
    }

    /// Number of the last cycle whose outcome was published.
    #[cfg(test)]
    pub fn applied_cycle(&self) -> u64 {
        self.applied_cycle
    }
}

pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

pub struct MetricPoller<T> {
    label: String,
    state: Arc<watch::Sender<PollState<T>>>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> MetricPoller<T> {
    /// Start polling immediately, then every `interval`.
    pub fn spawn(label: impl Into<String>, interval: Duration, fetch: FetchFn<T>) -> Self {
        let label = label.into();
        let (tx, _rx) = watch::channel(PollState::default());
        let state = Arc::new(tx);
        let cancelled = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(poll_loop(
            label.clone(),
            interval,
            fetch,
            state.clone(),
            cancelled.clone(),
        ));
        debug!("Poller started: {}", label);

        Self {
            label,
            state,
            cancelled,
            task,
        }
    }
}

impl<T> MetricPoller<T> {
    /// Current state (cheap: payload is behind an `Arc`).
    pub fn snapshot(&self) -> PollState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.state.subscribe()
    }

    /// Stop the timer and drop any in-flight request. No state write is
    /// observable afterwards.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.task.abort();
            debug!("Poller cancelled: {}", self.label);
        }
    }
}

impl<T> Drop for MetricPoller<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn poll_loop<T>(
    label: String,
    interval: Duration,
    fetch: FetchFn<T>,
    state: Arc<watch::Sender<PollState<T>>>,
    cancelled: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        let mut cycle = 0;
        state.send_modify(|s| cycle = s.begin_cycle());

        let started = Instant::now();
        let outcome = fetch().await;
        let elapsed = started.elapsed();

        let latency = match &outcome {
            Ok(_) => Some(LatencySample { round_trip: elapsed }),
            Err(err) if err.has_response() => Some(LatencySample { round_trip: elapsed }),
            Err(_) => None,
        };
        if let Err(err) = &outcome {
            warn!("Poll {} failed: {}", label, err);
        }
        telemetry::record_poll(&label, elapsed, outcome.is_ok());

        state.send_if_modified(|s| {
            if cancelled.load(Ordering::SeqCst) {
                return false;
            }
            s.apply(cycle, outcome, latency)
        });
    }
}
