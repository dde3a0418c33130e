use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::data::types::Symbol;

/// Client-side copy of the backend watchlist.
#[derive(Debug, Clone, Default)]
pub struct WatchlistSnapshot {
    pub symbols: Arc<Vec<Symbol>>,
    pub version: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl WatchlistSnapshot {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }
}

/// Process-wide watchlist cache. Only ever replaced wholesale from a fresh
/// backend fetch; subscribers are woken on every replace.
pub struct WatchlistCache {
    state: watch::Sender<WatchlistSnapshot>,
}

impl WatchlistCache {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(WatchlistSnapshot::default());
        Self { state }
    }

    pub fn current(&self) -> WatchlistSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchlistSnapshot> {
        self.state.subscribe()
    }

    /// Replace the cached list with `raw` as fetched. Entries are trimmed and
    /// uppercased, blank ones skipped and duplicates collapsed (first
    /// occurrence keeps its position). Backend names are kept as-is otherwise.
    pub fn replace(&self, raw: &[String]) -> WatchlistSnapshot {
        let mut symbols: Vec<Symbol> = Vec::with_capacity(raw.len());
        for entry in raw {
            match Symbol::from_backend(entry) {
                Some(symbol) if !symbols.contains(&symbol) => symbols.push(symbol),
                Some(_) => {}
                None => warn!("Skipping blank watchlist entry"),
            }
        }

        self.state.send_modify(|snap| {
            snap.symbols = Arc::new(symbols);
            snap.version += 1;
            snap.fetched_at = Some(Utc::now());
            snap.stale = false;
        });
        self.current()
    }

    /// Mark the cache as needing a re-fetch without touching its contents.
    pub fn invalidate(&self) {
        self.state.send_if_modified(|snap| {
            let changed = !snap.stale;
            snap.stale = true;
            changed
        });
    }

    pub fn is_stale(&self) -> bool {
        self.state.borrow().stale
    }
}

impl Default for WatchlistCache {
    fn default() -> Self {
        Self::new()
    }
}
