use dashmap::DashMap;
use futures::FutureExt;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::data::api::{fetch_checked_snapshot, DashboardBackend};
use crate::data::types::{MetricSnapshot, Symbol};
use crate::polling::poller::{FetchFn, MetricPoller};
use crate::view::tile::Tile;
use crate::watchlist::cache::WatchlistSnapshot;

pub const EMPTY_WATCHLIST: &str = "No symbols in watchlist.";

/// Summary tiles for the watchlist, one live poller per symbol.
pub struct TileBoard {
    backend: Arc<dyn DashboardBackend>,
    poll_interval: Duration,
    gauge_width: usize,
    pollers: DashMap<Symbol, MetricPoller<MetricSnapshot>>,
}

impl TileBoard {
    pub fn new(
        backend: Arc<dyn DashboardBackend>,
        poll_interval: Duration,
        gauge_width: usize,
    ) -> Self {
        Self {
            backend,
            poll_interval,
            gauge_width,
            pollers: DashMap::new(),
        }
    }

    /// Reconcile pollers with `symbols`: start one for every new symbol and
    /// drop (cancel) the ones no longer listed.
    pub fn sync(&self, symbols: &[Symbol]) {
        self.pollers.retain(|symbol, _| {
            let keep = symbols.contains(symbol);
            if !keep {
                info!("Tile removed: {}", symbol);
            }
            keep
        });

        for symbol in symbols {
            if self.pollers.contains_key(symbol) {
                continue;
            }
            let poller = MetricPoller::spawn(
                format!("metrics/{}", symbol),
                self.poll_interval,
                snapshot_fetch(self.backend.clone(), symbol.clone()),
            );
            self.pollers.insert(symbol.clone(), poller);
            info!("Tile added: {}", symbol);
        }
        debug!("{} tiles live", self.tile_count());
    }

    pub fn tile_count(&self) -> usize {
        self.pollers.len()
    }

    pub fn tiles(&self, watchlist: &[Symbol], now_ms: i64) -> Vec<Tile> {
        watchlist
            .iter()
            .map(|symbol| match self.pollers.get(symbol) {
                Some(poller) => Tile::build(symbol, &poller.snapshot(), now_ms, self.gauge_width),
                None => Tile::Loading {
                    symbol: symbol.clone(),
                    last_error: None,
                },
            })
            .collect()
    }

    pub fn render(&self, watchlist: &[Symbol], now_ms: i64) -> String {
        if watchlist.is_empty() {
            return format!("{}\n", EMPTY_WATCHLIST);
        }
        let tiles = self.tiles(watchlist, now_ms);
        let loading = tiles.iter().filter(|t| t.is_loading()).count();

        let mut out = String::new();
        for tile in &tiles {
            let _ = writeln!(out, "{}", tile);
        }
        if loading > 0 {
            let _ = writeln!(out, "{} of {} tiles loading", loading, tiles.len());
        }
        out
    }

    pub fn clear(&self) {
        self.pollers.clear();
    }
}

pub(crate) fn snapshot_fetch(
    backend: Arc<dyn DashboardBackend>,
    symbol: Symbol,
) -> FetchFn<MetricSnapshot> {
    Arc::new(move || {
        let backend = backend.clone();
        let symbol = symbol.clone();
        async move { fetch_checked_snapshot(backend.as_ref(), &symbol).await }.boxed()
    })
}

/// Keep `board` in step with the watchlist cache until the cache goes away.
pub fn spawn_board_sync(
    board: Arc<TileBoard>,
    mut watchlist: watch::Receiver<WatchlistSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let symbols = watchlist.borrow_and_update().symbols.clone();
            board.sync(&symbols);
            if watchlist.changed().await.is_err() {
                debug!("Watchlist cache closed, stopping board sync");
                board.clear();
                return;
            }
        }
    })
}
