use std::sync::Arc;
use tracing::{error, info, warn};

use crate::data::api::{ApiError, DashboardBackend};
use crate::data::types::{Symbol, SymbolError};
use crate::watchlist::cache::{WatchlistCache, WatchlistSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Added(Symbol),
    Removed(Symbol),
    /// Add of a symbol the backend already tracks.
    AlreadyPresent(Symbol),
    /// Remove of a symbol the backend no longer tracks.
    NotPresent(Symbol),
    /// Blank input; nothing was sent.
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum WatchlistError {
    #[error("Invalid symbol: {0}")]
    Validation(#[from] SymbolError),

    #[error("Watchlist request for {symbol} failed: {source}")]
    Request {
        symbol: Symbol,
        #[source]
        source: ApiError,
    },

    #[error("Watchlist refresh failed: {0}")]
    Refresh(#[source] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Add,
    Remove,
}

/// The single entry point for watchlist mutation. Never edits the cache
/// itself: every change is confirmed by the backend and then re-fetched.
pub struct WatchlistController {
    backend: Arc<dyn DashboardBackend>,
    cache: Arc<WatchlistCache>,
}

impl WatchlistController {
    pub fn new(backend: Arc<dyn DashboardBackend>, cache: Arc<WatchlistCache>) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &Arc<WatchlistCache> {
        &self.cache
    }

    /// Fetch the watchlist and replace the cache with it.
    pub async fn refresh(&self) -> Result<WatchlistSnapshot, WatchlistError> {
        let raw = self
            .backend
            .watchlist()
            .await
            .map_err(WatchlistError::Refresh)?;
        Ok(self.cache.replace(&raw))
    }

    pub async fn add(&self, raw: &str) -> Result<MutationOutcome, WatchlistError> {
        self.mutate(raw, Mutation::Add).await
    }

    pub async fn remove(&self, raw: &str) -> Result<MutationOutcome, WatchlistError> {
        self.mutate(raw, Mutation::Remove).await
    }

    async fn mutate(&self, raw: &str, op: Mutation) -> Result<MutationOutcome, WatchlistError> {
        let symbol = match Symbol::parse(raw) {
            Ok(symbol) => symbol,
            Err(SymbolError::Empty) => return Ok(MutationOutcome::Ignored),
            Err(e) => return Err(e.into()),
        };

        let result = match op {
            Mutation::Add => self.backend.add_symbol(&symbol).await,
            Mutation::Remove => self.backend.remove_symbol(&symbol).await,
        };

        match result {
            Ok(()) => {
                self.cache.invalidate();
                if let Err(e) = self.refresh().await {
                    // Mutation is confirmed; the next scheduled refresh
                    // picks it up because the cache stays stale.
                    warn!("{:?} {} applied but re-fetch failed: {}", op, symbol, e);
                }
                info!("Watchlist {:?} {}", op, symbol);
                Ok(match op {
                    Mutation::Add => MutationOutcome::Added(symbol),
                    Mutation::Remove => MutationOutcome::Removed(symbol),
                })
            }
            Err(source @ (ApiError::Status { .. } | ApiError::Rejected(_))) => {
                // The backend answered no; see whether the list already has
                // the state the user asked for. The fetched list only reaches
                // the cache when it does.
                let fetched = self.backend.watchlist().await.ok();
                let settled = fetched.as_ref().is_some_and(|raw| {
                    let present = raw
                        .iter()
                        .filter_map(|s| Symbol::from_backend(s))
                        .any(|s| s == symbol);
                    match op {
                        Mutation::Add => present,
                        Mutation::Remove => !present,
                    }
                });
                if let (true, Some(raw)) = (settled, fetched) {
                    self.cache.replace(&raw);
                    info!("Watchlist {:?} {} was already in effect", op, symbol);
                    return Ok(match op {
                        Mutation::Add => MutationOutcome::AlreadyPresent(symbol),
                        Mutation::Remove => MutationOutcome::NotPresent(symbol),
                    });
                }
                error!("Watchlist {:?} {} rejected: {}", op, symbol, source);
                Err(WatchlistError::Request { symbol, source })
            }
            Err(source) => {
                error!("Watchlist {:?} {} failed: {}", op, symbol, source);
                Err(WatchlistError::Request { symbol, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn controller(backend: Arc<FakeBackend>) -> WatchlistController {
        WatchlistController::new(backend, Arc::new(WatchlistCache::new()))
    }

    fn names(snap: &WatchlistSnapshot) -> Vec<String> {
        snap.symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_normalizes_and_refetches() {
        let backend = Arc::new(FakeBackend::new(&[]));
        let ctl = controller(backend.clone());

        let outcome = ctl.add("  btcusdt ").await.unwrap();
        assert_eq!(outcome, MutationOutcome::Added(Symbol::parse("BTCUSDT").unwrap()));
        assert_eq!(names(&ctl.cache().current()), vec!["BTCUSDT"]);
        assert!(!ctl.cache().is_stale());
    }

    #[tokio::test]
    async fn test_duplicate_add_is_idempotent() {
        let backend = Arc::new(FakeBackend::new(&[]));
        backend.reject_duplicates(true);
        let ctl = controller(backend.clone());

        ctl.add("btcusdt").await.unwrap();
        let second = ctl.add("BTCUSDT").await.unwrap();

        assert_eq!(second, MutationOutcome::AlreadyPresent(Symbol::parse("BTCUSDT").unwrap()));
        assert_eq!(names(&ctl.cache().current()), vec!["BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_empty_add_sends_nothing() {
        let backend = Arc::new(FakeBackend::new(&["ETHUSDT"]));
        let ctl = controller(backend.clone());

        assert_eq!(ctl.add("   ").await.unwrap(), MutationOutcome::Ignored);
        assert_eq!(ctl.remove("").await.unwrap(), MutationOutcome::Ignored);
        assert_eq!(backend.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_symbol_rejected_before_request() {
        let backend = Arc::new(FakeBackend::new(&[]));
        let ctl = controller(backend.clone());

        let err = ctl.add("btc/usdt").await.unwrap_err();
        assert!(matches!(err, WatchlistError::Validation(SymbolError::Invalid(_))));
        assert_eq!(backend.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_remove_shrinks_watchlist() {
        let backend = Arc::new(FakeBackend::new(&["BTCUSDT", "ETHUSDT"]));
        let ctl = controller(backend.clone());
        ctl.refresh().await.unwrap();

        let outcome = ctl.remove("ethusdt").await.unwrap();
        assert_eq!(outcome, MutationOutcome::Removed(Symbol::parse("ETHUSDT").unwrap()));
        assert_eq!(names(&ctl.cache().current()), vec!["BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_unchanged() {
        let backend = Arc::new(FakeBackend::new(&["BTCUSDT"]));
        let ctl = controller(backend.clone());
        let before = ctl.refresh().await.unwrap();

        backend.fail_mutations(true);
        let err = ctl.add("SOLUSDT").await.unwrap_err();
        assert!(matches!(err, WatchlistError::Request { source: ApiError::Transport(_), .. }));

        let after = ctl.cache().current();
        assert_eq!(names(&after), vec!["BTCUSDT"]);
        assert_eq!(after.version, before.version);
    }

    #[tokio::test]
    async fn test_rejected_add_of_missing_symbol_is_error() {
        let backend = Arc::new(FakeBackend::new(&[]));
        backend.reject_all(true);
        let ctl = controller(backend.clone());

        let before = ctl.refresh().await.unwrap();

        let err = ctl.add("DOGEUSDT").await.unwrap_err();
        assert!(matches!(err, WatchlistError::Request { source: ApiError::Rejected(_), .. }));
        let after = ctl.cache().current();
        assert!(after.is_empty());
        assert_eq!(after.version, before.version);
        assert_eq!(after.fetched_at, before.fetched_at);
    }

    #[tokio::test]
    async fn test_rejected_remove_of_absent_symbol_is_not_present() {
        let backend = Arc::new(FakeBackend::new(&["BTCUSDT"]));
        backend.reject_all(true);
        let ctl = controller(backend.clone());

        let outcome = ctl.remove("ETHUSDT").await.unwrap();
        assert_eq!(outcome, MutationOutcome::NotPresent(Symbol::parse("ETHUSDT").unwrap()));
        assert_eq!(names(&ctl.cache().current()), vec!["BTCUSDT"]);
    }
}
