//! Interactive terminal shell: frame loop plus line commands.

pub mod command;

use anyhow::Result;
use futures::FutureExt;
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::data::api::DashboardBackend;
use crate::data::types::{DebugMode, Symbol};
use crate::monitoring::telemetry;
use crate::polling::poller::{FetchFn, MetricPoller};
use crate::view::board::{spawn_board_sync, TileBoard};
use crate::view::chart::format_ts;
use crate::view::detail::DetailView;
use crate::view::help::METRICS_GUIDE;
use crate::watchlist::cache::WatchlistCache;
use crate::watchlist::controller::{MutationOutcome, WatchlistController, WatchlistError};
use command::{parse_command, Command};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub struct Dashboard {
    config: Config,
    backend: Arc<dyn DashboardBackend>,
    controller: WatchlistController,
    board: Arc<TileBoard>,
    board_sync: JoinHandle<()>,
    mode: MetricPoller<DebugMode>,
    detail: Option<DetailView>,
    status: Option<String>,
    panel: Option<String>,
}

impl Dashboard {
    pub fn new(config: Config, backend: Arc<dyn DashboardBackend>) -> Self {
        let cache = Arc::new(WatchlistCache::new());
        let controller = WatchlistController::new(backend.clone(), cache.clone());
        let board = Arc::new(TileBoard::new(
            backend.clone(),
            config.dashboard.poll_interval(),
            config.dashboard.gauge_width,
        ));
        let board_sync = spawn_board_sync(board.clone(), cache.subscribe());

        let mode = {
            let backend = backend.clone();
            let fetch: FetchFn<DebugMode> = Arc::new(move || {
                let backend = backend.clone();
                async move { backend.debug_mode().await }.boxed()
            });
            MetricPoller::spawn("debug/mode", config.dashboard.watchlist_refresh(), fetch)
        };

        Self {
            config,
            backend,
            controller,
            board,
            board_sync,
            mode,
            detail: None,
            status: None,
            panel: None,
        }
    }

    /// Health check and first watchlist fetch. Neither failure is fatal:
    /// the dashboard shows what it has and retries on schedule.
    pub async fn startup(&mut self) {
        match self.backend.health().await {
            Ok(health) => info!("Backend health: {}", health.status),
            Err(e) => warn!("Backend health check failed: {}", e),
        }
        if let Err(e) = self.controller.refresh().await {
            error!("{}", e);
            self.status = Some(e.to_string());
        }
    }

    /// Apply one command. Returns false when the user asked to quit.
    pub async fn handle(&mut self, command: Command) -> bool {
        self.panel = None;
        match command {
            Command::Add(raw) => {
                let result = self.controller.add(&raw).await;
                self.report(result);
            }
            Command::Remove(raw) => {
                let result = self.controller.remove(&raw).await;
                self.report(result);
            }
            Command::Open(raw) => match Symbol::parse(&raw) {
                Ok(symbol) => {
                    // Old view (and its pollers) is dropped before the new one starts.
                    self.detail = None;
                    self.detail = Some(DetailView::open(
                        self.backend.clone(),
                        symbol,
                        self.config.detail.clone(),
                        self.config.dashboard.poll_interval(),
                    ));
                    self.status = None;
                }
                Err(e) => self.status = Some(e.to_string()),
            },
            Command::Back => {
                self.detail = None;
            }
            Command::Contracts { include_spot } => {
                match self.backend.available_contracts(include_spot).await {
                    Ok(contracts) => {
                        let mut panel = format!("Available contracts ({}):\n", contracts.len());
                        for c in contracts {
                            let spot = if c.has_spot { "spot" } else { "perp-only" };
                            panel.push_str(&format!("  {:<16} {}\n", c.symbol, spot));
                        }
                        self.panel = Some(panel);
                    }
                    Err(e) => {
                        warn!("Contracts fetch failed: {}", e);
                        self.status = Some(format!("Contracts unavailable: {}", e));
                    }
                }
            }
            Command::Refresh => {
                if let Err(e) = self.controller.refresh().await {
                    self.status = Some(e.to_string());
                }
            }
            Command::Help => self.panel = Some(METRICS_GUIDE.to_string()),
            Command::Metrics => {
                self.panel = Some(telemetry::render_metrics().unwrap_or_else(|| {
                    "Built without the `metrics` feature.\n".to_string()
                }));
            }
            Command::Quit => return false,
            Command::Redraw => {}
        }
        true
    }

    fn report(&mut self, result: Result<MutationOutcome, WatchlistError>) {
        self.status = match result {
            Ok(MutationOutcome::Added(s)) => Some(format!("Added {}", s)),
            Ok(MutationOutcome::Removed(s)) => Some(format!("Removed {}", s)),
            Ok(MutationOutcome::AlreadyPresent(s)) => {
                Some(format!("{} is already on the watchlist", s))
            }
            Ok(MutationOutcome::NotPresent(s)) => Some(format!("{} is not on the watchlist", s)),
            Ok(MutationOutcome::Ignored) => None,
            Err(e) => Some(format!("Error: {}", e)),
        };
    }

    pub fn render(&self, now_ms: i64) -> String {
        let watchlist = self.controller.cache().current();
        let mode = match self.mode.snapshot().data.as_deref() {
            Some(DebugMode { use_ws: true }) => "ws",
            Some(DebugMode { use_ws: false }) => "rest",
            None => "unknown",
        };

        let mut out = String::new();
        out.push_str(&format!(
            "Short-Risk Radar   ingest: {}   {}\n",
            mode,
            format_ts(now_ms)
        ));
        if watchlist.is_empty() {
            out.push_str("Watchlist: []");
        } else {
            let names: Vec<&str> = watchlist.symbols.iter().map(|s| s.as_str()).collect();
            out.push_str(&format!("Watchlist ({}): {:?}", watchlist.len(), names));
        }
        if let Some(at) = watchlist.fetched_at {
            out.push_str(&format!(" (fetched {})", format_ts(at.timestamp_millis())));
        }
        if watchlist.stale {
            out.push_str(" (refreshing)");
        }
        out.push('\n');
        if let Some(status) = &self.status {
            out.push_str(&format!("> {}\n", status));
        }
        if let Some(panel) = &self.panel {
            out.push('\n');
            out.push_str(panel);
        }
        out.push('\n');

        match &self.detail {
            Some(detail) => out.push_str(&detail.render()),
            None => out.push_str(&self.board.render(&watchlist.symbols, now_ms)),
        }
        out
    }

    fn draw(&self) {
        let frame = self.render(chrono::Utc::now().timestamp_millis());
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}{}\n: ", CLEAR_SCREEN, frame);
        let _ = stdout.flush();
    }

    /// Drive the dashboard until `quit`, end of input or Ctrl-C.
    pub async fn run(mut self) -> Result<()> {
        self.startup().await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut frame = interval(self.config.dashboard.frame_interval());
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let period = self.config.dashboard.watchlist_refresh();
        let mut refresh = interval_at(Instant::now() + period, period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = frame.tick() => {
                    if self.controller.cache().is_stale() {
                        if let Err(e) = self.controller.refresh().await {
                            warn!("{}", e);
                        }
                    }
                    self.draw();
                }
                _ = refresh.tick() => {
                    if let Err(e) = self.controller.refresh().await {
                        warn!("{}", e);
                    }
                }
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => {
                            match parse_command(&line) {
                                Ok(command) => {
                                    if !self.handle(command).await {
                                        break;
                                    }
                                }
                                Err(e) => self.status = Some(e.to_string()),
                            }
                            self.draw();
                        }
                        Ok(None) => {
                            info!("Input closed; dashboard keeps running until Ctrl-C");
                            stdin_open = false;
                        }
                        Err(e) => {
                            warn!("Failed to read input: {}", e);
                            stdin_open = false;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        info!("Shutting down...");
        Ok(())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.board_sync.abort();
        self.board.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{snapshot, FakeBackend};
    use std::time::Duration;

    fn dashboard(backend: Arc<FakeBackend>) -> Dashboard {
        let mut config = Config::default();
        config.dashboard.poll_interval_secs = 1;
        Dashboard::new(config, backend)
    }

    #[tokio::test]
    async fn test_empty_dashboard_shows_placeholder() {
        let backend = Arc::new(FakeBackend::new(&[]));
        let mut dash = dashboard(backend);
        dash.startup().await;

        let frame = dash.render(0);
        assert!(frame.contains("Watchlist: []"));
        assert!(frame.contains("No symbols in watchlist."));
    }

    #[tokio::test]
    async fn test_add_reports_and_renders_tile() {
        let backend = Arc::new(FakeBackend::new(&[]));
        backend.set_snapshot(snapshot("BTCUSDT", 30.0, "GREEN"));
        let mut dash = dashboard(backend);
        dash.startup().await;

        assert!(dash.handle(Command::Add("btcusdt".into())).await);
        let frame = dash.render(0);
        assert!(frame.contains("> Added BTCUSDT"));
        assert!(frame.contains("BTCUSDT"));
        assert!(!frame.contains("No symbols in watchlist."));

        assert!(dash.handle(Command::Add("BTCUSDT".into())).await);
        assert!(dash.render(0).contains("Watchlist (1): [\"BTCUSDT\"]"));
    }

    #[tokio::test]
    async fn test_failed_add_is_reported() {
        let backend = Arc::new(FakeBackend::new(&["ETHUSDT"]));
        let mut dash = dashboard(backend.clone());
        dash.startup().await;

        backend.fail_mutations(true);
        dash.handle(Command::Add("SOLUSDT".into())).await;
        let frame = dash.render(0);
        assert!(frame.contains("> Error: Watchlist request for SOLUSDT failed"));
        assert!(frame.contains("Watchlist (1): [\"ETHUSDT\"]"));
    }

    #[tokio::test]
    async fn test_open_and_back() {
        let backend = Arc::new(FakeBackend::new(&["BTCUSDT"]));
        let mut dash = dashboard(backend);
        dash.startup().await;

        dash.handle(Command::Open("btcusdt".into())).await;
        assert!(dash.render(0).contains("BTCUSDT Detail"));
        assert_eq!(dash.detail.as_ref().map(|d| d.symbol().as_str()), Some("BTCUSDT"));

        dash.handle(Command::Back).await;
        assert!(dash.detail.is_none());
        assert!(!dash.render(0).contains("Detail"));
    }

    #[tokio::test]
    async fn test_contracts_panel_and_quit() {
        let backend = Arc::new(FakeBackend::new(&[]));
        let mut dash = dashboard(backend);

        dash.handle(Command::Contracts { include_spot: false }).await;
        let frame = dash.render(0);
        assert!(frame.contains("MEMEUSDT"));
        assert!(!frame.contains("BTCUSDT"));

        assert!(!dash.handle(Command::Quit).await);
    }

    #[tokio::test]
    async fn test_mode_indicator() {
        let backend = Arc::new(FakeBackend::new(&[]));
        let dash = dashboard(backend);
        let mut rx = dash.mode.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.data.is_some()))
            .await
            .unwrap()
            .unwrap();

        assert!(dash.render(0).contains("ingest: ws"));
    }
}
