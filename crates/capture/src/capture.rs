//! The capture loop.
//!
//! `Init -> Running -> Draining -> Stopped`. Each iteration either reloads the
//! page or re-reads the DOM already rendered, extracts a snapshot per URL and
//! appends the batch to the log. Every way out of `Running` goes through
//! `finalize`, which writes the single `stop` marker and closes the source.

use oddslog_core::config::CaptureConfig;
use oddslog_core::{Error, LifecycleEvent, Result, Snapshot};
use oddslog_extract::{empty, scan_page, RecordExtractor};
use oddslog_storage::{JsonArrayLog, SnapshotLog};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::shutdown::Shutdown;
use crate::source::PageSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Init,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    /// Ran all configured iterations.
    Completed,
    /// Stopped early by a shutdown request.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub iterations: u64,
    /// Snapshots appended to the JSONL log.
    pub snapshots_written: usize,
    /// Iterations whose JSONL append failed.
    pub persist_failures: usize,
    /// Iterations whose array file update failed.
    pub array_failures: usize,
    pub exit: CaptureExit,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub urls: Vec<String>,
    pub max_iterations: u64,
    pub reload_interval: u64,
    pub interval: Duration,
    pub page_load_timeout: Duration,
}

impl CaptureSettings {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            urls: config.urls.clone(),
            max_iterations: config.max_iterations,
            reload_interval: config.reload_interval,
            interval: Duration::from_millis(config.interval_ms),
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
        }
    }
}

/// Full page load on the first iteration and on every multiple of
/// `reload_interval`. An interval of 0 reloads only once.
pub fn should_reload(iteration: u64, reload_interval: u64) -> bool {
    iteration == 1 || (reload_interval > 0 && iteration % reload_interval == 0)
}

fn is_page_failure(e: &Error) -> bool {
    matches!(e, Error::Navigation(_) | Error::Timeout(_))
}

pub struct CaptureLoop<S: PageSource> {
    settings: CaptureSettings,
    source: S,
    log: SnapshotLog,
    array_log: Option<JsonArrayLog>,
    extractor: RecordExtractor,
    state: CaptureState,
    stop_written: bool,
}

impl<S: PageSource> CaptureLoop<S> {
    /// Takes ownership of an already acquired page source.
    pub fn new(source: S, settings: CaptureSettings, log: SnapshotLog) -> Self {
        Self {
            settings,
            source,
            log,
            array_log: None,
            extractor: RecordExtractor::new(),
            state: CaptureState::Init,
            stop_written: false,
        }
    }

    pub fn with_array_log(mut self, array_log: JsonArrayLog) -> Self {
        self.array_log = Some(array_log);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<CaptureReport> {
        if self.state != CaptureState::Init {
            return Err(Error::Capture(format!(
                "capture loop cannot start from state {:?}",
                self.state
            )));
        }

        if let Err(e) = self.log.write_marker(LifecycleEvent::Start) {
            error!(error = %e, "Failed to write start marker");
        }
        self.state = CaptureState::Running;
        info!(
            urls = self.settings.urls.len(),
            max_iterations = self.settings.max_iterations,
            reload_interval = self.settings.reload_interval,
            "Capture started"
        );

        let mut report = CaptureReport {
            iterations: 0,
            snapshots_written: 0,
            persist_failures: 0,
            array_failures: 0,
            exit: CaptureExit::Completed,
        };
        let outcome = self.run_iterations(&mut shutdown, &mut report).await;

        self.finalize().await;

        match outcome {
            Ok(exit) => {
                report.exit = exit;
                info!(
                    iterations = report.iterations,
                    snapshots = report.snapshots_written,
                    exit = ?exit,
                    "Capture finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, iterations = report.iterations, "Capture aborted");
                Err(e)
            }
        }
    }

    async fn run_iterations(
        &mut self,
        shutdown: &mut Shutdown,
        report: &mut CaptureReport,
    ) -> Result<CaptureExit> {
        let urls = self.settings.urls.clone();

        for iteration in 1..=self.settings.max_iterations {
            if shutdown.is_triggered() {
                info!(iteration, "Shutdown requested");
                return Ok(CaptureExit::Interrupted);
            }

            info!(iteration, "Iteration started");
            let reload = should_reload(iteration, self.settings.reload_interval);

            let mut snapshots = Vec::with_capacity(urls.len());
            for url in &urls {
                snapshots.push(self.capture_url(url, reload).await?);
            }
            report.iterations = iteration;

            self.persist(&snapshots, report);

            if iteration == self.settings.max_iterations {
                info!(iteration, "Reached maximum iterations");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.recv() => {
                    info!(iteration, "Shutdown requested");
                    return Ok(CaptureExit::Interrupted);
                }
            }
        }

        Ok(CaptureExit::Completed)
    }

    /// One snapshot for `url`. Page-level failures yield an empty snapshot;
    /// a broken source is returned as an error.
    async fn capture_url(&mut self, url: &str, reload: bool) -> Result<Snapshot> {
        // A single tab shows one URL at a time; re-scanning is only valid if it is ours.
        let on_page = self.source.current_url() == Some(url);

        if reload || !on_page {
            debug!(url = %url, "Loading page");
            if let Err(e) = self
                .source
                .navigate(url, self.settings.page_load_timeout)
                .await
            {
                if is_page_failure(&e) {
                    warn!(url = %url, error = %e, "Page load failed, recording empty snapshot");
                    return Ok(empty(url));
                }
                return Err(e);
            }
        }

        let html = match self.source.page_html().await {
            Ok(html) => html,
            Err(e) if is_page_failure(&e) => {
                warn!(url = %url, error = %e, "Could not read page, recording empty snapshot");
                return Ok(empty(url));
            }
            Err(e) => return Err(e),
        };

        let snapshot = scan_page(&self.extractor, url, &html);
        info!(url = %url, games = snapshot.games.len(), reloaded = reload || !on_page, "Page scanned");
        Ok(snapshot)
    }

    /// Appends the iteration's snapshots to each log. Failures are logged
    /// and counted per log, never raised.
    fn persist(&mut self, snapshots: &[Snapshot], report: &mut CaptureReport) {
        match self.log.append_snapshots(snapshots) {
            Ok(path) => {
                debug!(path = %path.display(), count = snapshots.len(), "Snapshots saved");
                report.snapshots_written += snapshots.len();
            }
            Err(e) => {
                error!(error = %e, "Failed to append snapshots");
                report.persist_failures += 1;
            }
        }

        if let Some(array_log) = &self.array_log {
            if let Err(e) = array_log.append(snapshots) {
                error!(error = %e, "Failed to update array log");
                report.array_failures += 1;
            }
        }
    }

    async fn finalize(&mut self) {
        self.state = CaptureState::Draining;
        self.write_stop_marker();
        self.source.close().await;
        self.state = CaptureState::Stopped;
    }

    fn write_stop_marker(&mut self) {
        if self.stop_written {
            return;
        }
        self.stop_written = true;
        if let Err(e) = self.log.write_marker(LifecycleEvent::Stop) {
            error!(error = %e, "Failed to write stop marker");
        }
    }
}

impl<S: PageSource> Drop for CaptureLoop<S> {
    // Covers a run future that was dropped or panicked before `finalize`.
    fn drop(&mut self) {
        if matches!(self.state, CaptureState::Running | CaptureState::Draining) {
            self.write_stop_marker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oddslog_core::{LifecycleMarker, LogEntry};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    const PAGE: &str = r#"<html><body>
        <div class="cb-static-parlay__content--inner">
          <div class="cb-market__label-inner cb-market__label-inner--parlay">Dallas Cowboys</div>
          <div class="cb-market__label-inner cb-market__label-inner--parlay">Las Vegas Raiders</div>
          <div data-testid="button-odds-market-board"><span data-testid="button-points-market-board">-3</span>-110</div>
          <div data-testid="button-odds-market-board"><span data-testid="button-title-market-board">O</span>-110</div>
          <div data-testid="button-odds-market-board">&#8722;150</div>
          <div data-testid="button-odds-market-board"><span data-testid="button-points-market-board">+3</span>-110</div>
          <div data-testid="button-odds-market-board"><span data-testid="button-title-market-board">U</span>-110</div>
          <div data-testid="button-odds-market-board">+130</div>
        </div>
    </body></html>"#;

    #[derive(Clone, Copy)]
    enum PageFault {
        Timeout,
        Rejected,
    }

    #[derive(Clone, Default)]
    struct Recorder {
        navigations: Arc<Mutex<Vec<String>>>,
        reads: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    struct FakePage {
        recorder: Recorder,
        current: Option<String>,
        /// Every navigation fails this way.
        fail_navigation: Option<PageFault>,
        /// Reading the page times out on this read (1-based).
        timeout_on_read: Option<usize>,
        /// Report a dead browser on this read (1-based).
        broken_on_read: Option<usize>,
        /// Request shutdown on this read (1-based).
        signal_on_read: Option<(usize, broadcast::Sender<()>)>,
    }

    impl FakePage {
        fn new(recorder: &Recorder) -> Self {
            Self {
                recorder: recorder.clone(),
                current: None,
                fail_navigation: None,
                timeout_on_read: None,
                broken_on_read: None,
                signal_on_read: None,
            }
        }
    }

    #[async_trait]
    impl PageSource for FakePage {
        async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
            self.recorder.navigations.lock().unwrap().push(url.to_string());
            match self.fail_navigation {
                Some(PageFault::Timeout) => {
                    return Err(Error::Timeout(format!("{} after {:?}", url, timeout)));
                }
                Some(PageFault::Rejected) => {
                    return Err(Error::Navigation(format!(
                        "{}: Cannot navigate to invalid URL",
                        url
                    )));
                }
                None => {}
            }
            self.current = Some(url.to_string());
            Ok(())
        }

        async fn page_html(&mut self) -> Result<String> {
            let read = self.recorder.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((at, tx)) = &self.signal_on_read {
                if *at == read {
                    let _ = tx.send(());
                }
            }
            if self.timeout_on_read == Some(read) {
                return Err(Error::Timeout("Runtime.evaluate timed out after 30s".to_string()));
            }
            if self.broken_on_read == Some(read) {
                return Err(Error::Browser("CDP response channel closed".to_string()));
            }
            Ok(PAGE.to_string())
        }

        fn current_url(&self) -> Option<&str> {
            self.current.as_deref()
        }

        async fn close(&mut self) {
            self.recorder.closed.store(true, Ordering::SeqCst);
        }
    }

    fn settings(urls: &[&str], max_iterations: u64, reload_interval: u64) -> CaptureSettings {
        CaptureSettings {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            max_iterations,
            reload_interval,
            interval: Duration::ZERO,
            page_load_timeout: Duration::from_secs(5),
        }
    }

    fn idle_shutdown() -> (broadcast::Sender<()>, Shutdown) {
        let (tx, rx) = broadcast::channel(1);
        (tx, Shutdown::new(rx))
    }

    fn entries(log: &SnapshotLog) -> Vec<LogEntry> {
        log.read_today().unwrap()
    }

    fn stop_count(entries: &[LogEntry]) -> usize {
        entries
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    LogEntry::Marker(LifecycleMarker { message: LifecycleEvent::Stop, .. })
                )
            })
            .count()
    }

    #[test]
    fn test_should_reload() {
        assert!(should_reload(1, 60));
        assert!(should_reload(60, 60));
        assert!(should_reload(120, 60));
        assert!(!should_reload(2, 60));
        assert!(!should_reload(61, 60));
        assert!(should_reload(1, 0));
        assert!(!should_reload(7, 0));
    }

    #[tokio::test]
    async fn test_completed_run_writes_markers_and_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(FakePage::new(&recorder), settings(&["https://nfl"], 4, 2), log);
        let (_tx, shutdown) = idle_shutdown();

        let report = capture.run(shutdown).await.unwrap();

        assert_eq!(report.exit, CaptureExit::Completed);
        assert_eq!(report.iterations, 4);
        assert_eq!(report.snapshots_written, 4);
        assert_eq!(capture.state(), CaptureState::Stopped);
        assert!(recorder.closed.load(Ordering::SeqCst));
        // Iterations 1, 2 and 4 reload; 3 re-reads the rendered DOM.
        assert_eq!(recorder.navigations.lock().unwrap().len(), 3);
        assert_eq!(recorder.reads.load(Ordering::SeqCst), 4);

        let entries = entries(&SnapshotLog::new(temp_dir.path(), "log.jsonl"));
        assert_eq!(entries.len(), 6);
        assert!(matches!(
            entries[0],
            LogEntry::Marker(LifecycleMarker { message: LifecycleEvent::Start, .. })
        ));
        assert_eq!(stop_count(&entries), 1);
        let LogEntry::Snapshot(first) = &entries[1] else {
            panic!("expected snapshot, got {:?}", entries[1]);
        };
        assert_eq!(first.url, "https://nfl");
        assert_eq!(first.games.len(), 1);
        assert_eq!(first.games[0].team1_moneyline.as_deref(), Some("-150"));
        assert_eq!(first.games[0].team2_moneyline.as_deref(), Some("+130"));
    }

    #[tokio::test]
    async fn test_shutdown_mid_loop_writes_one_stop_marker() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let (tx, rx) = broadcast::channel(1);
        let mut page = FakePage::new(&recorder);
        page.signal_on_read = Some((3, tx));

        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(page, settings(&["https://nba"], 1000, 60), log);
        let report = capture.run(Shutdown::new(rx)).await.unwrap();

        assert_eq!(report.exit, CaptureExit::Interrupted);
        assert_eq!(report.iterations, 3);
        assert!(recorder.closed.load(Ordering::SeqCst));

        let entries = entries(&SnapshotLog::new(temp_dir.path(), "log.jsonl"));
        assert_eq!(stop_count(&entries), 1);
        assert!(matches!(
            entries.last(),
            Some(LogEntry::Marker(LifecycleMarker { message: LifecycleEvent::Stop, .. }))
        ));
    }

    #[tokio::test]
    async fn test_failed_navigation_records_empty_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut page = FakePage::new(&recorder);
        page.fail_navigation = Some(PageFault::Timeout);

        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(page, settings(&["https://ncaab"], 2, 60), log);
        let (_tx, shutdown) = idle_shutdown();
        let report = capture.run(shutdown).await.unwrap();

        assert_eq!(report.exit, CaptureExit::Completed);
        assert_eq!(report.snapshots_written, 2);
        assert_eq!(recorder.reads.load(Ordering::SeqCst), 0);

        let snapshots: Vec<_> = entries(&SnapshotLog::new(temp_dir.path(), "log.jsonl"))
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Snapshot(s) => Some(s),
                LogEntry::Marker(_) => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| s.games.is_empty()));
    }

    #[tokio::test]
    async fn test_broken_source_is_fatal_but_finalized() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut page = FakePage::new(&recorder);
        page.broken_on_read = Some(2);

        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(page, settings(&["https://nfl"], 10, 60), log);
        let (_tx, shutdown) = idle_shutdown();

        let result = capture.run(shutdown).await;
        assert!(matches!(result, Err(Error::Browser(_))));
        assert!(recorder.closed.load(Ordering::SeqCst));
        assert_eq!(capture.state(), CaptureState::Stopped);

        let entries = entries(&SnapshotLog::new(temp_dir.path(), "log.jsonl"));
        // start, one snapshot, stop
        assert_eq!(entries.len(), 3);
        assert_eq!(stop_count(&entries), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_loop() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file-not-dir");
        std::fs::write(&blocker, "x").unwrap();

        let recorder = Recorder::default();
        let log = SnapshotLog::new(&blocker, "log.jsonl");
        let mut capture = CaptureLoop::new(FakePage::new(&recorder), settings(&["https://nfl"], 3, 60), log);
        let (_tx, shutdown) = idle_shutdown();

        let report = capture.run(shutdown).await.unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.persist_failures, 3);
        assert_eq!(report.snapshots_written, 0);
        assert!(recorder.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_multiple_urls_reload_when_tab_shows_other_page() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(
            FakePage::new(&recorder),
            settings(&["https://nfl", "https://nba"], 2, 60),
            log,
        );
        let (_tx, shutdown) = idle_shutdown();
        let report = capture.run(shutdown).await.unwrap();

        assert_eq!(report.snapshots_written, 4);
        assert_eq!(recorder.navigations.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_stopped_loop_cannot_rerun() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(FakePage::new(&recorder), settings(&["https://nfl"], 1, 60), log);

        let (_tx, shutdown) = idle_shutdown();
        capture.run(shutdown).await.unwrap();
        let lines_after_first = entries(&SnapshotLog::new(temp_dir.path(), "log.jsonl")).len();

        let (_tx, shutdown) = idle_shutdown();
        assert!(matches!(capture.run(shutdown).await, Err(Error::Capture(_))));
        assert_eq!(
            entries(&SnapshotLog::new(temp_dir.path(), "log.jsonl")).len(),
            lines_after_first
        );
    }

    #[tokio::test]
    async fn test_array_log_receives_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let array_log = JsonArrayLog::new(temp_dir.path(), "log.json");
        let mut capture = CaptureLoop::new(FakePage::new(&recorder), settings(&["https://nfl"], 2, 60), log)
            .with_array_log(array_log);
        let (_tx, shutdown) = idle_shutdown();
        capture.run(shutdown).await.unwrap();

        let path = JsonArrayLog::new(temp_dir.path(), "log.json").file_for(&oddslog_storage::today());
        let items: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(items.len(), 2);
    }

    fn snapshots_in(root: &std::path::Path) -> Vec<Snapshot> {
        entries(&SnapshotLog::new(root, "log.jsonl"))
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Snapshot(s) => Some(s),
                LogEntry::Marker(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_read_timeout_records_empty_snapshot_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut page = FakePage::new(&recorder);
        page.timeout_on_read = Some(2);

        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(page, settings(&["https://nfl"], 3, 60), log);
        let (_tx, shutdown) = idle_shutdown();
        let report = capture.run(shutdown).await.unwrap();

        assert_eq!(report.exit, CaptureExit::Completed);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.snapshots_written, 3);
        assert_eq!(recorder.reads.load(Ordering::SeqCst), 3);

        let games: Vec<usize> = snapshots_in(temp_dir.path())
            .iter()
            .map(|s| s.games.len())
            .collect();
        assert_eq!(games, vec![1, 0, 1]);
    }

    #[tokio::test]
    async fn test_rejected_url_does_not_end_run() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut page = FakePage::new(&recorder);
        page.fail_navigation = Some(PageFault::Rejected);

        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(
            page,
            settings(&["sportsbook.draftkings.com/leagues/football/nfl"], 3, 60),
            log,
        );
        let (_tx, shutdown) = idle_shutdown();
        let report = capture.run(shutdown).await.unwrap();

        assert_eq!(report.exit, CaptureExit::Completed);
        assert_eq!(report.iterations, 3);
        // Never on the page, so every iteration retries the load.
        assert_eq!(recorder.navigations.lock().unwrap().len(), 3);
        assert!(snapshots_in(temp_dir.path()).iter().all(|s| s.games.is_empty()));
        assert!(recorder.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_array_failure_counted_apart_from_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file-not-dir");
        std::fs::write(&blocker, "x").unwrap();

        let recorder = Recorder::default();
        let log = SnapshotLog::new(temp_dir.path(), "log.jsonl");
        let mut capture = CaptureLoop::new(FakePage::new(&recorder), settings(&["https://nfl"], 2, 60), log)
            .with_array_log(JsonArrayLog::new(&blocker, "log.json"));
        let (_tx, shutdown) = idle_shutdown();
        let report = capture.run(shutdown).await.unwrap();

        assert_eq!(report.snapshots_written, 2);
        assert_eq!(report.persist_failures, 0);
        assert_eq!(report.array_failures, 2);
        assert_eq!(snapshots_in(temp_dir.path()).len(), 2);
    }
}
