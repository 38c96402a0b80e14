use oddslog_browser::{BrowserSession, LaunchOptions};
use oddslog_capture::{wait_for_termination, CaptureExit, CaptureLoop, CaptureSettings, Shutdown};
use oddslog_core::Config;
use oddslog_storage::{JsonArrayLog, SnapshotLog};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{error, info};

use super::load_config;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub urls: Vec<String>,
    pub max_iterations: Option<u64>,
    pub reload_interval: Option<u64>,
    pub interval_ms: Option<u64>,
    pub output_dir: Option<String>,
    pub headed: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if !self.urls.is_empty() {
            config.capture.urls = self.urls;
        }
        if let Some(n) = self.max_iterations {
            config.capture.max_iterations = n;
        }
        if let Some(n) = self.reload_interval {
            config.capture.reload_interval = n;
        }
        if let Some(ms) = self.interval_ms {
            config.capture.interval_ms = ms;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if self.headed {
            config.browser.headed = true;
        }
    }
}

pub async fn run(config_path: Option<&Path>, overrides: Overrides) -> anyhow::Result<()> {
    let (paths, _, mut config) = load_config(config_path)?;
    overrides.apply(&mut config);
    config.validate()?;
    paths.ensure_dirs()?;

    let options = LaunchOptions::from_config(
        &config.browser,
        paths.browser_profiles_dir().join(&config.browser.engine),
    )?;
    let session = BrowserSession::launch(&options).await?;

    let log = SnapshotLog::from_config(&config.output);
    info!(root = %log.root().display(), file = %config.output.file_name, "Writing snapshots");

    let mut capture = CaptureLoop::new(session, CaptureSettings::from_config(&config.capture), log);
    if config.output.json_array {
        capture = capture.with_array_log(JsonArrayLog::from_config(&config.output));
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let signal_task = tokio::spawn(async move {
        match wait_for_termination().await {
            Ok(()) => {
                info!("Termination signal received, finishing current iteration");
                let _ = shutdown_tx.send(());
            }
            Err(e) => error!(error = %e, "Failed to install signal handlers"),
        }
    });

    let result = capture.run(Shutdown::new(shutdown_rx)).await;
    signal_task.abort();
    let report = result?;

    let outcome = match report.exit {
        CaptureExit::Completed => "completed",
        CaptureExit::Interrupted => "interrupted",
    };
    println!();
    println!("Capture {}", outcome);
    println!("  Iterations:        {}", report.iterations);
    println!("  Snapshots written: {}", report.snapshots_written);
    if report.persist_failures > 0 {
        println!("  Failed writes:     {}", report.persist_failures);
    }
    if report.array_failures > 0 {
        println!("  Failed array writes: {}", report.array_failures);
    }
    Ok(())
}
