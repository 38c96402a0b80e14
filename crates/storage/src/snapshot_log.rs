use chrono::Local;
use oddslog_core::config::OutputConfig;
use oddslog_core::{LifecycleEvent, LifecycleMarker, LogEntry, Result, Snapshot};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Local calendar date used to name the per-day log directory.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Append-only JSON Lines log, one directory per day.
///
/// Every write opens the day's file in append mode and adds whole lines. Prior
/// content is never read or rewritten, so a write costs the same no matter how
/// large the file has grown, and a damaged earlier line cannot block new ones.
pub struct SnapshotLog {
    root: PathBuf,
    file_name: String,
}

impl SnapshotLog {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(output.dir_path(), output.file_name.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Appends one line per snapshot. Returns the file written to.
    pub fn append_snapshots(&self, snapshots: &[Snapshot]) -> Result<PathBuf> {
        self.append_lines(snapshots)
    }

    pub fn write_marker(&self, event: LifecycleEvent) -> Result<LifecycleMarker> {
        let marker = LifecycleMarker::now(event);
        let path = self.append_lines(std::slice::from_ref(&marker))?;
        debug!(marker = event.as_str(), path = %path.display(), "Lifecycle marker written");
        Ok(marker)
    }

    fn append_lines<T: Serialize>(&self, items: &[T]) -> Result<PathBuf> {
        // Serialize everything up front so a failure leaves no partial line behind.
        let mut buf = String::new();
        for item in items {
            buf.push_str(&serde_json::to_string(item)?);
            buf.push('\n');
        }

        let log_file = self.current_file_path();
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        file.write_all(buf.as_bytes())?;
        file.sync_data()?;

        Ok(log_file)
    }

    /// Path for the current date. Evaluated per write, so a run that
    /// crosses midnight moves on to the next day's directory.
    pub fn current_file_path(&self) -> PathBuf {
        self.file_for(&today())
    }

    pub fn file_for(&self, date: &str) -> PathBuf {
        self.root.join(date).join(&self.file_name)
    }

    /// Parse a day's log. Blank and unparseable lines are skipped.
    pub fn read_entries(&self, date: &str) -> Result<Vec<LogEntry>> {
        let log_file = self.file_for(date);

        if !log_file.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&log_file)?;
        let mut entries = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    error!(error = %e, line = %line, "Failed to parse log line");
                }
            }
        }

        Ok(entries)
    }

    pub fn read_today(&self) -> Result<Vec<LogEntry>> {
        self.read_entries(&today())
    }

    /// Dates that have a log file under the root, oldest first.
    pub fn list_dates(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let is_date = chrono::NaiveDate::parse_from_str(&name, "%Y-%m-%d").is_ok();
            if is_date && entry.path().join(&self.file_name).is_file() {
                dates.push(name);
            }
        }
        dates.sort();
        Ok(dates)
    }
}
