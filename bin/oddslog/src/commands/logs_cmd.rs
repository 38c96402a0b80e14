use chrono::{Local, TimeZone};
use oddslog_core::{LifecycleEvent, LogEntry, Snapshot};
use oddslog_storage::{today, SnapshotLog};
use std::collections::BTreeMap;
use std::path::Path;

use super::load_config;

#[derive(Debug, Default)]
pub struct LogSummary<'a> {
    pub sessions: usize,
    pub stops: usize,
    pub snapshots: usize,
    pub games: usize,
    /// Time of the newest line, marker or snapshot.
    pub last_timestamp: Option<f64>,
    pub latest_by_url: BTreeMap<&'a str, &'a Snapshot>,
}

pub fn summarize(entries: &[LogEntry]) -> LogSummary<'_> {
    let mut summary = LogSummary::default();
    for entry in entries {
        let ts = entry.timestamp();
        if summary.last_timestamp.map_or(true, |last| ts > last) {
            summary.last_timestamp = Some(ts);
        }
        match entry {
            LogEntry::Marker(marker) => match marker.message {
                LifecycleEvent::Start => summary.sessions += 1,
                LifecycleEvent::Stop => summary.stops += 1,
            },
            LogEntry::Snapshot(snapshot) => {
                summary.snapshots += 1;
                summary.games += snapshot.games.len();
                let latest = summary
                    .latest_by_url
                    .entry(snapshot.url.as_str())
                    .or_insert(snapshot);
                if snapshot.timestamp >= latest.timestamp {
                    *latest = snapshot;
                }
            }
        }
    }
    summary
}

fn format_timestamp(ts: f64) -> String {
    let secs = ts.trunc() as i64;
    let nanos = (ts.fract() * 1e9) as u32;
    match Local.timestamp_opt(secs, nanos).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => format!("{:.3}", ts),
    }
}

/// Print a summary of one day's log.
pub fn run(config_path: Option<&Path>, date: Option<String>) -> anyhow::Result<()> {
    let (_, _, config) = load_config(config_path)?;
    let log = SnapshotLog::from_config(&config.output);
    let date = date.unwrap_or_else(today);

    let path = log.file_for(&date);
    if !path.exists() {
        println!("(No log for {})", date);
        let dates = log.list_dates()?;
        if !dates.is_empty() {
            println!("Available: {}", dates.join(", "));
        }
        return Ok(());
    }

    let entries = log.read_entries(&date)?;
    let summary = summarize(&entries);

    println!("📋 {}", path.display());
    println!("  Sessions:  {} started, {} stopped", summary.sessions, summary.stops);
    println!("  Snapshots: {}", summary.snapshots);
    println!("  Games:     {}", summary.games);
    if let Some(ts) = summary.last_timestamp {
        println!("  Last line: {}", format_timestamp(ts));
    }

    for (url, snapshot) in &summary.latest_by_url {
        println!();
        println!("{} (latest {})", url, format_timestamp(snapshot.timestamp));
        if snapshot.games.is_empty() {
            println!("  (no games)");
        }
        for game in &snapshot.games {
            println!(
                "  {} {} / {} {}{}",
                game.team1,
                game.team1_moneyline.as_deref().unwrap_or("-"),
                game.team2,
                game.team2_moneyline.as_deref().unwrap_or("-"),
                game.start_time
                    .as_deref()
                    .map(|s| format!("  [{}]", s))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}
