use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One game/event as observed on a listings page.
///
/// Optional fields are left out of the serialized form when absent, so a
/// record with a single moneyline is written without a `team2_moneyline` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub team1: String,
    pub team2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team1_moneyline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team2_moneyline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// All games observed on one URL at one capture instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Seconds since the Unix epoch, with sub-second precision.
    pub timestamp: f64,
    pub url: String,
    #[serde(default)]
    pub games: Vec<GameRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    Start,
    Stop,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Delimits one continuous capture session inside a log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleMarker {
    pub timestamp: f64,
    pub message: LifecycleEvent,
}

impl LifecycleMarker {
    pub fn now(message: LifecycleEvent) -> Self {
        Self {
            timestamp: epoch_seconds(Utc::now()),
            message,
        }
    }
}

/// A single parsed line of a snapshot log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    Marker(LifecycleMarker),
    Snapshot(Snapshot),
}

impl LogEntry {
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Marker(m) => m.timestamp,
            Self::Snapshot(s) => s.timestamp,
        }
    }
}

pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
