use oddslog_core::config::OutputConfig;
use oddslog_core::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::snapshot_log::today;

/// One cumulative JSON array per day, for tools that want a single document.
///
/// Each append reads and rewrites the whole file. The JSONL log is the record
/// of truth; this file is a convenience copy.
pub struct JsonArrayLog {
    root: PathBuf,
    file_name: String,
}

impl JsonArrayLog {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(output.dir_path(), output.array_file_name.clone())
    }

    pub fn file_for(&self, date: &str) -> PathBuf {
        self.root.join(date).join(&self.file_name)
    }

    pub fn append<T: Serialize>(&self, items: &[T]) -> Result<PathBuf> {
        let path = self.file_for(&today());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut existing = load_existing(&path)?;
        for item in items {
            existing.push(serde_json::to_value(item)?);
        }

        let content = serde_json::to_string_pretty(&existing)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Absent, empty and syntactically broken files start a fresh array; a lone
/// object is wrapped. A file that cannot be read, or is not UTF-8, is an
/// error and is left untouched.
fn load_existing(path: &Path) -> Result<Vec<Value>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let content = String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Ok(vec![other]),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Array log is not valid JSON, starting over");
            Ok(Vec::new())
        }
    }
}
