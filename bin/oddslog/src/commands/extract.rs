use oddslog_extract::{scan_page, RecordExtractor};
use oddslog_storage::SnapshotLog;
use std::path::Path;

use super::load_config;

/// Run extraction against a saved page and print the snapshot.
pub fn run(config_path: Option<&Path>, file: &Path, url: &str, save: bool) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;

    let snapshot = scan_page(&RecordExtractor::new(), url, &html);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if save {
        let (_, _, config) = load_config(config_path)?;
        let log = SnapshotLog::from_config(&config.output);
        let path = log.append_snapshots(std::slice::from_ref(&snapshot))?;
        eprintln!("Appended to {}", path.display());
    }

    Ok(())
}
