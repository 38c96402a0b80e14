use chrono::Utc;
use oddslog_core::types::epoch_seconds;
use oddslog_core::{GameRecord, Snapshot};

use crate::dedup::dedup_games;
use crate::extractor::RecordExtractor;

/// Stamps `games` with the current time.
pub fn assemble(url: &str, games: Vec<GameRecord>) -> Snapshot {
    Snapshot {
        timestamp: epoch_seconds(Utc::now()),
        url: url.to_string(),
        games,
    }
}

/// What a failed or timed-out load records for its URL.
pub fn empty(url: &str) -> Snapshot {
    assemble(url, Vec::new())
}

/// Extract, dedup and stamp one page.
pub fn scan_page(extractor: &RecordExtractor, url: &str, html: &str) -> Snapshot {
    assemble(url, dedup_games(extractor.extract(html)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::tests::{event, page};

    #[test]
    fn test_scan_page_dedups_repeated_events() {
        let html = page(&[
            event("Dallas Cowboys", "Las Vegas Raiders", "-150", "+130", ""),
            event("Las Vegas Raiders", "Dallas Cowboys", "+130", "-150", ""),
        ]);
        let before = epoch_seconds(Utc::now());
        let snapshot = scan_page(&RecordExtractor::new(), "https://example.com/nfl", &html);

        assert_eq!(snapshot.url, "https://example.com/nfl");
        assert_eq!(snapshot.games.len(), 1);
        assert!(snapshot.timestamp >= before);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = empty("https://example.com/nba");
        assert!(snapshot.games.is_empty());
        assert!(snapshot.timestamp > 0.0);
    }
}
