//! Turns a rendered sportsbook listings page into deduplicated game records.

pub mod dedup;
pub mod dom;
pub mod extractor;
pub mod snapshot;
pub mod strategy;

pub use dedup::dedup_games;
pub use extractor::{normalize_moneyline, RecordExtractor};
pub use snapshot::{assemble, empty, scan_page};
