pub mod json_array;
pub mod snapshot_log;

pub use json_array::JsonArrayLog;
pub use snapshot_log::{today, SnapshotLog};
