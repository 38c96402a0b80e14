pub mod capture;
pub mod shutdown;
pub mod source;

pub use capture::{should_reload, CaptureExit, CaptureLoop, CaptureReport, CaptureSettings, CaptureState};
pub use shutdown::{wait_for_termination, Shutdown};
pub use source::PageSource;
