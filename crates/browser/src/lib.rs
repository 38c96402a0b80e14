//! Headless browser collaborator driven over the Chrome DevTools Protocol.
//!
//! The capture loop only needs two things from a browser: load a URL within a
//! deadline, and hand back the current page HTML. Everything else here is
//! process management around that.

pub mod cdp;
pub mod session;

pub use cdp::CdpClient;
pub use session::{BrowserEngine, BrowserSession, LaunchOptions};
