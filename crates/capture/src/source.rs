use async_trait::async_trait;
use oddslog_browser::BrowserSession;
use oddslog_core::Result;
use std::time::Duration;

/// What the capture loop needs from a browser tab.
///
/// Navigation and timeout failures (`Error::Navigation`, `Error::Timeout`) are
/// treated as per-page problems; any other error means the source itself is
/// unusable.
#[async_trait]
pub trait PageSource: Send {
    /// Load `url`, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// HTML of whatever is currently rendered.
    async fn page_html(&mut self) -> Result<String>;

    /// URL of the last navigation, if any.
    fn current_url(&self) -> Option<&str>;

    /// Release the underlying resources. Called once, on every exit path.
    async fn close(&mut self);
}

#[async_trait]
impl PageSource for BrowserSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        BrowserSession::navigate(self, url, timeout).await
    }

    async fn page_html(&mut self) -> Result<String> {
        BrowserSession::page_html(self).await
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    async fn close(&mut self) {
        BrowserSession::close(self).await
    }
}
