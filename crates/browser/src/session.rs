//! Browser process lifecycle.
//!
//! A `BrowserSession` owns one Chrome-family process and a CDP connection to its
//! first page target. Dropping the session kills the process.

use super::cdp::CdpClient;
use oddslog_core::config::BrowserConfig;
use oddslog_core::{Error, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const CDP_READY_TIMEOUT_SECS: u64 = 15;

/// Image requests skipped when images are blocked.
const IMAGE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico",
];

/// Supported browser engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
}

impl BrowserEngine {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" => Some(Self::Chrome),
            "edge" | "msedge" => Some(Self::Edge),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub engine: BrowserEngine,
    pub headed: bool,
    pub user_agent: Option<String>,
    pub block_images: bool,
    pub user_data_dir: PathBuf,
}

impl LaunchOptions {
    /// `default_profile_dir` is used when the config names no profile.
    pub fn from_config(config: &BrowserConfig, default_profile_dir: PathBuf) -> Result<Self> {
        let engine = BrowserEngine::parse(&config.engine).ok_or_else(|| {
            Error::Config(format!("Unsupported browser engine: {}", config.engine))
        })?;
        Ok(Self {
            engine,
            headed: config.headed,
            user_agent: config.user_agent.clone(),
            block_images: config.block_images,
            user_data_dir: config
                .profile_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(default_profile_dir),
        })
    }
}

/// A running browser with its CDP client.
pub struct BrowserSession {
    pub engine: BrowserEngine,
    process: Child,
    pub cdp: CdpClient,
    /// Last URL a navigation was started for.
    pub current_url: Option<String>,
}

impl BrowserSession {
    /// Launch a browser instance and connect via CDP.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let browser_path = find_browser_binary(options.engine).ok_or_else(|| {
            Error::Browser(format!("{} not found. Please install it.", options.engine.name()))
        })?;

        std::fs::create_dir_all(&options.user_data_dir)?;

        let debug_port = find_free_port().await?;
        let args = build_browser_args(debug_port, &options.user_data_dir, options);

        info!(
            port = debug_port,
            headed = options.headed,
            browser = options.engine.name(),
            "Launching browser"
        );

        let process = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch {}: {}", options.engine.name(), e)))?;

        wait_for_cdp_ready(debug_port, CDP_READY_TIMEOUT_SECS).await?;

        // Page target, not the browser target, so Page.* commands work
        let page_ws_url = get_page_ws_url(debug_port).await?;
        let cdp = CdpClient::connect(&page_ws_url).await?;

        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("Network").await?;

        if let Some(user_agent) = &options.user_agent {
            cdp.set_user_agent(user_agent).await?;
        }
        if options.block_images {
            cdp.set_blocked_urls(IMAGE_PATTERNS).await?;
        }

        info!(ws_url = %page_ws_url, "CDP connection established (page target)");

        Ok(Self {
            engine: options.engine,
            process,
            cdp,
            current_url: None,
        })
    }

    /// Load `url` and wait for the load event, giving up after `timeout`.
    ///
    /// On timeout the pending load is stopped so the page keeps whatever it
    /// rendered so far.
    pub async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let mut loaded = self.cdp.subscribe_event("Page.loadEventFired").await;
        self.current_url = Some(url.to_string());

        let outcome = tokio::time::timeout(timeout, async {
            self.cdp.navigate(url).await?;
            loaded
                .recv()
                .await
                .ok_or_else(|| Error::Browser("CDP event stream closed".to_string()))?;
            Ok::<(), Error>(())
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = self.cdp.stop_loading().await {
                    debug!(error = %e, "Page.stopLoading failed");
                }
                Err(Error::Timeout(format!(
                    "Page load of {} exceeded {}s",
                    url,
                    timeout.as_secs_f64()
                )))
            }
        }
    }

    /// Serialized DOM of the current page.
    pub async fn page_html(&self) -> Result<String> {
        match self
            .cdp
            .evaluate_js("document.documentElement ? document.documentElement.outerHTML : ''")
            .await?
        {
            Value::String(html) => Ok(html),
            other => Err(Error::Browser(format!("Unexpected outerHTML result: {}", other))),
        }
    }

    /// Close the browser: CDP first, then the process.
    pub async fn close(&mut self) {
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        if let Err(e) = self.process.kill().await {
            debug!("Browser process kill failed (may already be gone): {}", e);
        }
        info!(browser = self.engine.name(), "Browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Best-effort kill on drop
        let _ = self.process.start_kill();
    }
}

fn build_browser_args(debug_port: u16, user_data_dir: &Path, options: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-notifications".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--password-store=basic".to_string(),
    ];
    if options.block_images {
        args.push("--blink-settings=imagesEnabled=false".to_string());
    }
    if !options.headed {
        args.push("--headless=new".to_string());
    }
    args.push("--window-size=1280,720".to_string());
    args.push("about:blank".to_string());
    args
}

/// Find a browser binary on the system for the given engine.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    let candidates = match engine {
        BrowserEngine::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome", "google-chrome-stable",
                    "chromium", "chromium-browser",
                    "/usr/bin/google-chrome", "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserEngine::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec!["microsoft-edge", "microsoft-edge-stable", "/usr/bin/microsoft-edge"]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        let bare_name = !candidate.contains('/') && !candidate.contains('\\');
        if bare_name && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Polls /json/version until Chrome's CDP endpoint answers, up to `timeout_secs`.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "Chrome CDP not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first "page" target listed by /json/list.
/// Retries a few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "Unreadable /json/list response");
                continue;
            }
        };

        if let Some(ws_url) = page_target_ws_url(&targets) {
            return Ok(ws_url);
        }
    }

    Err(Error::Browser("No page target found after retries".to_string()))
}

fn page_target_ws_url(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}
