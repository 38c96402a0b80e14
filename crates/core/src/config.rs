use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    /// Force a full page load every N iterations; the first iteration always loads.
    #[serde(default = "default_reload_interval")]
    pub reload_interval: u64,
    /// Pause between iterations.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,
}

fn default_urls() -> Vec<String> {
    vec!["https://sportsbook.draftkings.com/leagues/basketball/ncaab".to_string()]
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_reload_interval() -> u64 {
    60
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_page_load_timeout_secs() -> u64 {
    5
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            max_iterations: default_max_iterations(),
            reload_interval: default_reload_interval(),
            interval_ms: default_interval_ms(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// "chrome" or "edge".
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub headed: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: Option<String>,
    #[serde(default = "default_block_images")]
    pub block_images: bool,
    /// Persistent user data dir. A fresh dir under the oddslog base is used otherwise.
    #[serde(default)]
    pub profile_dir: Option<String>,
}

fn default_engine() -> String {
    "chrome".to_string()
}

fn default_user_agent() -> Option<String> {
    Some("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string())
}

fn default_block_images() -> bool {
    true
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headed: false,
            user_agent: default_user_agent(),
            block_images: default_block_images(),
            profile_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Root under which the per-day `YYYY-MM-DD` directories are created.
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Also maintain the cumulative JSON array file.
    #[serde(default)]
    pub json_array: bool,
    #[serde(default = "default_array_file_name")]
    pub array_file_name: String,
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_file_name() -> String {
    "scraped_data.jsonl".to_string()
}

fn default_array_file_name() -> String {
    "scraped_data.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            file_name: default_file_name(),
            json_array: false,
            array_file_name: default_array_file_name(),
        }
    }
}

impl OutputConfig {
    pub fn dir_path(&self) -> PathBuf {
        expand_home(&self.dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.urls.is_empty() {
            return Err(Error::Config("capture.urls must not be empty".to_string()));
        }
        if let Some(url) = self
            .capture
            .urls
            .iter()
            .find(|u| !(u.starts_with("https://") || u.starts_with("http://")))
        {
            return Err(Error::Config(format!(
                "capture.urls entry is not an http(s) URL: {}",
                url
            )));
        }
        if self.capture.max_iterations == 0 {
            return Err(Error::Config("capture.maxIterations must be at least 1".to_string()));
        }
        if self.output.file_name.trim().is_empty() {
            return Err(Error::Config("output.fileName must not be empty".to_string()));
        }
        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"{
  "capture": { "urls": ["https://example.com/nfl"], "reloadInterval": 30 },
  "output": { "jsonArray": true }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.capture.urls, vec!["https://example.com/nfl".to_string()]);
        assert_eq!(cfg.capture.reload_interval, 30);
        assert_eq!(cfg.capture.max_iterations, 1000);
        assert_eq!(cfg.capture.interval_ms, 1000);
        assert!(cfg.output.json_array);
        assert_eq!(cfg.output.file_name, "scraped_data.jsonl");
        assert_eq!(cfg.browser.engine, "chrome");
        assert!(cfg.browser.block_images);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.capture.max_iterations = 5;
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.capture.max_iterations, 5);
        assert_eq!(loaded.capture.urls, cfg.capture.urls);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg.capture.reload_interval, 60);
    }

    #[test]
    fn test_empty_urls_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"capture": {"urls": []}}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_schemeless_url_rejected() {
        let mut cfg = Config::default();
        cfg.capture.urls = vec![
            "https://sportsbook.draftkings.com/leagues/football/nfl".to_string(),
            "sportsbook.draftkings.com/leagues/basketball/nba".to_string(),
        ];
        match cfg.validate() {
            Err(Error::Config(msg)) => assert!(msg.contains("basketball/nba")),
            other => panic!("expected config error, got {:?}", other),
        }

        cfg.capture.urls.pop();
        assert!(cfg.validate().is_ok());
    }
}
