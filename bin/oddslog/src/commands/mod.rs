pub mod capture;
pub mod config_cmd;
pub mod extract;
pub mod logs_cmd;
pub mod moneyline;

use oddslog_core::{Config, Paths};
use std::path::{Path, PathBuf};

/// `--config` wins over `~/.oddslog/config.json`.
pub fn config_location(paths: &Paths, config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file())
}

/// Loads the config, falling back to defaults when the file does not exist.
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<(Paths, PathBuf, Config)> {
    let paths = Paths::new();
    let path = config_location(&paths, config_path);
    let config = Config::load_or_default(&path)?;
    Ok((paths, path, config))
}
