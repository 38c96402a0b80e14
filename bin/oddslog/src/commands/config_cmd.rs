use oddslog_core::{Config, Paths};
use std::path::Path;

use super::{config_location, load_config};

/// Show the effective configuration as pretty-printed JSON.
pub fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let (_, path, config) = load_config(config_path)?;

    println!();
    println!("📋 Current Configuration");
    if path.exists() {
        println!("  File: {}", path.display());
    } else {
        println!("  File: {} (not found, showing defaults)", path.display());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Write the default configuration.
pub fn init(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = config_location(&Paths::new(), config_path);

    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    Config::default().save(&path)?;
    println!("✓ Wrote default config to {}", path.display());
    Ok(())
}
