use oddslog_browser::{BrowserSession, LaunchOptions};
use oddslog_core::GameRecord;
use oddslog_extract::{scan_page, RecordExtractor};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::load_config;

/// First game whose combined team names contain every needle, ignoring case.
pub fn find_game<'a>(games: &'a [GameRecord], needles: &[String]) -> Option<&'a GameRecord> {
    let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();
    games.iter().find(|game| {
        let haystack = format!("{} {}", game.team1, game.team2).to_lowercase();
        needles.iter().all(|n| haystack.contains(n.as_str()))
    })
}

fn snapshot_file_name() -> String {
    format!(
        "draftkings_{}.html",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

pub async fn run(
    config_path: Option<&Path>,
    teams: &[String],
    url: Option<String>,
    save_html: bool,
) -> anyhow::Result<()> {
    let (paths, _, config) = load_config(config_path)?;
    let url = match url.or_else(|| config.capture.urls.first().cloned()) {
        Some(u) => u,
        None => anyhow::bail!("No URL given and capture.urls is empty"),
    };
    paths.ensure_dirs()?;

    let options = LaunchOptions::from_config(
        &config.browser,
        paths.browser_profiles_dir().join(&config.browser.engine),
    )?;
    let mut session = BrowserSession::launch(&options).await?;

    println!("Loading {} ...", url);
    let timeout = Duration::from_secs(config.capture.page_load_timeout_secs);
    if let Err(e) = session.navigate(&url, timeout).await {
        // A slow page usually has the odds rendered already.
        warn!(error = %e, "Page did not finish loading, reading what is there");
    }
    let html = session.page_html().await;
    session.close().await;
    let html = html?;

    if save_html {
        let file_name = snapshot_file_name();
        std::fs::write(&file_name, &html)?;
        println!("HTML saved to {}", file_name);
    }

    let snapshot = scan_page(&RecordExtractor::new(), &url, &html);

    println!();
    println!("{}", "=".repeat(60));
    println!("CURRENT MONEYLINE ODDS");
    println!("{}", "=".repeat(60));
    match find_game(&snapshot.games, teams) {
        Some(game) => {
            println!();
            println!("{}: {}", game.team1, game.team1_moneyline.as_deref().unwrap_or("N/A"));
            println!("{}: {}", game.team2, game.team2_moneyline.as_deref().unwrap_or("N/A"));
            if let Some(start) = &game.start_time {
                println!("Start: {}", start);
            }
        }
        None => {
            println!();
            println!("No game matching {:?} among {} games on the page.", teams, snapshot.games.len());
            println!("The game may not be listed or the page layout has changed.");
        }
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
