mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "oddslog")]
#[command(about = "Sportsbook moneyline scraper with an append-only odds log", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.oddslog/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured pages and append snapshots to the daily log
    Capture {
        /// Page to capture (repeatable, overrides capture.urls)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Number of iterations before stopping
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Full reload every N iterations (0 = only the first)
        #[arg(long)]
        reload_interval: Option<u64>,

        /// Pause between iterations in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Root directory for the per-day logs
        #[arg(long)]
        output_dir: Option<String>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Extract games from a saved HTML page
    Extract {
        /// HTML file to read
        file: PathBuf,

        /// URL recorded in the snapshot
        #[arg(long, default_value = "file")]
        url: String,

        /// Also append the snapshot to today's log
        #[arg(long)]
        save: bool,
    },

    /// Load a page once and print the moneylines for one game
    Moneyline {
        /// Team name fragment (repeatable, all must match)
        #[arg(long = "team", required = true)]
        teams: Vec<String>,

        /// Page to load (default: first capture URL)
        #[arg(long)]
        url: Option<String>,

        /// Write the raw page next to the current directory
        #[arg(long)]
        save_html: bool,
    },

    /// Summarize a day's capture log
    Logs {
        /// Day to summarize (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config_path = cli.config;

    match cli.command {
        Commands::Capture {
            urls,
            max_iterations,
            reload_interval,
            interval_ms,
            output_dir,
            headed,
        } => {
            let overrides = commands::capture::Overrides {
                urls,
                max_iterations,
                reload_interval,
                interval_ms,
                output_dir,
                headed,
            };
            commands::capture::run(config_path.as_deref(), overrides).await?;
        }
        Commands::Extract { file, url, save } => {
            commands::extract::run(config_path.as_deref(), &file, &url, save)?;
        }
        Commands::Moneyline {
            teams,
            url,
            save_html,
        } => {
            commands::moneyline::run(config_path.as_deref(), &teams, url, save_html).await?;
        }
        Commands::Logs { date } => {
            commands::logs_cmd::run(config_path.as_deref(), date)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show(config_path.as_deref())?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(config_path.as_deref(), force)?;
            }
        },
    }

    Ok(())
}
