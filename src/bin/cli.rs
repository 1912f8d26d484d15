//! Schedule sync CLI
//!
//! Local execution entry point, typically run from cron.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use schedule_sync::{
    error::Result,
    models::{CandidateItem, Config},
    pipeline::{self, classify::ItemClassifier},
    storage::LedgerStore,
    utils::console,
};

/// Schedule change announcement sync
#[derive(Parser, Debug)]
#[command(
    name = "schedule-sync",
    version,
    about = "Republishes schedule change announcements to the backend"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors, no summary output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one full sync cycle
    Run {
        /// Abort the whole run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Enforce retention on the backend only
    Prune,

    /// Show how a title would be classified
    Classify {
        title: String,

        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Validate configuration
    Validate,

    /// Show ledger info
    Info,
}

/// Log level from flags, falling back to the configured level.
fn log_level(cli: &Cli) -> String {
    if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "warn".to_string()
    } else {
        Config::load(&cli.config)
            .map(|config| config.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    }
}

/// Initialize logging; `RUST_LOG` takes precedence.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Directory the ledger path is resolved against.
fn base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&log_level(&cli));
    console::set_quiet(cli.quiet);

    let mut config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return Err(e);
        }
    };
    config.apply_env();
    let base = base_dir(&cli.config);

    match cli.command {
        Command::Run { timeout_secs } => {
            let summary =
                pipeline::run_sync(&config, &base, timeout_secs.map(Duration::from_secs)).await?;
            if summary.failed > 0 || summary.aborted.is_some() {
                log::warn!(
                    "Run finished with {} failed item(s){}",
                    summary.failed,
                    if summary.aborted.is_some() { ", sync phase aborted" } else { "" }
                );
            }
        }

        Command::Prune => {
            let report = pipeline::run_prune(&config).await?;
            log::info!("Deleted {} record(s), kept {}", report.deleted, report.kept);
        }

        Command::Classify { title, today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let classifier = ItemClassifier::new(&config.sync, config.calendar.clone())?;
            let item = classifier.classify(
                CandidateItem {
                    source_ref: "cli".to_string(),
                    raw_title: title,
                },
                today,
            );

            let date = item
                .occurs_on
                .map_or_else(|| "none".to_string(), |d| d.to_string());
            console::summary(
                "Classification",
                &[
                    ("Title", item.normalized_title.clone()),
                    ("Date", date),
                    ("Relevant", item.is_relevant.to_string()),
                    ("Fresh", item.is_fresh.to_string()),
                    ("Actionable", item.is_actionable().to_string()),
                ],
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.ensure_runnable() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            ItemClassifier::new(&config.sync, config.calendar.clone())?;
            log::info!("✓ Config OK (backend, patterns, calendar)");
        }

        Command::Info => {
            let store = LedgerStore::new(config.ledger_path(&base));
            log::info!("Ledger: {}", store.path().display());

            let ledger = store.load().await?;
            log::info!("Seen references: {}", ledger.len());
            match ledger.updated_at() {
                Some(updated) => log::info!("Last updated: {}", updated),
                None => log::info!("Never updated"),
            }
        }
    }

    Ok(())
}
