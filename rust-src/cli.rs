//! CLI definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::commands;
use crate::config::{
    ImporterConfig,
    OutputFormat,
    DEFAULT_DB_PATH,
    DEFAULT_JSON_PATH,
    DEFAULT_LOCK_TIMEOUT_MS,
    DEFAULT_RECENT_DAYS,
};
use crate::logging::init_logging;
use crate::models::LoadMode;


/// Import ccusage daily reports into a SQLite store for dashboards
#[derive(Parser, Debug)]
#[command(name = "ccimport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the ccusage JSON report
    #[arg(long = "json", env = "CCIMPORT_JSON", default_value = DEFAULT_JSON_PATH)]
    json_path: PathBuf,

    /// Path to the SQLite store
    #[arg(long = "db", env = "CCIMPORT_DB", default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// replace: clear existing rows first; append: update or insert by key
    #[arg(long, value_enum, default_value_t = LoadMode::FullReplace)]
    mode: LoadMode,

    /// How long to wait for another writer to release the store
    #[arg(long, default_value_t = DEFAULT_LOCK_TIMEOUT_MS)]
    lock_timeout_ms: u64,

    /// Days listed in the verbose report
    #[arg(long = "recent", default_value_t = DEFAULT_RECENT_DAYS)]
    recent_days: usize,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print summary statistics and progress
    #[arg(short, long)]
    verbose: bool,
}


impl Cli {
    /// Turn parsed arguments into the importer configuration.
    pub fn into_config(self) -> ImporterConfig {
        ImporterConfig {
            json_path: self.json_path,
            db_path: self.db_path,
            mode: self.mode,
            verbose: self.verbose,
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            recent_days: self.recent_days,
            format: self.format,
        }
    }
}


/// Run the CLI
pub fn run() -> anyhow::Result<()> {
    let config = Cli::parse().into_config();
    init_logging(config.verbose);

    commands::import::run(&config)
}
