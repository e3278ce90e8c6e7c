//! Importer settings and their defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::models::LoadMode;


/// Default report document written by the export step.
pub const DEFAULT_JSON_PATH: &str = "data/export.json";

/// Default SQLite store read by the dashboards.
pub const DEFAULT_DB_PATH: &str = "claude_usage.db";

/// Default wait for another writer to release the store (milliseconds).
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Days listed in the verbose report.
pub const DEFAULT_RECENT_DAYS: usize = 5;


/// How the run reports its result on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}


/// Everything an import run needs, passed explicitly into the command.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub json_path: PathBuf,
    pub db_path: PathBuf,
    pub mode: LoadMode,
    pub verbose: bool,
    pub lock_timeout: Duration,
    pub recent_days: usize,
    pub format: OutputFormat,
}


impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from(DEFAULT_JSON_PATH),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            mode: LoadMode::default(),
            verbose: false,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            recent_days: DEFAULT_RECENT_DAYS,
            format: OutputFormat::default(),
        }
    }
}
