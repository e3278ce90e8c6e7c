//! Configuration for the importer.

mod settings;

pub use settings::{
    ImporterConfig,
    OutputFormat,
    DEFAULT_DB_PATH,
    DEFAULT_JSON_PATH,
    DEFAULT_LOCK_TIMEOUT_MS,
    DEFAULT_RECENT_DAYS,
};
