//! Error taxonomy for an import run.

use std::path::PathBuf;

use thiserror::Error;


/// Exit code for malformed or invalid input documents (EX_DATAERR).
pub const EXIT_DATA_ERROR: i32 = 65;
/// Exit code when the input document cannot be read (EX_NOINPUT).
pub const EXIT_NO_INPUT: i32 = 66;
/// Exit code for store write failures (EX_IOERR).
pub const EXIT_IO_ERROR: i32 = 74;
/// Exit code when the store is locked by another writer (EX_TEMPFAIL).
pub const EXIT_TEMP_FAIL: i32 = 75;


/// Everything that can abort an import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{message} ({location})")]
    SchemaValidation { location: String, message: String },

    #[error("invalid date {value:?} at {location}, expected YYYY-MM-DD")]
    DateFormat { location: String, value: String },

    #[error("value {value} for `{field}` at {location} is out of range: {reason}")]
    Range {
        location: String,
        field: String,
        value: String,
        reason: String,
    },

    #[error("store {} is locked by another process; retry once it is released", path.display())]
    StoreLocked {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("write to store {} failed: {source}", path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot prepare store {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}


impl ImportError {
    /// Classify a SQLite error raised while working on the store at `path`.
    pub fn from_store(path: &std::path::Path, source: rusqlite::Error) -> Self {
        let path = path.to_path_buf();
        match source.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                ImportError::StoreLocked { path, source }
            }
            _ => ImportError::StoreWrite { path, source },
        }
    }

    /// Name of the failure kind shown to the operator.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Input { .. } => "InputError",
            ImportError::Parse(_) => "ParseError",
            ImportError::SchemaValidation { .. } => "SchemaValidationError",
            ImportError::DateFormat { .. } => "DateFormatError",
            ImportError::Range { .. } => "RangeError",
            ImportError::StoreLocked { .. } => "StoreLockedError",
            ImportError::StoreWrite { .. } | ImportError::StoreIo { .. } => "StoreWriteError",
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ImportError::Input { .. } => EXIT_NO_INPUT,
            ImportError::Parse(_)
            | ImportError::SchemaValidation { .. }
            | ImportError::DateFormat { .. }
            | ImportError::Range { .. } => EXIT_DATA_ERROR,
            ImportError::StoreLocked { .. } => EXIT_TEMP_FAIL,
            ImportError::StoreWrite { .. } | ImportError::StoreIo { .. } => EXIT_IO_ERROR,
        }
    }
}
