//! Load modes and the summary returned by a load.

use serde::Serialize;


/// How an import treats rows already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LoadMode {
    /// Discard both tables' contents, then insert the document.
    #[default]
    #[value(name = "replace")]
    FullReplace,
    /// Upsert by key, leaving rows absent from the document untouched.
    #[value(name = "append")]
    IncrementalMerge,
}


impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::FullReplace => "replace",
            LoadMode::IncrementalMerge => "append",
        }
    }
}


/// Rows written by one table during a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteCounts {
    pub inserted: usize,
    pub updated: usize,
    /// Rows present in the table after the load.
    pub total: i64,
}


impl WriteCounts {
    /// Rows inserted or updated.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}


/// Derived statistics over the imported entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub total_cost: f64,
    pub total_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    /// Percentage in `0.0..=100.0`.
    pub cache_hit_rate: f64,
}


/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub mode: &'static str,
    pub daily: WriteCounts,
    pub models: WriteCounts,
    pub stats: ImportStats,
}
