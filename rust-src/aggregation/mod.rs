//! Aggregation layer for import statistics.

mod import_stats;

pub use import_stats::{cache_hit_rate, calculate_import_stats};
