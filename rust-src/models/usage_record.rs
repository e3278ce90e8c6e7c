//! Usage records as they are persisted in the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ImportStats;


/// Token counts shared by daily aggregates and per-model breakdowns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
}


/// Aggregate usage for a single calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyUsageRecord {
    /// Calendar day as `YYYY-MM-DD`.
    pub date: String,
    pub tokens: TokenCounts,
    pub total_tokens: i64,
    pub total_cost: f64,
    /// Models active that day, first-seen order, no duplicates.
    pub models_used: Vec<String>,
}


impl DailyUsageRecord {
    /// Models as the JSON array stored in `daily_usage.models_used`.
    pub fn models_column(&self) -> String {
        Value::from(self.models_used.clone()).to_string()
    }

    /// Read a stored `models_used` column back into model names.
    ///
    /// Columns that are not a JSON array are treated as comma-joined names.
    pub fn parse_models_column(column: &str) -> Vec<String> {
        if let Ok(models) = serde_json::from_str::<Vec<String>>(column) {
            return models;
        }

        column
            .split(',')
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    }
}


/// Usage of a single model on a single day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelUsageRecord {
    pub date: String,
    pub model_name: String,
    pub tokens: TokenCounts,
    pub cost: f64,
}


/// A day of usage together with its per-model breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEntry {
    pub day: DailyUsageRecord,
    pub models: Vec<ModelUsageRecord>,
}


/// A validated usage-report document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageReport {
    pub entries: Vec<DailyEntry>,
    /// Totals over `entries`, computed during validation.
    pub stats: ImportStats,
}


impl UsageReport {
    /// Number of model breakdown rows across all days.
    pub fn model_count(&self) -> usize {
        self.entries.iter().map(|e| e.models.len()).sum()
    }
}
