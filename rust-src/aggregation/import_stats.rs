//! Statistics derived from an imported report.

use crate::error::ImportError;
use crate::models::{DailyEntry, ImportStats};


/// Compute totals and cache efficiency over every entry of a report.
///
/// Fails when a running total no longer fits the store's integer columns,
/// naming the entry at which it overflowed.
pub fn calculate_import_stats(entries: &[DailyEntry]) -> Result<ImportStats, ImportError> {
    let mut stats = ImportStats::default();

    for (idx, entry) in entries.iter().enumerate() {
        let day = &entry.day;
        let location = format!("daily[{idx}]");

        stats.total_tokens = add_total(stats.total_tokens, day.total_tokens, &location, "totalTokens")?;
        stats.cache_creation_tokens = add_total(
            stats.cache_creation_tokens,
            day.tokens.cache_creation_tokens,
            &location,
            "cacheCreationTokens",
        )?;
        stats.cache_read_tokens = add_total(
            stats.cache_read_tokens,
            day.tokens.cache_read_tokens,
            &location,
            "cacheReadTokens",
        )?;

        stats.total_cost += day.total_cost;
        if !stats.total_cost.is_finite() {
            return Err(ImportError::Range {
                location,
                field: "totalCost".to_string(),
                value: day.total_cost.to_string(),
                reason: "sum across entries is not a finite number".to_string(),
            });
        }
    }

    stats.cache_hit_rate = cache_hit_rate(stats.cache_read_tokens, stats.cache_creation_tokens);
    Ok(stats)
}


fn add_total(total: i64, value: i64, location: &str, field: &str) -> Result<i64, ImportError> {
    total.checked_add(value).ok_or_else(|| ImportError::Range {
        location: location.to_string(),
        field: field.to_string(),
        value: value.to_string(),
        reason: "sum across entries exceeds a 64-bit integer".to_string(),
    })
}


/// Cache reads as a percentage of all cache traffic, 0 when there is none.
pub fn cache_hit_rate(cache_read_tokens: i64, cache_creation_tokens: i64) -> f64 {
    // f64 so the denominator cannot overflow
    let read = cache_read_tokens.max(0) as f64;
    let denominator = read + cache_creation_tokens.max(0) as f64;
    if denominator <= 0.0 {
        return 0.0;
    }
    read / denominator * 100.0
}
