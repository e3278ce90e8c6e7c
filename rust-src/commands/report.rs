//! Text rendering of an import run.

use crate::aggregation::cache_hit_rate;
use crate::config::ImporterConfig;
use crate::error::ImportError;
use crate::models::{DailyUsageRecord, LoadSummary, WriteCounts};
use crate::storage::{ModelSummary, UsageStore};


/// Store contents shown in the verbose report.
#[derive(Debug, Clone)]
pub struct StoreOverview {
    pub recent: Vec<DailyUsageRecord>,
    pub models: Vec<ModelSummary>,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
}


impl StoreOverview {
    /// Read the overview from a freshly loaded store.
    pub fn read(store: &UsageStore, recent_days: usize) -> Result<Self, ImportError> {
        let (cache_creation_tokens, cache_read_tokens) = store.cache_totals()?;
        Ok(Self {
            recent: store.recent_days(recent_days)?,
            models: store.model_summary()?,
            cache_creation_tokens,
            cache_read_tokens,
        })
    }
}


/// One-line result for non-verbose runs.
pub fn render_summary(config: &ImporterConfig, summary: &LoadSummary) -> String {
    format!(
        "Imported {} daily and {} model records into {} ({} mode)",
        summary.daily.written(),
        summary.models.written(),
        config.db_path.display(),
        summary.mode
    )
}


/// Full report with totals, cache efficiency, recent days and models.
pub fn render_verbose_report(
    config: &ImporterConfig,
    summary: &LoadSummary,
    overview: &StoreOverview,
) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line("=".repeat(60));
    line(format!("{:^60}", "Usage Import Summary"));
    line("=".repeat(60));
    line(String::new());

    line("RECORDS".to_string());
    line("-".repeat(40));
    line(format!("  Daily usage:         {}", describe_counts(&summary.daily)));
    line(format!("  Model usage:         {}", describe_counts(&summary.models)));

    let stats = &summary.stats;
    line(String::new());
    line("IMPORTED".to_string());
    line("-".repeat(40));
    line(format!("  Total Tokens:        {:>15}", format_number(stats.total_tokens)));
    line(format!("  Total Cost:          ${:>14}", format_currency(stats.total_cost)));
    line(format!("  Cache Created:       {:>15}", format_number(stats.cache_creation_tokens)));
    line(format!("  Cache Read:          {:>15}", format_number(stats.cache_read_tokens)));
    line(format!("  Cache Hit Rate:      {:>14.1}%", stats.cache_hit_rate));

    line(String::new());
    line("STORE CACHE EFFICIENCY".to_string());
    line("-".repeat(40));
    line(format!(
        "  Cache Hit Rate:      {:>14.1}%",
        cache_hit_rate(overview.cache_read_tokens, overview.cache_creation_tokens)
    ));

    if !overview.recent.is_empty() {
        line(String::new());
        line(format!("RECENT DAYS (last {})", config.recent_days));
        line("-".repeat(40));
        for day in &overview.recent {
            line(format!(
                "  {}: {} tokens, ${}",
                day.date,
                format_number(day.total_tokens),
                format_currency(day.total_cost)
            ));
            if !day.models_used.is_empty() {
                line(format!("    Models: {}", day.models_used.join(", ")));
            }
        }
    }

    if !overview.models.is_empty() {
        line(String::new());
        line("USAGE BY MODEL".to_string());
        line("-".repeat(60));
        for model in &overview.models {
            line(format!(
                "  {:30} {:>4} day{} {:>12} ${:>10}",
                model.model_name,
                model.days,
                if model.days == 1 { " " } else { "s" },
                format_number(model.tokens),
                format_currency(model.cost)
            ));
        }
    }

    line(String::new());
    line(format!("Database: {}", config.db_path.display()));

    out
}


fn describe_counts(counts: &WriteCounts) -> String {
    format!(
        "{} total ({} inserted, {} updated)",
        format_number(counts.total),
        counts.inserted,
        counts.updated
    )
}


/// Format a number with commas.
fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if n < 0 {
        result.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}


/// Format currency with 2 decimal places and commas.
fn format_currency(n: f64) -> String {
    let formatted = format!("{:.2}", n);
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let integer = integer_part.parse::<i64>().map(format_number).unwrap_or_else(|_| integer_part.to_string());
    format!("{integer}.{decimal_part}")
}
