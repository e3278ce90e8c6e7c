//! Parser and validator for ccusage daily report documents.

use std::path::Path;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::aggregation::calculate_import_stats;
use crate::error::ImportError;
use crate::models::{DailyEntry, DailyUsageRecord, ModelUsageRecord, TokenCounts, UsageReport};


/// Read and validate a report file.
///
/// Nothing is returned unless every entry validates.
pub fn parse_report_file(file_path: &Path) -> Result<UsageReport, ImportError> {
    let bytes = std::fs::read(file_path).map_err(|source| ImportError::Input {
        path: file_path.to_path_buf(),
        source,
    })?;

    parse_report_bytes(&bytes)
}


/// Parse and validate a report held in memory.
///
/// Invalid UTF-8 is a parse failure like any other malformed JSON.
pub fn parse_report_bytes(bytes: &[u8]) -> Result<UsageReport, ImportError> {
    let document: Value = serde_json::from_slice(bytes)?;
    validate_report(&document)
}


#[cfg(test)]
pub fn parse_report_str(text: &str) -> Result<UsageReport, ImportError> {
    parse_report_bytes(text.as_bytes())
}


/// Validate a parsed document and convert it into typed records.
pub fn validate_report(document: &Value) -> Result<UsageReport, ImportError> {
    let root = document
        .as_object()
        .ok_or_else(|| schema_error("document", "document must be a JSON object"))?;

    let daily = match root.get("daily") {
        Some(Value::Array(daily)) => daily,
        Some(_) => return Err(schema_error("document", "`daily` must be an array")),
        None => return Err(schema_error("document", "missing required field `daily`")),
    };

    let entries = daily
        .iter()
        .enumerate()
        .map(|(idx, entry)| parse_entry(idx, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let stats = calculate_import_stats(&entries)?;
    Ok(UsageReport { entries, stats })
}


/// Validate a single `daily[idx]` entry.
fn parse_entry(idx: usize, value: &Value) -> Result<DailyEntry, ImportError> {
    let location = format!("daily[{idx}]");
    let entry = value
        .as_object()
        .ok_or_else(|| schema_error(&location, "daily entry must be an object"))?;

    // Required fields first, so a missing one is reported before a bad value elsewhere
    for field in ["date", "totalTokens", "totalCost"] {
        if !entry.contains_key(field) {
            return Err(schema_error(
                &location,
                &format!("missing required field `{field}`"),
            ));
        }
    }

    let date = parse_date(entry, &location)?;
    let total_tokens = required_count(entry, "totalTokens", &location)?;
    let total_cost = required_cost(entry, "totalCost", &location)?;
    let tokens = token_counts(entry, &location)?;
    let models_used = models_used(entry, &location)?;

    let models = match entry.get("modelBreakdowns") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(breakdowns)) => breakdowns
            .iter()
            .enumerate()
            .map(|(model_idx, breakdown)| {
                parse_breakdown(&date, &format!("{location}.modelBreakdowns[{model_idx}]"), breakdown)
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(schema_error(&location, "`modelBreakdowns` must be an array"));
        }
    };

    Ok(DailyEntry {
        day: DailyUsageRecord {
            date,
            tokens,
            total_tokens,
            total_cost,
            models_used,
        },
        models,
    })
}


/// Validate one per-model breakdown of a day.
fn parse_breakdown(date: &str, location: &str, value: &Value) -> Result<ModelUsageRecord, ImportError> {
    let breakdown = value
        .as_object()
        .ok_or_else(|| schema_error(location, "model breakdown must be an object"))?;

    for field in ["modelName", "cost"] {
        if !breakdown.contains_key(field) {
            return Err(schema_error(
                location,
                &format!("missing required field `{field}`"),
            ));
        }
    }

    let model_name = match &breakdown["modelName"] {
        Value::String(name) if !name.is_empty() => name.clone(),
        Value::String(_) => return Err(schema_error(location, "`modelName` must not be empty")),
        _ => return Err(schema_error(location, "`modelName` must be a string")),
    };

    Ok(ModelUsageRecord {
        date: date.to_string(),
        model_name,
        tokens: token_counts(breakdown, location)?,
        cost: required_cost(breakdown, "cost", location)?,
    })
}


/// Parse the `date` field as a real `YYYY-MM-DD` calendar day.
fn parse_date(entry: &Map<String, Value>, location: &str) -> Result<String, ImportError> {
    let raw = match &entry["date"] {
        Value::String(s) => s.as_str(),
        other => {
            return Err(ImportError::DateFormat {
                location: location.to_string(),
                value: other.to_string(),
            })
        }
    };

    // chrono accepts unpadded fields, the store keys on the exact text
    let well_formed = raw.len() == 10
        && NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| d.format("%Y-%m-%d").to_string() == raw)
            .unwrap_or(false);

    if !well_formed {
        return Err(ImportError::DateFormat {
            location: location.to_string(),
            value: raw.to_string(),
        });
    }

    Ok(raw.to_string())
}


/// Optional token counts, defaulting to zero.
fn token_counts(fields: &Map<String, Value>, location: &str) -> Result<TokenCounts, ImportError> {
    Ok(TokenCounts {
        input_tokens: optional_count(fields, "inputTokens", location)?,
        output_tokens: optional_count(fields, "outputTokens", location)?,
        cache_creation_tokens: optional_count(fields, "cacheCreationTokens", location)?,
        cache_read_tokens: optional_count(fields, "cacheReadTokens", location)?,
    })
}


fn optional_count(fields: &Map<String, Value>, field: &str, location: &str) -> Result<i64, ImportError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => count_value(value, field, location),
    }
}


fn required_count(fields: &Map<String, Value>, field: &str, location: &str) -> Result<i64, ImportError> {
    count_value(&fields[field], field, location)
}


/// A token count must be a non-negative integer.
fn count_value(value: &Value, field: &str, location: &str) -> Result<i64, ImportError> {
    let Value::Number(number) = value else {
        return Err(type_error(location, field, "a non-negative integer"));
    };

    if let Some(n) = number.as_i64() {
        if n < 0 {
            return Err(range_error(location, field, number.to_string()));
        }
        return Ok(n);
    }

    match number.as_f64() {
        Some(f) if f < 0.0 => Err(range_error(location, field, number.to_string())),
        // Fractional or beyond i64
        _ => Err(type_error(location, field, "a non-negative integer")),
    }
}


/// A cost must be a non-negative number.
fn required_cost(fields: &Map<String, Value>, field: &str, location: &str) -> Result<f64, ImportError> {
    let cost = fields[field]
        .as_f64()
        .ok_or_else(|| type_error(location, field, "a number"))?;

    if cost < 0.0 {
        return Err(range_error(location, field, fields[field].to_string()));
    }

    Ok(cost)
}


/// `modelsUsed` as a de-duplicated list in first-seen order.
fn models_used(entry: &Map<String, Value>, location: &str) -> Result<Vec<String>, ImportError> {
    let items = match entry.get("modelsUsed") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(type_error(location, "modelsUsed", "an array of strings")),
    };

    let mut models: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let model = item
            .as_str()
            .ok_or_else(|| type_error(location, "modelsUsed", "an array of strings"))?;
        if !models.iter().any(|m| m == model) {
            models.push(model.to_string());
        }
    }

    Ok(models)
}


fn schema_error(location: &str, message: &str) -> ImportError {
    ImportError::SchemaValidation {
        location: location.to_string(),
        message: message.to_string(),
    }
}


fn type_error(location: &str, field: &str, expected: &str) -> ImportError {
    schema_error(location, &format!("`{field}` must be {expected}"))
}


fn range_error(location: &str, field: &str, value: String) -> ImportError {
    ImportError::Range {
        location: location.to_string(),
        field: field.to_string(),
        value,
        reason: "must not be negative".to_string(),
    }
}
