//! Storage layer for imported usage data.

mod database;

pub use database::{ModelSummary, UsageStore};
