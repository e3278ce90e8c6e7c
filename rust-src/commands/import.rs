//! Import command - load a ccusage report into the store.

use anyhow::Result;
use tracing::info;

use crate::commands::report::{render_summary, render_verbose_report, StoreOverview};
use crate::config::{ImporterConfig, OutputFormat};
use crate::data::parse_report_file;
use crate::error::ImportError;
use crate::models::LoadSummary;
use crate::storage::UsageStore;


/// Run the import and print its report.
pub fn run(config: &ImporterConfig) -> Result<()> {
    let (summary, overview) = import(config)?;

    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => match overview {
            Some(overview) => print!("{}", render_verbose_report(config, &summary, &overview)),
            None => println!("{}", render_summary(config, &summary)),
        },
    }

    Ok(())
}


/// Validate the whole document, then load it.
///
/// The store is not opened until validation has passed, so a bad document
/// leaves it untouched. Also returns the store overview when the verbose
/// text report needs it.
pub fn import(config: &ImporterConfig) -> Result<(LoadSummary, Option<StoreOverview>), ImportError> {
    info!(path = %config.json_path.display(), "loading report");
    let report = parse_report_file(&config.json_path)?;
    info!(
        daily = report.entries.len(),
        models = report.model_count(),
        "validation passed"
    );

    let mut store = UsageStore::open(&config.db_path, config.lock_timeout)?;
    info!(path = %store.path().display(), mode = config.mode.as_str(), "writing to store");
    let summary = store.load(&report, config.mode)?;

    let overview = if config.verbose && config.format == OutputFormat::Text {
        Some(StoreOverview::read(&store, config.recent_days)?)
    } else {
        None
    };

    Ok((summary, overview))
}
