//! ccusage importer - Rust implementation
//!
//! Loads ccusage daily reports into a SQLite store for dashboards.

mod aggregation;
mod cli;
mod commands;
mod config;
mod data;
mod error;
mod logging;
mod models;
mod storage;


fn main() {
    if let Err(e) = cli::run() {
        match e.chain().find_map(|cause| cause.downcast_ref::<error::ImportError>()) {
            Some(import_error) => {
                eprintln!("Error [{}]: {e}", import_error.kind());
                std::process::exit(import_error.exit_code());
            }
            None => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
