//! Export Module
//!
//! Writes the connected account's daily counts to disk.
//!
//! - 'e' key → CSV (`day,count`)
//! - 'E' key → JSON snapshot of the full state
//! - Files saved to the data dir's `exports/`

mod csv_export;
mod json_export;

use crate::config::{self, short_addr};
use crate::core::{Action, NotifyLevel};
use crate::store::PersistentStateStore;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Get the export directory path, creating it if needed
fn get_export_dir() -> std::io::Result<PathBuf> {
    let export_dir = config::export_dir().unwrap_or_else(|| PathBuf::from(".tally").join("exports"));
    fs::create_dir_all(&export_dir)?;
    Ok(export_dir)
}

/// Generate a timestamped filename
fn generate_filename(prefix: &str, extension: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d-%H%M%S");
    format!("{}-{}.{}", prefix, timestamp, extension)
}

/// Export the daily counts of `address` to the default export directory
pub fn export_account(
    store: &PersistentStateStore,
    address: Option<&str>,
    format: ExportFormat,
) -> Action {
    let Some(address) = address else {
        return Action::Notify("Connect first.".to_string(), NotifyLevel::Warn);
    };

    let export_dir = match get_export_dir() {
        Ok(dir) => dir,
        Err(e) => {
            return Action::Notify(
                format!("Failed to create export directory: {}", e),
                NotifyLevel::Error,
            )
        }
    };

    export_account_to(store, address, format, &export_dir)
}

/// Export into an explicit directory
pub fn export_account_to(
    store: &PersistentStateStore,
    address: &str,
    format: ExportFormat,
    dir: &Path,
) -> Action {
    let state = store.read(address);
    if state.daily_counts.is_empty() {
        return Action::Notify("No daily counts to export".to_string(), NotifyLevel::Warn);
    }

    let prefix = format!("daily-{}", short_addr(address).replace("..", "-"));
    let filename = generate_filename(&prefix, format.extension());
    let path = dir.join(&filename);

    let result = match format {
        ExportFormat::Csv => csv_export::write_daily_counts(&path, &state),
        ExportFormat::Json => json_export::write_state(&path, address, &state),
    };

    match result {
        Ok(count) => {
            tracing::info!(path = %path.display(), days = count, "exported daily counts");
            Action::Notify(
                format!("Exported {} days to {}", count, path.display()),
                NotifyLevel::Info,
            )
        }
        Err(e) => Action::Notify(format!("Export failed: {}", e), NotifyLevel::Error),
    }
}
