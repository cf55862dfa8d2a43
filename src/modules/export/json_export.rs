//! JSON Export
//!
//! Writes an account's full nonce state to a JSON file.

use crate::domain::nonce::AccountNonceState;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportableState<'a> {
    address: &'a str,
    exported_at: String,
    #[serde(flatten)]
    state: &'a AccountNonceState,
}

/// Write the state snapshot, returning the number of day buckets
pub fn write_state(
    path: &Path,
    address: &str,
    state: &AccountNonceState,
) -> Result<usize, Box<dyn std::error::Error>> {
    let export = ExportableState {
        address,
        exported_at: chrono::Local::now().to_rfc3339(),
        state,
    };

    let json = serde_json::to_string_pretty(&export)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;

    Ok(state.daily_counts.len())
}
