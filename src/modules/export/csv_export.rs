//! CSV Export
//!
//! Writes per-day transaction counts to CSV files.

use crate::domain::nonce::AccountNonceState;
use std::path::Path;

/// Write daily counts to CSV file, oldest day first
pub fn write_daily_counts(
    path: &Path,
    state: &AccountNonceState,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["day", "count"])?;
    for (day, count) in &state.daily_counts {
        wtr.write_record([day.clone(), count.to_string()])?;
    }

    wtr.flush()?;
    Ok(state.daily_counts.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_daily_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.csv");
        let mut state = AccountNonceState::default();
        state.observe(1, "2024-03-01");
        state.observe(4, "2024-03-02");

        assert_eq!(write_daily_counts(&path, &state).unwrap(), 2);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "day,count\n2024-03-01,0\n2024-03-02,3\n");
    }
}
