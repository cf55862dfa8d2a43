//! Per-account nonce state and the daily-count accounting rule

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted nonce state for a single account
///
/// Field names follow the JSON layout `{"lastSeenNonce": .., "dailyCounts": {..}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNonceState {
    /// Latest on-chain transaction count observed; `None` before the first observation
    #[serde(default)]
    pub last_seen_nonce: Option<u64>,

    /// Day key (`YYYY-MM-DD`) -> number of nonce increments attributed to that day
    #[serde(default)]
    pub daily_counts: BTreeMap<String, u64>,
}

impl AccountNonceState {
    /// Record an observed nonce for `today`, returning the counted delta.
    ///
    /// The first observation only establishes a baseline. Observations at or
    /// below the last seen nonce count as zero but still move the baseline.
    pub fn observe(&mut self, current_nonce: u64, today: &str) -> u64 {
        let delta = match self.last_seen_nonce {
            Some(last) => current_nonce.saturating_sub(last),
            None => 0,
        };

        let bucket = self.daily_counts.entry(today.to_string()).or_insert(0);
        *bucket = bucket.saturating_add(delta);
        self.last_seen_nonce = Some(current_nonce);

        delta
    }

    /// Count attributed to a given day, zero when the bucket doesn't exist
    pub fn count_for(&self, day: &str) -> u64 {
        self.daily_counts.get(day).copied().unwrap_or(0)
    }

    /// The most recent `days` buckets in chronological order
    pub fn recent(&self, days: usize) -> Vec<(String, u64)> {
        let mut out: Vec<(String, u64)> = self
            .daily_counts
            .iter()
            .rev()
            .take(days)
            .map(|(day, count)| (day.clone(), *count))
            .collect();
        out.reverse();
        out
    }
}
