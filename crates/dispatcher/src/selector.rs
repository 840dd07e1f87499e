use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::{traits::RelayRepository, RelayResult};

/// Picks the next batch of dispatchable relays, at most one per device.
pub struct ReadyWorkSelector {
    relay_repo: Arc<dyn RelayRepository>,
    batch_limit: u32,
}

impl ReadyWorkSelector {
    pub fn new(relay_repo: Arc<dyn RelayRepository>, batch_limit: u32) -> Self {
        Self {
            relay_repo,
            batch_limit,
        }
    }

    pub fn batch_limit(&self) -> u32 {
        self.batch_limit
    }

    /// Ascending relay ids at or above `cursor` that are ready at `now`.
    ///
    /// Ids below the cursor are never considered; the caller resets the
    /// cursor after an empty poll.
    pub async fn select(&self, cursor: i64, now: DateTime<Utc>) -> RelayResult<Vec<i64>> {
        self.relay_repo
            .select_ready_ids(cursor, now, self.batch_limit)
            .await
    }

    /// Lower bound for the poll that follows one which returned `ids`.
    pub fn next_cursor(ids: &[i64]) -> i64 {
        ids.iter().copied().max().unwrap_or(0)
    }
}
