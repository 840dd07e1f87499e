use std::sync::Arc;

use relay_core::{
    models::RelayStatus,
    traits::{CancellationRepository, RelayRepository},
    RelayResult,
};
use tracing::{debug, info, instrument};

/// Turns queued cancellation requests into the `Cancelled` state.
pub struct CancellationDrainer {
    cancellation_repo: Arc<dyn CancellationRepository>,
    relay_repo: Arc<dyn RelayRepository>,
    page_size: u32,
}

impl CancellationDrainer {
    pub fn new(
        cancellation_repo: Arc<dyn CancellationRepository>,
        relay_repo: Arc<dyn RelayRepository>,
        page_size: u32,
    ) -> Self {
        Self {
            cancellation_repo,
            relay_repo,
            page_size,
        }
    }

    /// Consumes every pending cancellation and returns how many were applied.
    ///
    /// The relay status is overwritten unconditionally, so a relay that
    /// finished after its cancellation was queued still ends up `Cancelled`.
    /// Any store error aborts the drain; entries not yet deleted are retried
    /// on the next call.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> RelayResult<usize> {
        let mut applied = 0;

        loop {
            let page = self.cancellation_repo.list(self.page_size).await?;
            if page.is_empty() {
                break;
            }

            for cancellation in page {
                self.relay_repo
                    .update_status(cancellation.relay_id, RelayStatus::Cancelled)
                    .await?;
                self.cancellation_repo.delete(cancellation.id).await?;
                debug!(relay_id = cancellation.relay_id, "relay cancelled");
                applied += 1;
            }
        }

        if applied > 0 {
            info!("Applied {} cancellations", applied);
        }
        Ok(applied)
    }
}
