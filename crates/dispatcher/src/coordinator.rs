use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use relay_core::{config::DispatcherConfig, RelayError, RelayResult};
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info, instrument};

use crate::cancellation::CancellationDrainer;
use crate::processor::{ProcessOutcome, RelayProcessor};
use crate::selector::ReadyWorkSelector;

/// Result of one drain-select-process round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub cancelled: usize,
    pub selected: Vec<i64>,
    pub outcomes: Vec<ProcessOutcome>,
    pub next_cursor: i64,
}

/// The background dispatch loop.
///
/// Each iteration drains cancellations, selects a fair batch and processes it
/// with bounded concurrency, waiting for every member before the next round.
pub struct DispatchCoordinator {
    selector: ReadyWorkSelector,
    drainer: CancellationDrainer,
    processor: Arc<RelayProcessor>,
    max_concurrency: usize,
    idle_interval: Duration,
}

impl DispatchCoordinator {
    pub fn new(
        selector: ReadyWorkSelector,
        drainer: CancellationDrainer,
        processor: Arc<RelayProcessor>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            selector,
            drainer,
            processor,
            max_concurrency: config.max_concurrency.max(1),
            idle_interval: config.idle_interval(),
        }
    }

    /// Runs one iteration starting from `cursor`.
    ///
    /// Errors only when the cancellation drain or the ready-work selection
    /// fails; both are fatal to the loop.
    #[instrument(skip(self))]
    pub async fn run_iteration(&self, cursor: i64) -> RelayResult<IterationReport> {
        let cancelled = self.drainer.drain().await?;

        let selected = self.selector.select(cursor, Utc::now()).await?;
        let next_cursor = ReadyWorkSelector::next_cursor(&selected);
        if selected.is_empty() {
            return Ok(IterationReport {
                cancelled,
                next_cursor,
                ..Default::default()
            });
        }

        let outcomes = self.process_batch(&selected).await?;

        Ok(IterationReport {
            cancelled,
            selected,
            outcomes,
            next_cursor,
        })
    }

    async fn process_batch(&self, ids: &[i64]) -> RelayResult<Vec<ProcessOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(ids.len());

        for &relay_id in ids {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RelayError::Internal(format!("dispatch semaphore closed: {e}")))?;
            let processor = Arc::clone(&self.processor);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                processor.process(relay_id).await
            }));
        }

        // 等待本批次全部完成
        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, relay_id)| {
                joined.unwrap_or_else(|e| {
                    error!(relay_id, "relay processing task panicked: {}", e);
                    ProcessOutcome::PersistenceFault
                })
            })
            .collect();

        Ok(outcomes)
    }

    /// Loops until `shutdown` fires or an iteration fails.
    ///
    /// Shutdown is observed between iterations, after the batch barrier, so
    /// no relay is abandoned mid-flight.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> RelayResult<()> {
        info!(
            max_concurrency = self.max_concurrency,
            batch_limit = self.selector.batch_limit(),
            "Dispatch coordinator started"
        );

        let mut cursor = 0;
        let mut last_selected = 0;

        loop {
            if shutdown_requested(&mut shutdown) {
                break;
            }

            let report = match self.run_iteration(cursor).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Dispatch loop stopped: {}", e);
                    return Err(e);
                }
            };

            // Idle polls stay quiet after the first empty one
            if last_selected != 0 || !report.selected.is_empty() {
                info!(cursor, "Loaded {} ready relays", report.selected.len());
            }
            last_selected = report.selected.len();
            cursor = report.next_cursor;

            if report.selected.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_interval) => {}
                    _ = shutdown.recv() => break,
                }
            }
        }

        info!("Dispatch coordinator stopped");
        Ok(())
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    match shutdown.try_recv() {
        Ok(()) | Err(broadcast::error::TryRecvError::Closed) => true,
        Err(broadcast::error::TryRecvError::Lagged(_)) => true,
        Err(broadcast::error::TryRecvError::Empty) => false,
    }
}
