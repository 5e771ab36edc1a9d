//! Convergence polling of a committed batch.
//!
//! A background task re-reads the batch on a fixed interval and publishes
//! each result wholesale; the latest fetch always wins. Failed fetches are
//! logged and skipped, the next tick retries. The task lives exactly as long
//! as its `PollHandle`.
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::model::{BatchId, Listing};
use crate::store::RecordStore;

/// One published view of the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub listings: Vec<Listing>,
    /// Successful fetches so far; 0 for the seed passed to `start`.
    pub fetches: u64,
}

impl Snapshot {
    /// At least `expected` records and none of them still pending.
    pub fn is_converged(&self, expected: usize) -> bool {
        self.listings.len() >= expected && self.listings.iter().all(|l| l.status.is_enriched())
    }
}

#[derive(Clone)]
pub struct ConvergencePoller {
    store: Arc<dyn RecordStore>,
    interval: Duration,
}

impl ConvergencePoller {
    pub fn new(store: Arc<dyn RecordStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Start polling `batch_id` for `user_id`. `initial` is published right
    /// away (typically the records returned by the insert).
    pub fn start(&self, batch_id: BatchId, user_id: String, initial: Vec<Listing>) -> PollHandle {
        let (tx, rx) = watch::channel(Snapshot {
            listings: initial,
            fetches: 0,
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.store.clone(),
            self.interval,
            batch_id,
            user_id,
            tx,
            cancel.clone(),
        ));
        PollHandle {
            results: rx,
            cancel,
            task: Some(task),
        }
    }
}

#[instrument(skip_all, fields(batch_id = %batch_id))]
async fn poll_loop(
    store: Arc<dyn RecordStore>,
    interval: Duration,
    batch_id: BatchId,
    user_id: String,
    tx: watch::Sender<Snapshot>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first fetch waits one interval.
    ticker.tick().await;
    let mut fetches = 0u64;

    info!(interval_ms = interval.as_millis() as u64, "polling started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            res = store.listings_for_batch(&batch_id, &user_id) => res,
        };
        match result {
            Ok(listings) => {
                fetches += 1;
                debug!(records = listings.len(), fetches, "poll tick");
                tx.send_replace(Snapshot { listings, fetches });
            }
            Err(err) => warn!(error = %err, "poll tick failed; retrying next interval"),
        }
    }
    info!(fetches, "polling stopped");
}

/// Owner of a running poll task. Dropping it stops the task.
pub struct PollHandle {
    results: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn latest(&self) -> Snapshot {
        self.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.results.clone()
    }

    /// Wait for the next published snapshot. `None` once polling has ended.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.results.changed().await.ok()?;
        Some(self.results.borrow_and_update().clone())
    }

    /// Wait until `expected` records are present and all are enriched.
    /// `None` if polling stops first.
    pub async fn wait_until_converged(&mut self, expected: usize) -> Option<Snapshot> {
        let snapshot = self
            .results
            .wait_for(|s| s.is_converged(expected))
            .await
            .ok()?;
        Some(snapshot.clone())
    }

    /// Cancel the task and wait for it to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "poll task ended abnormally");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
