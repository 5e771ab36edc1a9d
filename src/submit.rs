//! Batch submission: upload every image, then persist the whole batch in one
//! bulk insert under a fresh batch id.
//!
//! `Idle → Uploading → Persisting → Committed | Failed`. Uploads run
//! concurrently and are joined all-or-nothing; nothing is written unless
//! every upload succeeded. No stage retries on its own.
use futures::future::try_join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::draft::{DraftBatch, ValidDraft, ValidationError};
use crate::media::{MediaUploader, UploadError};
use crate::model::{BatchId, Listing, ListingStatus, NewListing};
use crate::session::PortalSession;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Uploading { batch_id: BatchId },
    Persisting { batch_id: BatchId },
    Committed { batch_id: BatchId, records: usize },
    Failed { batch_id: BatchId, reason: String },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a submission is already in flight")]
    Busy,
    #[error("image upload failed: {0}")]
    Upload(#[from] UploadError),
    #[error("failed to persist batch: {0}")]
    Persistence(#[from] StoreError),
    #[error("record store kept {stored} of {expected} listings for batch {batch_id}")]
    PartialCommit {
        batch_id: BatchId,
        expected: usize,
        stored: usize,
    },
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },
    #[error("submission cancelled")]
    Cancelled,
}

/// Result of a committed submission.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub batch_id: BatchId,
    pub listings: Vec<Listing>,
}

/// Releases the in-flight flag when the submission ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SubmitError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(flag))
            .map_err(|_| SubmitError::Busy)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BatchSubmitter {
    store: Arc<dyn RecordStore>,
    media: Arc<dyn MediaUploader>,
    stage_timeout: Duration,
    in_flight: AtomicBool,
    last_batch_millis: AtomicI64,
    state: watch::Sender<SubmitState>,
}

impl BatchSubmitter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        media: Arc<dyn MediaUploader>,
        stage_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SubmitState::Idle);
        Self {
            store,
            media,
            stage_timeout,
            in_flight: AtomicBool::new(false),
            last_batch_millis: AtomicI64::new(0),
            state,
        }
    }

    pub fn state(&self) -> SubmitState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmitState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Time-based id, strictly increasing per submitter so an id is never
    /// handed out twice.
    fn next_batch_id(&self) -> BatchId {
        let now = chrono::Utc::now().timestamp_millis();
        let prev = self
            .last_batch_millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        BatchId::from_millis(now.max(prev + 1))
    }

    async fn bounded<T, E, F>(
        &self,
        stage: &'static str,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T, SubmitError>
    where
        F: Future<Output = Result<T, E>>,
        SubmitError: From<E>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(SubmitError::Cancelled),
            res = tokio::time::timeout(self.stage_timeout, fut) => match res {
                Ok(inner) => inner.map_err(SubmitError::from),
                Err(_) => Err(SubmitError::Timeout { stage, after: self.stage_timeout }),
            },
        }
    }

    /// Validate, upload and persist `batch` on behalf of `owner`.
    ///
    /// On success the batch is reset to a single empty draft that keeps the
    /// first draft's styles and price modifier. On failure the batch is left
    /// untouched so the seller can retry; a retry gets a new batch id.
    #[instrument(skip_all, fields(user_id = %owner.user_id, drafts = batch.len()))]
    pub async fn submit(
        &self,
        batch: &mut DraftBatch,
        owner: &PortalSession,
        cancel: &CancellationToken,
    ) -> Result<Submitted, SubmitError> {
        let drafts = batch.validate()?;
        let _guard = InFlight::acquire(&self.in_flight)?;

        let batch_id = self.next_batch_id();
        match self.run(&batch_id, &drafts, owner, cancel).await {
            Ok(listings) => {
                batch.reset_after_commit();
                self.state.send_replace(SubmitState::Committed {
                    batch_id: batch_id.clone(),
                    records: listings.len(),
                });
                info!(batch_id = %batch_id, records = listings.len(), "batch committed");
                Ok(Submitted { batch_id, listings })
            }
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "batch submission failed");
                self.state.send_replace(SubmitState::Failed {
                    batch_id,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        batch_id: &BatchId,
        drafts: &[ValidDraft],
        owner: &PortalSession,
        cancel: &CancellationToken,
    ) -> Result<Vec<Listing>, SubmitError> {
        self.state.send_replace(SubmitState::Uploading {
            batch_id: batch_id.clone(),
        });
        let uploads = drafts
            .iter()
            .flat_map(|d| d.images.iter())
            .map(|path| self.media.upload(path));
        let urls = self.bounded("upload", cancel, try_join_all(uploads)).await?;
        info!(batch_id = %batch_id, images = urls.len(), "images uploaded");

        let counts: Vec<usize> = drafts.iter().map(|d| d.images.len()).collect();
        let rows: Vec<NewListing> = drafts
            .iter()
            .zip(assign_urls(&counts, urls))
            .map(|(draft, images)| NewListing {
                title: draft.title.clone(),
                description: draft.description.clone(),
                price: draft.price,
                images,
                status: ListingStatus::Pending,
                title_style: draft.title_style.map(|s| s.as_str()).unwrap_or_default().to_string(),
                desc_style: draft
                    .description_style
                    .map(|s| s.as_str())
                    .unwrap_or_default()
                    .to_string(),
                price_mod: draft.price_modifier,
                original_id: batch_id.clone(),
                user_id: owner.user_id.clone(),
                branch: owner.branch.clone(),
            })
            .collect();

        self.state.send_replace(SubmitState::Persisting {
            batch_id: batch_id.clone(),
        });
        let stored = self
            .bounded("persist", cancel, self.store.insert_listings(&rows))
            .await?;
        if stored.len() != rows.len() {
            return Err(SubmitError::PartialCommit {
                batch_id: batch_id.clone(),
                expected: rows.len(),
                stored: stored.len(),
            });
        }
        Ok(stored)
    }
}

/// Split the flat, submission-ordered URL list back into per-draft lists:
/// draft 0 takes the first `counts[0]` URLs, draft 1 the next `counts[1]`,
/// and so on.
pub fn assign_urls(counts: &[usize], urls: Vec<String>) -> Vec<Vec<String>> {
    let mut urls = urls.into_iter();
    counts
        .iter()
        .map(|&k| urls.by_ref().take(k).collect())
        .collect()
}
