use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

use listaro_portal::model::{AdminUser, BatchId, BranchManager, Listing, ListingStatus, NewListing};
use listaro_portal::pager::Pager;
use listaro_portal::poller::ConvergencePoller;
use listaro_portal::store::{RecordStore, StoreError};

const TICK: Duration = Duration::from_millis(10);

fn listing(i: usize, status: ListingStatus) -> Listing {
    Listing {
        id: format!("row-{}", i),
        title: format!("Item {}", i),
        description: "desc".into(),
        price: 10.0,
        images: vec![],
        status,
        original_id: Some("1700000000000".into()),
        user_id: Some("seller-1".into()),
        branch: None,
        created_at: None,
        price_mod: None,
        title_style: None,
        desc_style: None,
        prompt_title: None,
        prompt_desc: None,
    }
}

/// Batch reads fail for the first `failures` calls, then return `rows`.
struct ScriptedStore {
    fetches: AtomicUsize,
    failures: usize,
    rows: Vec<Listing>,
}

impl ScriptedStore {
    fn new(failures: usize, rows: Vec<Listing>) -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            failures,
            rows,
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn insert_listings(&self, _rows: &[NewListing]) -> Result<Vec<Listing>, StoreError> {
        Ok(Vec::new())
    }

    async fn listings_for_batch(
        &self,
        _batch_id: &BatchId,
        _user_id: &str,
    ) -> Result<Vec<Listing>, StoreError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(StoreError::Url("connection reset".into()));
        }
        Ok(self.rows.clone())
    }

    async fn listings_for_branch(
        &self,
        _branch: &str,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError> {
        Ok(Vec::new())
    }

    async fn find_admin_user(
        &self,
        _user_id: &str,
        _temp_key: &str,
    ) -> Result<Option<AdminUser>, StoreError> {
        Ok(None)
    }

    async fn find_branch_manager(
        &self,
        _user_id: &str,
        _temp_key: &str,
    ) -> Result<Option<BranchManager>, StoreError> {
        Ok(None)
    }
}

fn batch() -> BatchId {
    BatchId::from_millis(1_700_000_000_000)
}

#[tokio::test]
async fn failed_fetches_are_skipped() {
    let rows: Vec<Listing> = (0..3).map(|i| listing(i, ListingStatus::Ready)).collect();
    let store = ScriptedStore::new(2, rows.clone());
    let poller = ConvergencePoller::new(store.clone(), TICK);
    let seed = vec![listing(0, ListingStatus::Pending)];
    let mut handle = poller.start(batch(), "seller-1".into(), seed.clone());

    assert_eq!(handle.latest().listings, seed);
    let snapshot = timeout(Duration::from_secs(2), handle.changed())
        .await
        .expect("snapshot in time")
        .expect("poller running");
    assert_eq!(snapshot.fetches, 1);
    assert_eq!(snapshot.listings, rows);
    assert!(store.fetches() >= 3);
    assert!(snapshot.is_converged(3));
    assert!(!snapshot.is_converged(4));
    handle.stop().await;
}

#[tokio::test]
async fn stop_halts_fetching() {
    let store = ScriptedStore::new(0, vec![listing(0, ListingStatus::Pending)]);
    let poller = ConvergencePoller::new(store.clone(), TICK);
    let handle = poller.start(batch(), "seller-1".into(), Vec::new());

    sleep(TICK * 5).await;
    handle.stop().await;
    let after_stop = store.fetches();
    assert!(after_stop >= 1);

    sleep(TICK * 5).await;
    assert_eq!(store.fetches(), after_stop);
}

#[tokio::test]
async fn dropping_the_handle_halts_fetching() {
    let store = ScriptedStore::new(0, vec![listing(0, ListingStatus::Pending)]);
    let poller = ConvergencePoller::new(store.clone(), TICK);
    let handle = poller.start(batch(), "seller-1".into(), Vec::new());

    sleep(TICK * 3).await;
    drop(handle);
    sleep(TICK * 2).await;
    let after_drop = store.fetches();

    sleep(TICK * 5).await;
    assert_eq!(store.fetches(), after_drop);
}

#[tokio::test]
async fn replayed_snapshots_do_not_move_the_pager() {
    let rows: Vec<Listing> = (0..25).map(|i| listing(i, ListingStatus::Ready)).collect();
    let store = ScriptedStore::new(0, rows);
    let poller = ConvergencePoller::new(store, TICK);
    let mut handle = poller.start(batch(), "seller-1".into(), Vec::new());

    let mut pager = Pager::new(10);
    pager.replace(handle.latest().listings);
    assert!(pager.visible().is_empty());

    let first = handle.changed().await.expect("first snapshot");
    pager.replace(first.listings);
    assert_eq!(pager.visible().len(), 10);
    assert_eq!(pager.load_more(), 10);
    let shown: Vec<String> = pager.visible().iter().map(|l| l.id.clone()).collect();

    for _ in 0..3 {
        let next = handle.changed().await.expect("next snapshot");
        pager.replace(next.listings);
        let ids: Vec<String> = pager.visible().iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, shown);
    }
    assert_eq!(pager.load_more(), 5);
    assert!(!pager.has_more());
    handle.stop().await;
}
