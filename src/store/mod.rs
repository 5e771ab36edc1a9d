//! Record store access: the `listings`, `admin_users` and `branch_managers`
//! tables, either on the hosted backend (`rest`) or in the local SQLite
//! database (`sqlite`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, StoreBackend};
use crate::db::Pool;
use crate::model::{AdminUser, BatchId, BranchManager, Listing, NewListing};

pub mod rest;
pub mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("record store rejected request {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid record payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unknown listing status '{0}'")]
    UnknownStatus(String),
    #[error("invalid store URL: {0}")]
    Url(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all rows in one request and return the stored records.
    async fn insert_listings(&self, rows: &[NewListing]) -> Result<Vec<Listing>, StoreError>;

    /// Records of one batch for one owner, newest first.
    async fn listings_for_batch(
        &self,
        batch_id: &BatchId,
        user_id: &str,
    ) -> Result<Vec<Listing>, StoreError>;

    /// Records of a branch, newest first, optionally limited to `since`.
    async fn listings_for_branch(
        &self,
        branch: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError>;

    async fn find_admin_user(
        &self,
        user_id: &str,
        temp_key: &str,
    ) -> Result<Option<AdminUser>, StoreError>;

    async fn find_branch_manager(
        &self,
        user_id: &str,
        temp_key: &str,
    ) -> Result<Option<BranchManager>, StoreError>;
}

/// Build the store selected by `store.backend`. The local pool backs the
/// `sqlite` backend.
pub fn connect(cfg: &Config, pool: &Pool) -> Result<Arc<dyn RecordStore>> {
    match cfg.store.backend {
        StoreBackend::Rest => {
            let base_url = Url::parse(cfg.store.url.trim()).context("invalid store.url")?;
            let store = RestStore::new(base_url, cfg.store.api_key.clone(), cfg.request_timeout())?;
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::new(pool.clone()))),
    }
}
