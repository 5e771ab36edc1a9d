use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Request, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{RecordStore, StoreError};
use crate::model::{AdminUser, BatchId, BranchManager, Listing, NewListing};

const REST_PREFIX: &str = "rest/v1/";
const NEWEST_FIRST: &str = "created_at.desc";

/// Client for the hosted backend's REST interface (PostgREST dialect).
#[derive(Clone)]
pub struct RestStore {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestStore {
    pub fn new(mut base_url: Url, api_key: String, timeout: Duration) -> Result<Self, StoreError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent("listaro-portal/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, table: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("{}{}", REST_PREFIX, table))
            .map_err(|err| StoreError::Url(err.to_string()))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    pub fn build_insert_request(&self, rows: &[NewListing]) -> Result<Request, StoreError> {
        let endpoint = self.endpoint("listings")?;
        self.authorized(self.http.post(endpoint))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(rows)
            .build()
            .map_err(StoreError::from)
    }

    /// `query` pairs are PostgREST parameters, e.g. `("user_id", "eq.u1")`.
    pub fn build_select_request(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Request, StoreError> {
        let mut endpoint = self.endpoint(table)?;
        {
            let mut pairs = endpoint.query_pairs_mut();
            pairs.append_pair("select", "*");
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        self.authorized(self.http.get(endpoint))
            .header("Accept", "application/json")
            .build()
            .map_err(StoreError::from)
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, StoreError> {
        debug!(method=%request.method(), url=%request.url(), "sending record store request");
        let res = self.http.execute(request).await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body=%body, "record store rejected request");
            return Err(StoreError::Rejected { status, body });
        }
        let body = res.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RecordStore for RestStore {
    #[instrument(skip_all, fields(rows = rows.len()))]
    async fn insert_listings(&self, rows: &[NewListing]) -> Result<Vec<Listing>, StoreError> {
        let request = self.build_insert_request(rows)?;
        self.execute(request).await
    }

    #[instrument(skip_all, fields(batch_id = %batch_id))]
    async fn listings_for_batch(
        &self,
        batch_id: &BatchId,
        user_id: &str,
    ) -> Result<Vec<Listing>, StoreError> {
        let request = self.build_select_request(
            "listings",
            &[
                ("original_id", eq(batch_id.as_str())),
                ("user_id", eq(user_id)),
                ("order", NEWEST_FIRST.to_string()),
            ],
        )?;
        self.execute(request).await
    }

    #[instrument(skip_all)]
    async fn listings_for_branch(
        &self,
        branch: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError> {
        let mut query = vec![("branch", eq(branch))];
        if let Some(since) = since {
            query.push((
                "created_at",
                format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ));
        }
        query.push(("order", NEWEST_FIRST.to_string()));
        let request = self.build_select_request("listings", &query)?;
        self.execute(request).await
    }

    #[instrument(skip_all)]
    async fn find_admin_user(
        &self,
        user_id: &str,
        temp_key: &str,
    ) -> Result<Option<AdminUser>, StoreError> {
        let request = self.build_select_request(
            "admin_users",
            &[
                ("user_id", eq(user_id)),
                ("temp_key", eq(temp_key)),
                ("limit", "1".to_string()),
            ],
        )?;
        let rows: Vec<AdminUser> = self.execute(request).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip_all)]
    async fn find_branch_manager(
        &self,
        user_id: &str,
        temp_key: &str,
    ) -> Result<Option<BranchManager>, StoreError> {
        let request = self.build_select_request(
            "branch_managers",
            &[
                ("user_id", eq(user_id)),
                ("temp_key", eq(temp_key)),
                ("limit", "1".to_string()),
            ],
        )?;
        let rows: Vec<BranchManager> = self.execute(request).await?;
        Ok(rows.into_iter().next())
    }
}
