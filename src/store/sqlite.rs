use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::db::Pool;
use crate::model::{AdminUser, BatchId, BranchManager, Listing, ListingStatus, NewListing};

const LISTING_COLUMNS: &str = "id, title, description, price, images, status, title_style, \
     desc_style, price_mod, prompt_title, prompt_desc, original_id, user_id, branch, created_at";

/// Record store backed by the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    #[instrument(skip_all)]
    pub async fn add_admin_user(
        &self,
        user_id: &str,
        temp_key: &str,
        name: Option<&str>,
        branch: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO admin_users (user_id, temp_key, name, branch) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(temp_key)
            .bind(name)
            .bind(branch)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn add_branch_manager(
        &self,
        user_id: &str,
        temp_key: &str,
        name: Option<&str>,
        branch: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO branch_managers (user_id, temp_key, name, branch) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(temp_key)
        .bind(name)
        .bind(branch)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn listing_from_row(row: &SqliteRow) -> Result<Listing, StoreError> {
    let status: String = row.try_get("status")?;
    let status =
        ListingStatus::parse_status(&status).ok_or_else(|| StoreError::UnknownStatus(status))?;
    let images: String = row.try_get("images")?;
    Ok(Listing {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        images: serde_json::from_str(&images)?,
        status,
        original_id: row.try_get("original_id")?,
        user_id: row.try_get("user_id")?,
        branch: row.try_get("branch")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        price_mod: row.try_get("price_mod")?,
        title_style: row.try_get("title_style")?,
        desc_style: row.try_get("desc_style")?,
        prompt_title: row.try_get("prompt_title")?,
        prompt_desc: row.try_get("prompt_desc")?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    #[instrument(skip_all, fields(rows = rows.len()))]
    async fn insert_listings(&self, rows: &[NewListing]) -> Result<Vec<Listing>, StoreError> {
        let created_at = Utc::now();
        let mut stored = Vec::with_capacity(rows.len());
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let id = Uuid::new_v4().to_string();
            let images = serde_json::to_string(&row.images)?;
            sqlx::query(
                "INSERT INTO listings (id, title, description, price, images, status, title_style, desc_style, price_mod, original_id, user_id, branch, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&row.title)
            .bind(&row.description)
            .bind(row.price)
            .bind(&images)
            .bind(row.status.as_str())
            .bind(&row.title_style)
            .bind(&row.desc_style)
            .bind(row.price_mod)
            .bind(row.original_id.as_str())
            .bind(&row.user_id)
            .bind(row.branch.as_deref())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
            stored.push(Listing {
                id,
                title: row.title.clone(),
                description: row.description.clone(),
                price: row.price,
                images: row.images.clone(),
                status: row.status,
                original_id: Some(row.original_id.to_string()),
                user_id: Some(row.user_id.clone()),
                branch: row.branch.clone(),
                created_at: Some(created_at),
                price_mod: Some(row.price_mod),
                title_style: Some(row.title_style.clone()),
                desc_style: Some(row.desc_style.clone()),
                prompt_title: None,
                prompt_desc: None,
            });
        }
        tx.commit().await?;
        Ok(stored)
    }

    #[instrument(skip_all, fields(batch_id = %batch_id))]
    async fn listings_for_batch(
        &self,
        batch_id: &BatchId,
        user_id: &str,
    ) -> Result<Vec<Listing>, StoreError> {
        let sql = format!(
            "SELECT {} FROM listings WHERE original_id = ? AND user_id = ? \
             ORDER BY datetime(created_at) DESC, rowid ASC",
            LISTING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(batch_id.as_str())
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(listing_from_row).collect()
    }

    #[instrument(skip_all)]
    async fn listings_for_branch(
        &self,
        branch: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError> {
        let rows = match since {
            Some(since) => {
                let sql = format!(
                    "SELECT {} FROM listings WHERE branch = ? AND datetime(created_at) >= datetime(?) \
                     ORDER BY datetime(created_at) DESC, rowid ASC",
                    LISTING_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(branch)
                    .bind(since)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM listings WHERE branch = ? \
                     ORDER BY datetime(created_at) DESC, rowid ASC",
                    LISTING_COLUMNS
                );
                sqlx::query(&sql).bind(branch).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(listing_from_row).collect()
    }

    #[instrument(skip_all)]
    async fn find_admin_user(
        &self,
        user_id: &str,
        temp_key: &str,
    ) -> Result<Option<AdminUser>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, name, branch FROM admin_users WHERE user_id = ? AND temp_key = ? LIMIT 1",
        )
        .bind(user_id)
        .bind(temp_key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(AdminUser {
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                branch: row.try_get("branch")?,
            })),
            None => Ok(None),
        }
    }

    #[instrument(skip_all)]
    async fn find_branch_manager(
        &self,
        user_id: &str,
        temp_key: &str,
    ) -> Result<Option<BranchManager>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, name, branch FROM branch_managers WHERE user_id = ? AND temp_key = ? LIMIT 1",
        )
        .bind(user_id)
        .bind(temp_key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(BranchManager {
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                branch: row.try_get("branch")?,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn row(batch: &BatchId, user: &str, title: &str) -> NewListing {
        NewListing {
            title: title.into(),
            description: format!("{} description", title),
            price: 50.0,
            images: vec![format!("https://cdn/{}.jpg", title)],
            status: ListingStatus::Pending,
            title_style: "sloppy_english".into(),
            desc_style: String::new(),
            price_mod: -1.0,
            original_id: batch.clone(),
            user_id: user.into(),
            branch: Some("KL".into()),
        }
    }

    #[tokio::test]
    async fn insert_then_select_by_batch_and_owner() {
        let store = SqliteStore::new(db::memory_pool().await.unwrap());
        let batch = BatchId::from_millis(1);
        let other = BatchId::from_millis(2);

        let stored = store
            .insert_listings(&[row(&batch, "u1", "a"), row(&batch, "u1", "b")])
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        store
            .insert_listings(&[row(&other, "u1", "c"), row(&batch, "u2", "d")])
            .await
            .unwrap();

        let fetched = store.listings_for_batch(&batch, "u1").await.unwrap();
        let titles: Vec<&str> = fetched.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert!(fetched.iter().all(|l| l.status == ListingStatus::Pending));
        assert_eq!(fetched[0].images, vec!["https://cdn/a.jpg".to_string()]);
        assert_eq!(fetched[0].id, stored[0].id);
    }

    #[tokio::test]
    async fn branch_listings_respect_since() {
        let store = SqliteStore::new(db::memory_pool().await.unwrap());
        let batch = BatchId::from_millis(1);
        store.insert_listings(&[row(&batch, "u1", "a")]).await.unwrap();
        sqlx::query("UPDATE listings SET created_at = '2020-01-01T00:00:00+00:00'")
            .execute(store.pool())
            .await
            .unwrap();
        store.insert_listings(&[row(&batch, "u1", "b")]).await.unwrap();

        let all = store.listings_for_branch("KL", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "b");

        let recent = store
            .listings_for_branch("KL", Some(Utc::now() - chrono::Duration::days(7)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "b");

        assert!(store.listings_for_branch("Penang", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn credential_lookups() {
        let store = SqliteStore::new(db::memory_pool().await.unwrap());
        store
            .add_admin_user("seller", "k1", Some("Sam"), Some("KL"))
            .await
            .unwrap();
        store
            .add_branch_manager("boss", "k2", None, "KL")
            .await
            .unwrap();

        let user = store.find_admin_user("seller", "k1").await.unwrap().unwrap();
        assert_eq!(user.branch.as_deref(), Some("KL"));
        assert!(store.find_admin_user("seller", "nope").await.unwrap().is_none());

        let manager = store.find_branch_manager("boss", "k2").await.unwrap().unwrap();
        assert_eq!(manager.branch, "KL");
        assert!(store.find_branch_manager("seller", "k1").await.unwrap().is_none());
    }
}
