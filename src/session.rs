//! Session context for the portal and the branch dashboard.
//!
//! The context is read once at startup and handed to whoever needs it;
//! login writes it, logout clears it.
use serde::{Deserialize, Serialize};
use sqlx::Row;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::db::Pool;
use crate::store::{RecordStore, StoreError};

const PORTAL_KEY: &str = "portal";
const MANAGER_KEY: &str = "branch_manager";

/// Seller identity stamped on every submitted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    pub user_id: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerSession {
    pub authenticated: bool,
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub portal: Option<PortalSession>,
    pub manager: Option<ManagerSession>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt session entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user id and temporary key are required")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential check failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Persists the session context in the local `session_state` table.
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: Pool,
}

impl SessionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    #[instrument(skip_all)]
    pub async fn load(&self) -> Result<SessionContext, SessionError> {
        let rows = sqlx::query("SELECT key, value FROM session_state")
            .fetch_all(&self.pool)
            .await?;
        let mut ctx = SessionContext::default();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                PORTAL_KEY => ctx.portal = Some(serde_json::from_str(&value)?),
                MANAGER_KEY => {
                    let manager: ManagerSession = serde_json::from_str(&value)?;
                    if manager.authenticated && !manager.branch.is_empty() {
                        ctx.manager = Some(manager);
                    }
                }
                other => warn!(key = other, "ignoring unknown session entry"),
            }
        }
        Ok(ctx)
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO session_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_portal(&self, session: &PortalSession) -> Result<(), SessionError> {
        self.put(PORTAL_KEY, session).await
    }

    pub async fn save_manager(&self, session: &ManagerSession) -> Result<(), SessionError> {
        self.put(MANAGER_KEY, session).await
    }

    /// Forget every stored identity.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM session_state")
            .execute(&self.pool)
            .await?;
        info!("session cleared");
        Ok(())
    }
}

fn require(user_id: &str, temp_key: &str) -> Result<(), AuthError> {
    if user_id.trim().is_empty() || temp_key.trim().is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(())
}

/// Check seller credentials against `admin_users` and remember the seller.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn login_portal(
    store: &dyn RecordStore,
    sessions: &SessionStore,
    user_id: &str,
    temp_key: &str,
) -> Result<PortalSession, AuthError> {
    require(user_id, temp_key)?;
    let user = store
        .find_admin_user(user_id.trim(), temp_key.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let session = PortalSession {
        user_id: user.user_id,
        branch: user.branch,
    };
    sessions.save_portal(&session).await?;
    info!(branch = ?session.branch, "portal login");
    Ok(session)
}

/// Check branch manager credentials against `branch_managers`.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn login_manager(
    store: &dyn RecordStore,
    sessions: &SessionStore,
    user_id: &str,
    temp_key: &str,
) -> Result<ManagerSession, AuthError> {
    require(user_id, temp_key)?;
    let manager = store
        .find_branch_manager(user_id.trim(), temp_key.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let session = ManagerSession {
        authenticated: true,
        branch: manager.branch,
    };
    sessions.save_manager(&session).await?;
    info!(branch = %session.branch, "branch manager login");
    Ok(session)
}
