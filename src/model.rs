use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[serde(alias = "draft")]
    Pending,
    Ready,
    Posted,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Ready => "ready",
            ListingStatus::Posted => "posted",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" | "draft" => Some(ListingStatus::Pending),
            "ready" => Some(ListingStatus::Ready),
            "posted" => Some(ListingStatus::Posted),
            _ => None,
        }
    }

    /// True once the enrichment process has touched the record.
    pub fn is_enriched(&self) -> bool {
        !matches!(self, ListingStatus::Pending)
    }
}

/// Copywriting style requested for a generated title or description.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    SloppyEnglish,
    SloppyMalay,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::SloppyEnglish => "sloppy_english",
            Style::SloppyMalay => "sloppy_malay",
        }
    }

    pub fn parse_style(s: &str) -> Option<Self> {
        match s {
            "sloppy_english" => Some(Style::SloppyEnglish),
            "sloppy_malay" => Some(Style::SloppyMalay),
            _ => None,
        }
    }
}

/// Shared tag of every record produced by one submission (`original_id` in
/// the record store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn from_millis(millis: i64) -> Self {
        BatchId(millis.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BatchId {
    fn from(value: String) -> Self {
        BatchId(value)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Insert payload for one listing of a batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub images: Vec<String>,
    pub status: ListingStatus,
    pub title_style: String,
    pub desc_style: String,
    pub price_mod: f64,
    pub original_id: BatchId,
    pub user_id: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub status: ListingStatus,
    #[serde(default)]
    pub original_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price_mod: Option<f64>,
    #[serde(default)]
    pub title_style: Option<String>,
    #[serde(default)]
    pub desc_style: Option<String>,
    #[serde(default)]
    pub prompt_title: Option<String>,
    #[serde(default)]
    pub prompt_desc: Option<String>,
}

/// Portal credential row (`admin_users`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminUser {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Dashboard credential row (`branch_managers`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchManager {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "shop_name")]
    pub branch: String,
}
