//! Read-only aggregation behind the branch dashboard.
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};

use crate::model::{Listing, ListingStatus};

/// Keep only the first (newest) record of each batch. Records without a
/// batch id are all kept.
pub fn dedupe_batches(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| match &l.original_id {
            Some(batch) => seen.insert(batch.clone()),
            None => true,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub user_id: Option<String>,
    /// Case-insensitive match against title or description.
    pub search: Option<String>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(status) = self.status {
            if listing.status != status {
                return false;
            }
        }
        if let Some(user) = &self.user_id {
            if listing.user_id.as_deref() != Some(user.as_str()) {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            if !listing.title.to_lowercase().contains(&term)
                && !listing.description.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        listings.iter().filter(|l| self.matches(l)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailySummary {
    pub listings_today: usize,
    pub regenerations_today: usize,
    pub active_users_today: usize,
}

fn created_on(listing: &Listing) -> Option<NaiveDate> {
    listing.created_at.map(|t| t.date_naive())
}

pub fn summarize(listings: &[Listing], today: NaiveDate) -> DailySummary {
    let todays: Vec<&Listing> = listings
        .iter()
        .filter(|l| created_on(l) == Some(today))
        .collect();
    let regenerations_today = todays
        .iter()
        .filter(|l| l.prompt_title.is_some() || l.prompt_desc.is_some())
        .count();
    let active_users_today = todays
        .iter()
        .map(|l| l.user_id.as_deref())
        .collect::<HashSet<_>>()
        .len();
    DailySummary {
        listings_today: todays.len(),
        regenerations_today,
        active_users_today,
    }
}

/// Listings per user per day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub user_id: String,
    pub count: usize,
}

/// Per-day, per-user counts of listings created at or after `since`,
/// ordered by date then user. Rows without owner or timestamp are skipped.
pub fn consistency(listings: &[Listing], since: DateTime<Utc>) -> Vec<DailyCount> {
    let mut counts: BTreeMap<(NaiveDate, String), usize> = BTreeMap::new();
    for listing in listings {
        let (Some(created), Some(user)) = (listing.created_at, listing.user_id.as_ref()) else {
            continue;
        };
        if created < since {
            continue;
        }
        *counts.entry((created.date_naive(), user.clone())).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((date, user_id), count)| DailyCount {
            date,
            user_id,
            count,
        })
        .collect()
}

pub fn has_duplicate_title(listing: &Listing, all: &[Listing]) -> bool {
    let title = listing.title.to_lowercase();
    all.iter()
        .any(|other| other.id != listing.id && other.title.to_lowercase() == title)
}

pub fn has_empty_title(listing: &Listing) -> bool {
    listing.title.trim().is_empty()
}

/// Whole ringgit with thousands separators, e.g. `RM 1,250`.
pub fn format_price(price: f64) -> String {
    let rounded = price.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}RM {}", sign, grouped)
}
