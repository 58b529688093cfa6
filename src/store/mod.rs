// src/store/mod.rs
pub mod memory;
pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// The persisted compliment for one calendar date. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCompliment {
    pub date: NaiveDate,
    pub text: String,
    pub headline_title: String,
    pub created_at: DateTime<Utc>,
}

/// Date-keyed storage. A write for date D must be visible to any later read for D.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<StoredCompliment>, StoreError>;

    /// Conditional insert: fails with `StoreError::DuplicateKey` if the date is taken.
    async fn insert(&self, row: StoredCompliment) -> Result<(), StoreError>;

    /// Texts stored for dates within `window_days` of `around` on either side,
    /// `around` itself excluded, latest date first. Backfilled dates must not
    /// repeat a later day's text, so the window is not only the past.
    async fn recent_texts(&self, around: NaiveDate, window_days: u32) -> Result<Vec<String>, StoreError>;
}

/// Inclusive bounds of the history window around a date.
pub(crate) fn window_bounds(around: NaiveDate, window_days: u32) -> (NaiveDate, NaiveDate) {
    let days = chrono::Days::new(u64::from(window_days));
    let from = around.checked_sub_days(days).unwrap_or(NaiveDate::MIN);
    let to = around.checked_add_days(days).unwrap_or(NaiveDate::MAX);
    (from, to)
}
