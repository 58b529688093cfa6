//! In-process datastore. Nothing survives a restart.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{window_bounds, Datastore, StoredCompliment};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<NaiveDate, StoredCompliment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl Datastore for MemoryStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<StoredCompliment>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(|p| p.into_inner());
        Ok(rows.get(&date).cloned())
    }

    async fn insert(&self, row: StoredCompliment) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(|p| p.into_inner());
        if rows.contains_key(&row.date) {
            return Err(StoreError::DuplicateKey(row.date));
        }
        rows.insert(row.date, row);
        Ok(())
    }

    async fn recent_texts(&self, around: NaiveDate, window_days: u32) -> Result<Vec<String>, StoreError> {
        let (from, to) = window_bounds(around, window_days);
        let rows = self.rows.read().unwrap_or_else(|p| p.into_inner());
        Ok(rows
            .range(from..=to)
            .rev()
            .filter(|(d, _)| **d != around)
            .map(|(_, r)| r.text.clone())
            .collect())
    }
}
