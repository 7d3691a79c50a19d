use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::domain::model::{InsertResult, MoistureRecord};
use crate::domain::ports::Repository;
use crate::utils::error::{FetcherError, Result};

/// Process-local record store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<BTreeMap<NaiveDate, MoistureRecord>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = MoistureRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.date, r)).collect();
        Self {
            records: Arc::new(Mutex::new(map)),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<MoistureRecord> {
        self.records.lock().ok()?.get(&date).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<NaiveDate, MoistureRecord>>> {
        self.records.lock().map_err(|_| FetcherError::StoreError {
            message: "in-memory repository lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.lock()?.contains_key(&date))
    }

    async fn insert_if_absent(&self, record: &MoistureRecord) -> Result<InsertResult> {
        let mut records = self.lock()?;
        if records.contains_key(&record.date) {
            return Ok(InsertResult::AlreadyPresent);
        }
        records.insert(record.date, record.clone());
        Ok(InsertResult::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Reading;

    fn record(d: u32, value: f64) -> MoistureRecord {
        MoistureRecord::from_reading(
            NaiveDate::from_ymd_opt(2024, 6, d).unwrap(),
            &Reading {
                value,
                label: "label".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_record() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.insert_if_absent(&record(1, 0.1)).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            repo.insert_if_absent(&record(1, 0.9)).await.unwrap(),
            InsertResult::AlreadyPresent
        );
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(record(1, 0.0).date).unwrap().value, Some(0.1));
        assert!(repo.exists(record(1, 0.0).date).await.unwrap());
        assert!(!repo.exists(record(2, 0.0).date).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_yield_one_winner() {
        let repo = InMemoryRepository::new();
        let first = repo.clone();
        let second = repo.clone();

        let a = tokio::spawn(async move { first.insert_if_absent(&record(7, 0.2)).await.unwrap() });
        let b = tokio::spawn(async move { second.insert_if_absent(&record(7, 0.3)).await.unwrap() });
        let mut results = vec![a.await.unwrap(), b.await.unwrap()];
        results.sort_by_key(|r| matches!(r, InsertResult::AlreadyPresent));

        assert_eq!(results, vec![InsertResult::Inserted, InsertResult::AlreadyPresent]);
        assert_eq!(repo.len(), 1);
    }
}
