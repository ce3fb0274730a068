//! In-memory chapter store.

use crate::error::{StoreError, StoreResult};
use crate::query::{ChapterQuery, select};
use crate::stats::{ChapterStatistics, FilterOptions};
use crate::store::{ChapterStore, ChapterUpdate, InsertFailure, InsertFault, InsertManyOutcome};
use async_trait::async_trait;
use chapterly_common::{ChapterId, ChapterRecord, NaturalKey, NewChapter};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    records: HashMap<ChapterId, ChapterRecord>,
    keys: HashMap<NaturalKey, ChapterId>,
}

/// [`ChapterStore`] that keeps everything in process memory
#[derive(Default)]
pub struct MemoryChapterStore {
    inner: RwLock<Inner>,
}

impl MemoryChapterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChapterStore for MemoryChapterStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_many(&self, query: &ChapterQuery) -> StoreResult<(Vec<ChapterRecord>, u64)> {
        let inner = self.inner.read();
        Ok(select(inner.records.values().cloned(), query))
    }

    async fn find_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord> {
        self.inner
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_many(&self, batch: Vec<NewChapter>) -> StoreResult<InsertManyOutcome> {
        let now = Utc::now();
        let mut outcome = InsertManyOutcome::default();
        let mut inner = self.inner.write();

        for (index, chapter) in batch.into_iter().enumerate() {
            let key = chapter.natural_key();
            if inner.keys.contains_key(&key) {
                outcome.failed.push(InsertFailure {
                    index,
                    fault: InsertFault::Duplicate(key.describe()),
                });
                continue;
            }
            let record = chapter.into_record(ChapterId::new(), now);
            inner.keys.insert(key, record.id);
            inner.records.insert(record.id, record.clone());
            outcome.inserted.push(record);
        }
        Ok(outcome)
    }

    async fn update_by_id(&self, id: ChapterId, update: ChapterUpdate) -> StoreResult<ChapterRecord> {
        let mut inner = self.inner.write();
        let mut updated = inner
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        let old_key = updated.natural_key();
        update.apply(&mut updated, Utc::now());

        let new_key = updated.natural_key();
        if new_key != old_key {
            if let Some(owner) = inner.keys.get(&new_key)
                && *owner != id
            {
                return Err(StoreError::Conflict(new_key.describe()));
            }
            inner.keys.remove(&old_key);
            inner.keys.insert(new_key, id);
        }
        inner.records.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord> {
        let mut inner = self.inner.write();
        let record = inner.records.remove(&id).ok_or(StoreError::NotFound(id))?;
        inner.keys.remove(&record.natural_key());
        Ok(record)
    }

    async fn statistics(&self) -> StoreResult<ChapterStatistics> {
        Ok(ChapterStatistics::from_records(self.inner.read().records.values()))
    }

    async fn filter_options(&self) -> StoreResult<FilterOptions> {
        Ok(FilterOptions::from_records(self.inner.read().records.values()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{exercise_store, sample};

    #[tokio::test]
    async fn test_memory_store_contract() {
        exercise_store(&MemoryChapterStore::new()).await;
    }

    #[tokio::test]
    async fn test_delete_frees_natural_key() {
        let store = MemoryChapterStore::new();
        let first = store.insert_many(vec![sample("Physics", "Optics")]).await.unwrap();
        let id = first.inserted[0].id;

        store.delete_by_id(id).await.unwrap();
        assert!(store.is_empty());

        let again = store.insert_many(vec![sample("Physics", "Optics")]).await.unwrap();
        assert_eq!(again.inserted.len(), 1);
        assert_ne!(again.inserted[0].id, id);
    }
}
