//! Persistent chapter store backed by redb.
//!
//! Records are bincode-encoded in the `chapters` table, keyed by id. The
//! `chapter_keys` table maps each natural key to its owner and is the
//! uniqueness constraint. redb is synchronous, so every operation runs on
//! the blocking pool.

use crate::error::{StoreError, StoreResult};
use crate::query::{ChapterQuery, select};
use crate::stats::{ChapterStatistics, FilterOptions};
use crate::store::{ChapterStore, ChapterUpdate, InsertFailure, InsertFault, InsertManyOutcome};
use crate::tables;
use async_trait::async_trait;
use chapterly_common::{ChapterId, ChapterRecord, NewChapter};
use chrono::Utc;
use redb::{Database, ReadableTable};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// [`ChapterStore`] persisted in a redb database file
#[derive(Clone)]
pub struct RedbChapterStore {
    db: Arc<Database>,
}

impl RedbChapterStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error when the file cannot be created or is not a redb
    /// database.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::CHAPTERS)?;
            let _t = write_txn.open_table(tables::CHAPTER_KEYS)?;
        }
        write_txn.commit()?;

        info!("Opened chapter store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db)).await?
    }
}

fn load_all(db: &Database) -> StoreResult<Vec<ChapterRecord>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(tables::CHAPTERS)?;
    let mut result = Vec::new();
    for entry in table.iter()? {
        let entry = entry?;
        match bincode::deserialize::<ChapterRecord>(entry.1.value()) {
            Ok(record) => result.push(record),
            Err(e) => error!("Failed to decode chapter '{}': {}", entry.0.value(), e),
        }
    }
    Ok(result)
}

fn load_one(db: &Database, id: ChapterId) -> StoreResult<ChapterRecord> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(tables::CHAPTERS)?;
    let key = id.to_string();
    match table.get(key.as_str())? {
        Some(bytes) => Ok(bincode::deserialize(bytes.value())?),
        None => Err(StoreError::NotFound(id)),
    }
}

fn insert_batch(db: &Database, batch: Vec<NewChapter>) -> StoreResult<InsertManyOutcome> {
    let now = Utc::now();
    let mut outcome = InsertManyOutcome::default();

    let write_txn = db.begin_write()?;
    {
        let mut chapters = write_txn.open_table(tables::CHAPTERS)?;
        let mut keys = write_txn.open_table(tables::CHAPTER_KEYS)?;

        for (index, chapter) in batch.into_iter().enumerate() {
            let natural_key = chapter.natural_key();
            if keys.get(natural_key.as_str())?.is_some() {
                outcome.failed.push(InsertFailure {
                    index,
                    fault: InsertFault::Duplicate(natural_key.describe()),
                });
                continue;
            }
            let record = chapter.into_record(ChapterId::new(), now);
            let id = record.id.to_string();
            let bytes = bincode::serialize(&record)?;
            chapters.insert(id.as_str(), bytes.as_slice())?;
            keys.insert(natural_key.as_str(), id.as_str())?;
            outcome.inserted.push(record);
        }
    }
    write_txn.commit()?;
    Ok(outcome)
}

fn update_one(db: &Database, id: ChapterId, update: ChapterUpdate) -> StoreResult<ChapterRecord> {
    let key = id.to_string();
    let write_txn = db.begin_write()?;
    let updated = {
        let mut chapters = write_txn.open_table(tables::CHAPTERS)?;
        let mut keys = write_txn.open_table(tables::CHAPTER_KEYS)?;

        let mut record: ChapterRecord = match chapters.get(key.as_str())? {
            Some(bytes) => bincode::deserialize(bytes.value())?,
            None => return Err(StoreError::NotFound(id)),
        };
        let old_key = record.natural_key();
        update.apply(&mut record, Utc::now());

        let new_key = record.natural_key();
        if new_key != old_key {
            let taken = keys
                .get(new_key.as_str())?
                .is_some_and(|owner| owner.value() != key);
            if taken {
                return Err(StoreError::Conflict(new_key.describe()));
            }
            keys.remove(old_key.as_str())?;
            keys.insert(new_key.as_str(), key.as_str())?;
        }

        let bytes = bincode::serialize(&record)?;
        chapters.insert(key.as_str(), bytes.as_slice())?;
        record
    };
    write_txn.commit()?;
    Ok(updated)
}

fn delete_one(db: &Database, id: ChapterId) -> StoreResult<ChapterRecord> {
    let key = id.to_string();
    let write_txn = db.begin_write()?;
    let record = {
        let mut chapters = write_txn.open_table(tables::CHAPTERS)?;
        let record: ChapterRecord = match chapters.remove(key.as_str())? {
            Some(bytes) => bincode::deserialize(bytes.value())?,
            None => return Err(StoreError::NotFound(id)),
        };
        let mut keys = write_txn.open_table(tables::CHAPTER_KEYS)?;
        keys.remove(record.natural_key().as_str())?;
        record
    };
    write_txn.commit()?;
    Ok(record)
}

#[async_trait]
impl ChapterStore for RedbChapterStore {
    fn backend(&self) -> &'static str {
        "redb"
    }

    async fn find_many(&self, query: &ChapterQuery) -> StoreResult<(Vec<ChapterRecord>, u64)> {
        let records = self.blocking(load_all).await?;
        Ok(select(records, query))
    }

    async fn find_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord> {
        self.blocking(move |db| load_one(db, id)).await
    }

    async fn insert_many(&self, batch: Vec<NewChapter>) -> StoreResult<InsertManyOutcome> {
        self.blocking(move |db| insert_batch(db, batch)).await
    }

    async fn update_by_id(&self, id: ChapterId, update: ChapterUpdate) -> StoreResult<ChapterRecord> {
        self.blocking(move |db| update_one(db, id, update)).await
    }

    async fn delete_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord> {
        self.blocking(move |db| delete_one(db, id)).await
    }

    async fn statistics(&self) -> StoreResult<ChapterStatistics> {
        let records = self.blocking(load_all).await?;
        Ok(ChapterStatistics::from_records(&records))
    }

    async fn filter_options(&self) -> StoreResult<FilterOptions> {
        let records = self.blocking(load_all).await?;
        Ok(FilterOptions::from_records(&records))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let _table = read_txn.open_table(tables::CHAPTERS)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) {
        info!("Closing chapter store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{exercise_store, sample};

    #[tokio::test]
    async fn test_redb_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbChapterStore::open(dir.path().join("chapters.redb")).unwrap();
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chapters.redb");

        let id = {
            let store = RedbChapterStore::open(&path).unwrap();
            let outcome = store.insert_many(vec![sample("Biology", "Cells")]).await.unwrap();
            outcome.inserted[0].id
        };

        let store = RedbChapterStore::open(&path).unwrap();
        let record = store.find_by_id(id).await.unwrap();
        assert_eq!(record.subject, "Biology");

        // The uniqueness index is persisted too
        let again = store.insert_many(vec![sample("Biology", "Cells")]).await.unwrap();
        assert!(again.inserted.is_empty());
        assert_eq!(again.failed.len(), 1);
    }
}
