//! The chapter store contract.

use crate::error::StoreResult;
use crate::query::ChapterQuery;
use crate::stats::{ChapterStatistics, FilterOptions};
use async_trait::async_trait;
use chapterly_common::{ChapterId, ChapterPatch, ChapterRecord, NewChapter};
use chrono::{DateTime, Utc};

/// Why a single item of a batch insert was not stored
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InsertFault {
    #[error("A chapter with this subject, chapter, class and unit already exists: {0}")]
    Duplicate(String),
}

/// A batch item the store refused
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertFailure {
    /// Position in the batch passed to [`ChapterStore::insert_many`]
    pub index: usize,
    pub fault: InsertFault,
}

/// Result of [`ChapterStore::insert_many`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsertManyOutcome {
    pub inserted: Vec<ChapterRecord>,
    pub failed: Vec<InsertFailure>,
}

/// Change applied by [`ChapterStore::update_by_id`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChapterUpdate {
    /// Replace every mutable field
    Replace(NewChapter),
    /// Change only the fields that are set; year counts merge per year
    Patch(ChapterPatch),
}

impl ChapterUpdate {
    /// Apply the change to `record` in place
    pub fn apply(self, record: &mut ChapterRecord, now: DateTime<Utc>) {
        match self {
            Self::Replace(chapter) => record.replace_with(chapter, now),
            Self::Patch(patch) => record.apply_patch(patch, now),
        }
    }
}

/// Persistence for chapter records.
///
/// Implementations enforce uniqueness of the natural key
/// `(subject, chapter, class, unit)` and assign ids and timestamps.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Return one page of matching records and the total match count
    async fn find_many(&self, query: &ChapterQuery) -> StoreResult<(Vec<ChapterRecord>, u64)>;

    /// Fetch a single record
    ///
    /// # Errors
    /// `StoreError::NotFound` when no record has this id.
    async fn find_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord>;

    /// Insert a batch, skipping items whose natural key is already taken
    /// (by a stored record or an earlier item of the same batch).
    ///
    /// # Errors
    /// Only backend failures are errors; per-item faults are reported in
    /// the outcome.
    async fn insert_many(&self, batch: Vec<NewChapter>) -> StoreResult<InsertManyOutcome>;

    /// Update a record, keeping its id and creation time.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown id, `StoreError::Conflict` when
    /// the new natural key belongs to another record.
    async fn update_by_id(&self, id: ChapterId, update: ChapterUpdate) -> StoreResult<ChapterRecord>;

    /// Delete a record, returning it
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown id.
    async fn delete_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord>;

    /// Aggregate statistics over all records
    async fn statistics(&self) -> StoreResult<ChapterStatistics>;

    /// Distinct filterable values present in the collection
    async fn filter_options(&self) -> StoreResult<FilterOptions>;

    /// Check that the backend is usable
    async fn ping(&self) -> StoreResult<()>;

    /// Flush and release resources. Called once at shutdown.
    async fn close(&self) {}
}
