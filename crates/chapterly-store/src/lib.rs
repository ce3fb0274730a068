//! Chapterly Store - chapter record persistence
//!
//! [`ChapterStore`] is the document-store contract used by the API layer.
//! Two backends implement it:
//!
//! - [`MemoryChapterStore`]: process-local, for development and tests
//! - [`RedbChapterStore`]: persistent, one redb database file

pub mod error;
pub mod memory;
pub mod query;
pub mod redb_store;
pub mod stats;
pub mod store;
mod tables;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryChapterStore;
pub use query::{ChapterFilter, ChapterQuery, SortField, SortOrder};
pub use redb_store::RedbChapterStore;
pub use stats::{ChapterStatistics, FilterOptions};
pub use store::{ChapterStore, ChapterUpdate, InsertFailure, InsertFault, InsertManyOutcome};

use std::sync::Arc;
use tracing::info;

/// Open the store named by `uri`: `memory://` (or empty) or `redb://<path>`.
///
/// # Errors
/// Returns `StoreError::InvalidUri` for unknown schemes and the redb error
/// when the database cannot be opened.
pub fn connect(uri: &str) -> StoreResult<Arc<dyn ChapterStore>> {
    let uri = uri.trim();
    if uri.is_empty() || uri.starts_with("memory://") {
        info!("Using in-memory chapter store");
        return Ok(Arc::new(MemoryChapterStore::new()));
    }
    if let Some(path) = uri.strip_prefix("redb://")
        && !path.is_empty()
    {
        return Ok(Arc::new(RedbChapterStore::open(path)?));
    }
    Err(StoreError::InvalidUri(uri.to_string()))
}
