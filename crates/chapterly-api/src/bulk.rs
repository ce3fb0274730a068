//! Bulk chapter creation.
//!
//! A batch is validated item by item, the accepted items are inserted in
//! one store call, and every item ends up either saved or reported with
//! the reason it was not. One saved item makes the whole request a
//! success.

use crate::read_cache;
use chapterly_cache::ResponseCache;
use chapterly_common::validation::validate_many;
use chapterly_common::{ChapterSummary, Error, FieldError, YearRange};
use chapterly_store::ChapterStore;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Which stage rejected an item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSource {
    Validation,
    Store,
}

/// A batch item that was not saved
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailedChapter {
    /// Position in the submitted batch for validation failures, in the
    /// accepted sub-batch for store failures
    pub index: usize,
    pub source: FailureSource,
    pub data: Value,
    pub errors: Vec<FieldError>,
}

/// Per-item outcome of a bulk request
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub saved_count: usize,
    pub failed_count: usize,
    pub saved_chapters: Vec<ChapterSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_chapters: Vec<FailedChapter>,
}

impl BulkReport {
    /// Whether at least one chapter was saved
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.saved_count > 0
    }

    /// Summary line for the response envelope
    #[must_use]
    pub fn message(&self) -> String {
        match (self.saved_count, self.failed_count) {
            (0, _) => "No chapters were saved".to_string(),
            (saved, 0) => format!("Successfully saved {saved} chapter(s)"),
            (saved, failed) => format!("Saved {saved} chapter(s), {failed} failed"),
        }
    }
}

/// Validate, insert and report a batch of raw chapters.
///
/// # Errors
/// Returns `Error::Validation` when `raw` is not an array and the mapped
/// store error when the store itself fails.
pub async fn create_chapters(
    store: &dyn ChapterStore,
    cache: &ResponseCache,
    years: &YearRange,
    raw: &Value,
) -> Result<BulkReport, Error> {
    let batch = validate_many(raw, years)?;

    let mut report = BulkReport {
        failed_chapters: batch
            .rejected
            .into_iter()
            .map(|item| FailedChapter {
                index: item.index,
                source: FailureSource::Validation,
                data: item.raw,
                errors: item.errors,
            })
            .collect(),
        ..BulkReport::default()
    };

    if !batch.accepted.is_empty() {
        let accepted = batch.accepted.clone();
        let outcome = store.insert_many(batch.accepted).await?;

        for failure in outcome.failed {
            let data = accepted
                .get(failure.index)
                .and_then(|chapter| serde_json::to_value(chapter).ok())
                .unwrap_or(Value::Null);
            report.failed_chapters.push(FailedChapter {
                index: failure.index,
                source: FailureSource::Store,
                data,
                errors: vec![FieldError::new("store", failure.fault.to_string())],
            });
        }
        report.saved_chapters = outcome.inserted.iter().map(|r| r.summary()).collect();
    }

    report.saved_count = report.saved_chapters.len();
    report.failed_count = report.failed_chapters.len();

    if report.saved_count > 0 {
        read_cache::invalidate_all(cache).await;
        info!(
            "Bulk insert saved {} chapter(s), {} failed",
            report.saved_count, report.failed_count
        );
    } else {
        info!("Bulk insert saved nothing, {} failed", report.failed_count);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chapterly_cache::MemoryCache;
    use chapterly_common::{ChapterId, ChapterRecord, NewChapter};
    use chapterly_store::{
        ChapterQuery, ChapterStatistics, ChapterUpdate, FilterOptions, InsertManyOutcome,
        MemoryChapterStore, StoreError, StoreResult,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Memory store that counts `insert_many` calls and can fail them
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryChapterStore,
        inserts: AtomicUsize,
        fail_inserts: bool,
    }

    #[async_trait]
    impl ChapterStore for ScriptedStore {
        fn backend(&self) -> &'static str {
            "scripted"
        }
        async fn find_many(&self, query: &ChapterQuery) -> StoreResult<(Vec<ChapterRecord>, u64)> {
            self.inner.find_many(query).await
        }
        async fn find_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord> {
            self.inner.find_by_id(id).await
        }
        async fn insert_many(&self, batch: Vec<NewChapter>) -> StoreResult<InsertManyOutcome> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_inserts {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.insert_many(batch).await
        }
        async fn update_by_id(&self, id: ChapterId, update: ChapterUpdate) -> StoreResult<ChapterRecord> {
            self.inner.update_by_id(id, update).await
        }
        async fn delete_by_id(&self, id: ChapterId) -> StoreResult<ChapterRecord> {
            self.inner.delete_by_id(id).await
        }
        async fn statistics(&self) -> StoreResult<ChapterStatistics> {
            self.inner.statistics().await
        }
        async fn filter_options(&self) -> StoreResult<FilterOptions> {
            self.inner.filter_options().await
        }
        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }
    }

    fn chapter(subject: &str, chapter: &str) -> Value {
        json!({
            "subject": subject,
            "chapter": chapter,
            "class": "Class 11",
            "unit": "Mechanics",
            "yearWiseQuestionCount": {"2024": 3},
            "questionSolved": 1,
            "status": "In Progress",
            "isWeakChapter": false
        })
    }

    fn cache() -> ResponseCache {
        ResponseCache::new(Arc::new(MemoryCache::new()), Duration::from_millis(250))
    }

    #[tokio::test]
    async fn test_every_item_is_accounted_for() {
        let store = MemoryChapterStore::new();
        let cache = cache();
        let raw = json!([
            chapter("Physics", "Kinematics"),
            {"subject": "Physics"},
            chapter("Physics", "Kinematics"),
            "not an object",
            chapter("Physics", "Optics"),
        ]);

        let report = create_chapters(&store, &cache, &YearRange::default(), &raw)
            .await
            .unwrap();
        assert_eq!(report.saved_count, 2);
        assert_eq!(report.failed_count, 3);
        assert_eq!(report.saved_count + report.failed_count, 5);
        assert!(report.is_success());

        let validation: Vec<_> = report
            .failed_chapters
            .iter()
            .filter(|f| f.source == FailureSource::Validation)
            .map(|f| f.index)
            .collect();
        assert_eq!(validation, [1, 3]);

        // The in-batch duplicate is the second accepted item
        let store_failure = report
            .failed_chapters
            .iter()
            .find(|f| f.source == FailureSource::Store)
            .unwrap();
        assert_eq!(store_failure.index, 1);
        assert_eq!(store_failure.errors[0].field, "store");
        assert_eq!(store_failure.data["chapter"], "Kinematics");
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_reads() {
        let store = MemoryChapterStore::new();
        let cache = cache();
        cache
            .set_json("chapters:/api/v1/chapters", &json!({"chapters": []}), Duration::from_secs(60))
            .await;

        create_chapters(&store, &cache, &YearRange::default(), &json!([chapter("Math", "Sets")]))
            .await
            .unwrap();
        assert!(cache.get_raw("chapters:/api/v1/chapters").await.is_none());
    }

    #[tokio::test]
    async fn test_nothing_saved_is_a_failure() {
        let store = MemoryChapterStore::new();
        let cache = cache();
        let years = YearRange::default();

        let report = create_chapters(&store, &cache, &years, &json!([])).await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.message(), "No chapters were saved");

        create_chapters(&store, &cache, &years, &json!([chapter("Math", "Sets")]))
            .await
            .unwrap();
        let repeat = create_chapters(&store, &cache, &years, &json!([chapter("Math", "Sets")]))
            .await
            .unwrap();
        assert_eq!(repeat.saved_count, 0);
        assert_eq!(repeat.failed_count, 1);
        assert!(!repeat.is_success());
    }

    #[tokio::test]
    async fn test_non_array_is_rejected_whole() {
        let store = MemoryChapterStore::new();
        let err = create_chapters(&store, &cache(), &YearRange::default(), &json!({"subject": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_report_serialization_omits_empty_failures() {
        let value = serde_json::to_value(BulkReport::default()).unwrap();
        assert_eq!(value["savedCount"], 0);
        assert!(value.get("failedChapters").is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_fatal() {
        let store = ScriptedStore {
            fail_inserts: true,
            ..ScriptedStore::default()
        };
        let cache = cache();
        cache
            .set_json("chapters:/api/v1/chapters", &json!({"chapters": []}), Duration::from_secs(60))
            .await;

        let raw = json!([chapter("Math", "Sets"), {"subject": "Math"}]);
        let err = create_chapters(&store, &cache, &YearRange::default(), &raw)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert!(cache.get_raw("chapters:/api/v1/chapters").await.is_some());
    }

    #[tokio::test]
    async fn test_no_accepted_items_skips_insert() {
        let store = ScriptedStore::default();
        let cache = cache();
        let years = YearRange::default();

        let report = create_chapters(&store, &cache, &years, &json!([{"subject": "Math"}, 7]))
            .await
            .unwrap();
        assert_eq!(report.failed_count, 2);
        assert!(report.failed_chapters.iter().all(|f| f.source == FailureSource::Validation));

        create_chapters(&store, &cache, &years, &json!([])).await.unwrap();
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);

        create_chapters(&store, &cache, &years, &json!([chapter("Math", "Sets")]))
            .await
            .unwrap();
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    }
}
