//! Filtering, sorting and pagination of chapter records.
//!
//! Both backends load candidate records and hand them to [`select`], so
//! query semantics are identical regardless of where records live.

use chapterly_common::{ChapterRecord, ChapterStatus};
use serde::Serialize;
use std::cmp::Ordering;

/// Record filter. Text fields match case-insensitive substrings, the rest
/// match exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ChapterStatus>,
    #[serde(rename = "weakChapters", skip_serializing_if = "Option::is_none")]
    pub is_weak_chapter: Option<bool>,
}

impl ChapterFilter {
    /// True when no criterion is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.class.is_none()
            && self.unit.is_none()
            && self.subject.is_none()
            && self.status.is_none()
            && self.is_weak_chapter.is_none()
    }

    /// Whether `record` satisfies every set criterion
    #[must_use]
    pub fn matches(&self, record: &ChapterRecord) -> bool {
        contains_ignore_case(&record.class, self.class.as_deref())
            && contains_ignore_case(&record.unit, self.unit.as_deref())
            && contains_ignore_case(&record.subject, self.subject.as_deref())
            && self.status.is_none_or(|status| record.status == status)
            && self.is_weak_chapter.is_none_or(|weak| record.is_weak_chapter == weak)
    }
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
}

/// Sortable record fields
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Subject,
    Chapter,
    Class,
    Unit,
    QuestionSolved,
    Status,
}

impl SortField {
    pub const ALL: [Self; 8] = [
        Self::CreatedAt,
        Self::UpdatedAt,
        Self::Subject,
        Self::Chapter,
        Self::Class,
        Self::Unit,
        Self::QuestionSolved,
        Self::Status,
    ];

    /// Parse the query-string name (`createdAt`, `questionSolved`, ...)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::Subject => "subject",
            Self::Chapter => "chapter",
            Self::Class => "class",
            Self::Unit => "unit",
            Self::QuestionSolved => "questionSolved",
            Self::Status => "status",
        }
    }

    fn compare(self, a: &ChapterRecord, b: &ChapterRecord) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Subject => a.subject.cmp(&b.subject),
            Self::Chapter => a.chapter.cmp(&b.chapter),
            Self::Class => a.class.cmp(&b.class),
            Self::Unit => a.unit.cmp(&b.unit),
            Self::QuestionSolved => a.question_solved.cmp(&b.question_solved),
            Self::Status => a.status.as_str().cmp(b.status.as_str()),
        }
    }
}

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A filtered, sorted page request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterQuery {
    pub filter: ChapterFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ChapterQuery {
    fn default() -> Self {
        Self {
            filter: ChapterFilter::default(),
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            offset: 0,
            limit: 10,
        }
    }
}

/// Apply `query` to `records`, returning the requested page and the total
/// number of matches.
pub fn select(
    records: impl IntoIterator<Item = ChapterRecord>,
    query: &ChapterQuery,
) -> (Vec<ChapterRecord>, u64) {
    let mut matched: Vec<ChapterRecord> = records
        .into_iter()
        .filter(|record| query.filter.matches(record))
        .collect();
    let total = matched.len() as u64;

    matched.sort_by(|a, b| {
        let ordering = query.sort_by.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match query.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let page = matched
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();
    (page, total)
}
