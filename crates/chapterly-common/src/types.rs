//! Core type definitions for Chapterly
//!
//! This module defines the chapter record, its identifier, the status
//! enumeration and the year bookkeeping shared by the validator, the
//! store backends and the HTTP layer.

use chrono::{DateTime, Utc};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Per-year question counts, keyed by calendar year.
pub type YearCounts = BTreeMap<u16, u64>;

/// Unique identifier for a chapter record
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into)]
pub struct ChapterId(Uuid);

impl ChapterId {
    /// Generate a new random chapter ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ChapterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChapterId({})", self.0)
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChapterId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Progress status of a chapter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum ChapterStatus {
    #[default]
    #[serde(rename = "Not Started")]
    #[display("Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    #[display("In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    #[display("Completed")]
    Completed,
    #[serde(rename = "Revision")]
    #[display("Revision")]
    Revision,
}

impl ChapterStatus {
    /// All statuses in display order
    pub const ALL: [Self; 4] = [
        Self::NotStarted,
        Self::InProgress,
        Self::Completed,
        Self::Revision,
    ];

    /// Parse the wire representation (`"Not Started"`, ...)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Wire representation of the status
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Revision => "Revision",
        }
    }
}

/// Inclusive range of tracked years for `yearWiseQuestionCount`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub first: u16,
    pub last: u16,
}

impl YearRange {
    /// Create a year range, `None` when `first > last`
    #[must_use]
    pub const fn new(first: u16, last: u16) -> Option<Self> {
        if first > last {
            None
        } else {
            Some(Self { first, last })
        }
    }

    /// Whether `year` is tracked
    #[must_use]
    pub const fn contains(&self, year: u16) -> bool {
        year >= self.first && year <= self.last
    }

    /// Iterate over every tracked year
    pub fn years(&self) -> impl Iterator<Item = u16> {
        self.first..=self.last
    }

    /// A count map with every tracked year set to zero
    #[must_use]
    pub fn zeroed(&self) -> YearCounts {
        self.years().map(|year| (year, 0)).collect()
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            first: 2019,
            last: 2025,
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

impl FromStr for YearRange {
    type Err = String;

    /// Accepts `2019-2025` or a single year
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u16>()
                .map_err(|e| format!("invalid year '{}': {e}", v.trim()))
        };
        let (first, last) = match s.split_once('-') {
            Some((a, b)) => (parse(a)?, parse(b)?),
            None => {
                let year = parse(s)?;
                (year, year)
            }
        };
        Self::new(first, last).ok_or_else(|| format!("year range {first}-{last} is inverted"))
    }
}

/// A validated chapter that has not been persisted yet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChapter {
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
    pub year_wise_question_count: YearCounts,
    pub question_solved: u64,
    pub status: ChapterStatus,
    pub is_weak_chapter: bool,
}

impl NewChapter {
    /// Natural key enforcing uniqueness across the collection
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.subject, &self.chapter, &self.class, &self.unit)
    }

    /// Assign identity and timestamps
    #[must_use]
    pub fn into_record(self, id: ChapterId, now: DateTime<Utc>) -> ChapterRecord {
        ChapterRecord {
            id,
            subject: self.subject,
            chapter: self.chapter,
            class: self.class,
            unit: self.unit,
            year_wise_question_count: self.year_wise_question_count,
            question_solved: self.question_solved,
            status: self.status,
            is_weak_chapter: self.is_weak_chapter,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persisted chapter record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub id: ChapterId,
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
    pub year_wise_question_count: YearCounts,
    pub question_solved: u64,
    pub status: ChapterStatus,
    pub is_weak_chapter: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChapterRecord {
    /// Natural key enforcing uniqueness across the collection
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.subject, &self.chapter, &self.class, &self.unit)
    }

    /// Sum of all year counts, saturating at `u64::MAX`
    #[must_use]
    pub fn total_questions(&self) -> u64 {
        self.year_wise_question_count
            .values()
            .fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    /// Completion rate in percent, 0 when no questions are tracked
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_rate(&self) -> f64 {
        let total = self.total_questions();
        if total == 0 {
            0.0
        } else {
            self.question_solved as f64 / total as f64 * 100.0
        }
    }

    /// Replace every mutable field, keeping identity and `created_at`
    pub fn replace_with(&mut self, chapter: NewChapter, now: DateTime<Utc>) {
        self.subject = chapter.subject;
        self.chapter = chapter.chapter;
        self.class = chapter.class;
        self.unit = chapter.unit;
        self.year_wise_question_count = chapter.year_wise_question_count;
        self.question_solved = chapter.question_solved;
        self.status = chapter.status;
        self.is_weak_chapter = chapter.is_weak_chapter;
        self.updated_at = now;
    }

    /// Apply a partial update; year counts are merged per year
    pub fn apply_patch(&mut self, patch: ChapterPatch, now: DateTime<Utc>) {
        if let Some(subject) = patch.subject {
            self.subject = subject;
        }
        if let Some(chapter) = patch.chapter {
            self.chapter = chapter;
        }
        if let Some(class) = patch.class {
            self.class = class;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(counts) = patch.year_wise_question_count {
            self.year_wise_question_count.extend(counts);
        }
        if let Some(solved) = patch.question_solved {
            self.question_solved = solved;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(weak) = patch.is_weak_chapter {
            self.is_weak_chapter = weak;
        }
        self.updated_at = now;
    }

    /// Identifying fields only, as reported by bulk creation
    #[must_use]
    pub fn summary(&self) -> ChapterSummary {
        ChapterSummary {
            id: self.id,
            subject: self.subject.clone(),
            chapter: self.chapter.clone(),
            class: self.class.clone(),
            unit: self.unit.clone(),
        }
    }
}

/// Identifying fields of a saved chapter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: ChapterId,
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
}

/// Partial update; `None` leaves the field untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPatch {
    pub subject: Option<String>,
    pub chapter: Option<String>,
    pub class: Option<String>,
    pub unit: Option<String>,
    pub year_wise_question_count: Option<YearCounts>,
    pub question_solved: Option<u64>,
    pub status: Option<ChapterStatus>,
    pub is_weak_chapter: Option<bool>,
}

impl ChapterPatch {
    /// True when no field would change
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.chapter.is_none()
            && self.class.is_none()
            && self.unit.is_none()
            && self.year_wise_question_count.is_none()
            && self.question_solved.is_none()
            && self.status.is_none()
            && self.is_weak_chapter.is_none()
    }

    /// Whether the patch touches any natural-key field
    #[must_use]
    pub const fn touches_natural_key(&self) -> bool {
        self.subject.is_some() || self.chapter.is_some() || self.class.is_some() || self.unit.is_some()
    }
}

/// Uniqueness key over `(subject, chapter, class, unit)`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct NaturalKey(String);

impl NaturalKey {
    /// Build a key from the four identifying fields
    #[must_use]
    pub fn new(subject: &str, chapter: &str, class: &str, unit: &str) -> Self {
        Self(format!("{subject}\u{0}{chapter}\u{0}{class}\u{0}{unit}"))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form for error messages
    #[must_use]
    pub fn describe(&self) -> String {
        self.0.replace('\u{0}', " / ")
    }
}
