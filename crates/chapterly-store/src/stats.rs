//! Collection-wide aggregates.

use chapterly_common::{ChapterRecord, ChapterStatus};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate statistics over every stored chapter
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterStatistics {
    pub total_records: u64,
    pub total_questions_solved: u64,
    pub weak_count: u64,
    pub status_distribution: BTreeMap<String, u64>,
    pub subject_distribution: BTreeMap<String, u64>,
    /// Mean of the per-record completion rates, in percent, two decimals
    pub average_completion_rate: f64,
}

impl ChapterStatistics {
    /// Aggregate `records`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ChapterRecord>) -> Self {
        let mut stats = Self {
            status_distribution: ChapterStatus::ALL
                .iter()
                .map(|status| (status.as_str().to_string(), 0))
                .collect(),
            ..Self::default()
        };
        let mut rate_sum = 0.0;

        for record in records {
            stats.total_records += 1;
            stats.total_questions_solved = stats
                .total_questions_solved
                .saturating_add(record.question_solved);
            if record.is_weak_chapter {
                stats.weak_count += 1;
            }
            *stats
                .status_distribution
                .entry(record.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .subject_distribution
                .entry(record.subject.clone())
                .or_default() += 1;
            rate_sum += record.completion_rate();
        }

        if stats.total_records > 0 {
            stats.average_completion_rate = round2(rate_sum / stats.total_records as f64);
        }
        stats
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distinct values present in the collection, offered as filter choices
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub classes: Vec<String>,
    pub units: Vec<String>,
    pub subjects: Vec<String>,
    pub statuses: Vec<ChapterStatus>,
}

impl FilterOptions {
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ChapterRecord>) -> Self {
        let mut classes = BTreeSet::new();
        let mut units = BTreeSet::new();
        let mut subjects = BTreeSet::new();
        let mut statuses = BTreeSet::new();
        for record in records {
            classes.insert(record.class.clone());
            units.insert(record.unit.clone());
            subjects.insert(record.subject.clone());
            statuses.insert(record.status);
        }
        Self {
            classes: classes.into_iter().collect(),
            units: units.into_iter().collect(),
            subjects: subjects.into_iter().collect(),
            statuses: statuses.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterly_common::{ChapterId, NewChapter};
    use chrono::Utc;

    fn record(subject: &str, counts: &[(u16, u64)], solved: u64, status: ChapterStatus) -> ChapterRecord {
        NewChapter {
            subject: subject.into(),
            chapter: "Kinematics".into(),
            class: "Class 11".into(),
            unit: "Mechanics".into(),
            year_wise_question_count: counts.iter().copied().collect(),
            question_solved: solved,
            status,
            is_weak_chapter: status == ChapterStatus::NotStarted,
        }
        .into_record(ChapterId::new(), Utc::now())
    }

    #[test]
    fn test_empty_collection() {
        let stats = ChapterStatistics::from_records(&[]);
        assert_eq!(stats.total_records, 0);
        assert!(stats.average_completion_rate.abs() < f64::EPSILON);
        assert_eq!(stats.status_distribution.get("Completed"), Some(&0));
        assert!(stats.subject_distribution.is_empty());
    }

    #[test]
    fn test_aggregates() {
        let records = vec![
            // 5 of 10 -> 50%
            record("Physics", &[(2023, 4), (2024, 6)], 5, ChapterStatus::InProgress),
            // no questions -> 0%
            record("Physics", &[], 0, ChapterStatus::NotStarted),
            // 1 of 3 -> 33.33..%
            record("Chemistry", &[(2024, 3)], 1, ChapterStatus::Completed),
        ];
        let stats = ChapterStatistics::from_records(&records);

        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.total_questions_solved, 6);
        assert_eq!(stats.weak_count, 1);
        assert_eq!(stats.status_distribution["In Progress"], 1);
        assert_eq!(stats.status_distribution["Revision"], 0);
        assert_eq!(stats.subject_distribution["Physics"], 2);
        assert!((stats.average_completion_rate - 27.78).abs() < 1e-9);
    }

    #[test]
    fn test_filter_options_are_distinct_and_sorted() {
        let records = vec![
            record("Physics", &[], 0, ChapterStatus::Revision),
            record("Chemistry", &[], 0, ChapterStatus::NotStarted),
            record("Physics", &[], 0, ChapterStatus::Revision),
        ];
        let options = FilterOptions::from_records(&records);
        assert_eq!(options.subjects, ["Chemistry", "Physics"]);
        assert_eq!(options.classes, ["Class 11"]);
        assert_eq!(
            options.statuses,
            [ChapterStatus::NotStarted, ChapterStatus::Revision]
        );
    }

    #[test]
    fn test_huge_counts_saturate() {
        let records = vec![
            record("Physics", &[(2024, u64::MAX), (2025, 1)], u64::MAX, ChapterStatus::InProgress),
            record("Physics", &[(2024, 2)], 2, ChapterStatus::Completed),
        ];
        assert_eq!(records[0].total_questions(), u64::MAX);

        let stats = ChapterStatistics::from_records(&records);
        assert_eq!(stats.total_questions_solved, u64::MAX);
        assert!((stats.average_completion_rate - 100.0).abs() < 1e-9);
    }
}
