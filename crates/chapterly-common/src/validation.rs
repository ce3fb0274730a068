//! Chapter record validation
//!
//! Raw JSON coming from clients is checked against the chapter schema and
//! turned into typed [`NewChapter`] / [`ChapterPatch`] values.
//!
//! The validator is lenient about representation and strict about content:
//!
//! - unknown fields are dropped without complaint
//! - strings are trimmed, numeric strings become integers and
//!   `"true"`/`"false"` become booleans before any rule is checked
//! - every failing field is reported, never only the first one

use crate::error::{Error, FieldError};
use crate::types::{ChapterPatch, ChapterStatus, NewChapter, YearCounts, YearRange};
use serde::Serialize;
use serde_json::{Map, Value};

/// Maximum length of `subject`
pub const SUBJECT_MAX_LEN: usize = 100;
/// Maximum length of `chapter`
pub const CHAPTER_MAX_LEN: usize = 200;
/// Maximum length of `class`
pub const CLASS_MAX_LEN: usize = 50;
/// Maximum length of `unit`
pub const UNIT_MAX_LEN: usize = 100;

/// Largest accepted question count, per year and for `questionSolved`
pub const MAX_COUNT: u64 = 4_294_967_295;

const YEAR_COUNTS_FIELD: &str = "yearWiseQuestionCount";

/// Batch input that cannot be processed at all
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected a JSON array of chapters, got {0}")]
    NotAList(&'static str),
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::invalid_field("body", e.to_string())
    }
}

/// An item rejected by batch validation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RejectedItem {
    /// Position in the submitted batch
    pub index: usize,
    /// The item exactly as submitted
    #[serde(rename = "data")]
    pub raw: Value,
    /// Every problem found in the item
    pub errors: Vec<FieldError>,
}

/// Result of validating a batch: accepted chapters keep submission order
#[derive(Clone, Debug, Default)]
pub struct BatchValidation {
    pub accepted: Vec<NewChapter>,
    pub rejected: Vec<RejectedItem>,
}

/// Validate one raw chapter against the full schema.
///
/// # Errors
/// Returns every field-level problem found in `raw`.
pub fn validate_one(raw: &Value, years: &YearRange) -> Result<NewChapter, Vec<FieldError>> {
    let Some(obj) = raw.as_object() else {
        return Err(vec![
            FieldError::new("chapter", "each chapter must be a JSON object").with_value(raw.clone()),
        ]);
    };

    let mut errors = Vec::new();
    let subject = text(obj, "subject", SUBJECT_MAX_LEN, true, &mut errors);
    let chapter = text(obj, "chapter", CHAPTER_MAX_LEN, true, &mut errors);
    let class = text(obj, "class", CLASS_MAX_LEN, true, &mut errors);
    let unit = text(obj, "unit", UNIT_MAX_LEN, true, &mut errors);
    let counts = year_counts(obj.get(YEAR_COUNTS_FIELD), years, true, &mut errors);
    let solved = count(obj, "questionSolved", &mut errors);
    let status = status(obj, &mut errors);
    let weak = boolean(obj, "isWeakChapter", &mut errors);

    match (subject, chapter, class, unit, counts) {
        (Some(subject), Some(chapter), Some(class), Some(unit), Some(counts))
            if errors.is_empty() =>
        {
            Ok(NewChapter {
                subject,
                chapter,
                class,
                unit,
                year_wise_question_count: counts,
                question_solved: solved.unwrap_or(0),
                status: status.unwrap_or_default(),
                is_weak_chapter: weak.unwrap_or(false),
            })
        }
        _ => Err(errors),
    }
}

/// Validate a batch, partitioning it into accepted and rejected items.
///
/// # Errors
/// Returns `ValidationError::NotAList` when `raw` is not a JSON array;
/// per-item problems never fail the call.
pub fn validate_many(raw: &Value, years: &YearRange) -> Result<BatchValidation, ValidationError> {
    let Value::Array(items) = raw else {
        return Err(ValidationError::NotAList(json_type(raw)));
    };

    let mut batch = BatchValidation::default();
    for (index, item) in items.iter().enumerate() {
        match validate_one(item, years) {
            Ok(chapter) => batch.accepted.push(chapter),
            Err(errors) => batch.rejected.push(RejectedItem {
                index,
                raw: item.clone(),
                errors,
            }),
        }
    }
    Ok(batch)
}

/// Validate a partial update. No field is required, but at least one
/// known field must be present.
///
/// # Errors
/// Returns every field-level problem found in `raw`.
pub fn validate_patch(raw: &Value, years: &YearRange) -> Result<ChapterPatch, Vec<FieldError>> {
    let Some(obj) = raw.as_object() else {
        return Err(vec![
            FieldError::new("body", "update body must be a JSON object").with_value(raw.clone()),
        ]);
    };

    let mut errors = Vec::new();
    let patch = ChapterPatch {
        subject: text(obj, "subject", SUBJECT_MAX_LEN, false, &mut errors),
        chapter: text(obj, "chapter", CHAPTER_MAX_LEN, false, &mut errors),
        class: text(obj, "class", CLASS_MAX_LEN, false, &mut errors),
        unit: text(obj, "unit", UNIT_MAX_LEN, false, &mut errors),
        year_wise_question_count: year_counts(obj.get(YEAR_COUNTS_FIELD), years, false, &mut errors),
        question_solved: count(obj, "questionSolved", &mut errors),
        status: status(obj, &mut errors),
        is_weak_chapter: boolean(obj, "isWeakChapter", &mut errors),
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    if patch.is_empty() {
        return Err(vec![FieldError::new(
            "body",
            "at least one updatable field must be provided",
        )]);
    }
    Ok(patch)
}

fn present<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn text(
    obj: &Map<String, Value>,
    field: &str,
    max_len: usize,
    required: bool,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match present(obj, field) {
        None => {
            if required {
                errors.push(FieldError::new(field, format!("{field} is required")));
            }
            None
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                errors.push(
                    FieldError::new(field, format!("{field} must not be empty"))
                        .with_value(Value::String(s.clone())),
                );
                None
            } else if trimmed.chars().count() > max_len {
                errors.push(
                    FieldError::new(
                        field,
                        format!("{field} must be at most {max_len} characters"),
                    )
                    .with_value(Value::String(s.clone())),
                );
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a string")).with_value(other.clone()),
            );
            None
        }
    }
}

/// Coerce a JSON value into a non-negative integer no larger than
/// [`MAX_COUNT`].
fn coerce_count(value: &Value) -> Result<u64, &'static str> {
    match coerce_integer(value)? {
        n if n > MAX_COUNT => Err("is too large"),
        n => Ok(n),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn coerce_integer(value: &Value) -> Result<u64, &'static str> {
    let number = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(u);
            }
            if n.as_i64().is_some() {
                return Err("must be greater than or equal to 0");
            }
            n.as_f64().ok_or("must be a number")?
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(u) = s.parse::<u64>() {
                return Ok(u);
            }
            if s.parse::<i64>().is_ok() {
                return Err("must be greater than or equal to 0");
            }
            s.parse::<f64>().map_err(|_| "must be a number")?
        }
        _ => return Err("must be a number"),
    };

    if !number.is_finite() {
        Err("must be a number")
    } else if number < 0.0 {
        Err("must be greater than or equal to 0")
    } else if number.fract() != 0.0 {
        Err("must be an integer")
    } else if number > u64::MAX as f64 {
        Err("is too large")
    } else {
        Ok(number as u64)
    }
}

fn count(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<u64> {
    let value = present(obj, field)?;
    match coerce_count(value) {
        Ok(n) => Some(n),
        Err(msg) => {
            errors.push(FieldError::new(field, format!("{field} {msg}")).with_value(value.clone()));
            None
        }
    }
}

fn boolean(obj: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<bool> {
    let value = present(obj, field)?;
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    };
    if parsed.is_none() {
        errors.push(
            FieldError::new(field, format!("{field} must be a boolean")).with_value(value.clone()),
        );
    }
    parsed
}

fn status(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<ChapterStatus> {
    let value = present(obj, "status")?;
    let parsed = value.as_str().and_then(ChapterStatus::parse);
    if parsed.is_none() {
        let allowed: Vec<&str> = ChapterStatus::ALL.iter().map(ChapterStatus::as_str).collect();
        errors.push(
            FieldError::new(
                "status",
                format!("status must be one of: {}", allowed.join(", ")),
            )
            .with_value(value.clone()),
        );
    }
    parsed
}

fn year_counts(
    value: Option<&Value>,
    years: &YearRange,
    fill_missing: bool,
    errors: &mut Vec<FieldError>,
) -> Option<YearCounts> {
    let map = match value {
        None | Some(Value::Null) => {
            return fill_missing.then(|| years.zeroed());
        }
        Some(Value::Object(map)) => map,
        Some(other) => {
            errors.push(
                FieldError::new(
                    YEAR_COUNTS_FIELD,
                    "yearWiseQuestionCount must be an object mapping year to question count",
                )
                .with_value(other.clone()),
            );
            return None;
        }
    };

    let mut counts = if fill_missing {
        years.zeroed()
    } else {
        YearCounts::new()
    };
    let before = errors.len();
    for (key, raw) in map {
        let field = format!("{YEAR_COUNTS_FIELD}.{key}");
        match key.trim().parse::<u16>() {
            Ok(year) if years.contains(year) => match coerce_count(raw) {
                Ok(n) => {
                    counts.insert(year, n);
                }
                Err(msg) => {
                    errors.push(FieldError::new(&field, format!("{field} {msg}")).with_value(raw.clone()));
                }
            },
            _ => errors.push(FieldError::new(
                &field,
                format!("year must be between {} and {}", years.first, years.last),
            )),
        }
    }
    (errors.len() == before).then_some(counts)
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
