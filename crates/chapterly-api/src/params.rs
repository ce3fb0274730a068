//! Query-string parameters of the list endpoint.

use chapterly_common::{ChapterStatus, FieldError};
use chapterly_store::{ChapterFilter, ChapterQuery, SortField, SortOrder};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// A validated list request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRequest {
    pub page: usize,
    pub limit: usize,
    pub query: ChapterQuery,
}

impl ListRequest {
    /// Parse raw query parameters, collecting every problem.
    ///
    /// Empty values count as absent; unknown parameters are ignored.
    ///
    /// # Errors
    /// Returns one [`FieldError`] per invalid parameter.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, Vec<FieldError>> {
        let get = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let mut errors = Vec::new();

        let page = bounded(get("page"), "page", DEFAULT_PAGE, 1, usize::MAX, &mut errors);
        let limit = bounded(get("limit"), "limit", DEFAULT_LIMIT, 1, MAX_LIMIT, &mut errors);

        let status = get("status").and_then(|raw| {
            let parsed = ChapterStatus::parse(raw);
            if parsed.is_none() {
                let allowed: Vec<_> = ChapterStatus::ALL.iter().map(ChapterStatus::as_str).collect();
                errors.push(
                    FieldError::new("status", format!("must be one of: {}", allowed.join(", ")))
                        .with_value(Value::from(raw)),
                );
            }
            parsed
        });

        let is_weak_chapter = get("weakChapters").and_then(|raw| match raw {
            "true" => Some(true),
            "false" => Some(false),
            other => {
                errors.push(
                    FieldError::new("weakChapters", "must be true or false").with_value(Value::from(other)),
                );
                None
            }
        });

        let sort_by = match get("sortBy") {
            None => SortField::default(),
            Some(raw) => SortField::parse(raw).unwrap_or_else(|| {
                let allowed: Vec<_> = SortField::ALL.iter().map(SortField::as_str).collect();
                errors.push(
                    FieldError::new("sortBy", format!("must be one of: {}", allowed.join(", ")))
                        .with_value(Value::from(raw)),
                );
                SortField::default()
            }),
        };

        let sort_order = match get("sortOrder") {
            None => SortOrder::default(),
            Some(raw) => SortOrder::parse(raw).unwrap_or_else(|| {
                errors.push(FieldError::new("sortOrder", "must be asc or desc").with_value(Value::from(raw)));
                SortOrder::default()
            }),
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let filter = ChapterFilter {
            class: get("class").map(str::to_string),
            unit: get("unit").map(str::to_string),
            subject: get("subject").map(str::to_string),
            status,
            is_weak_chapter,
        };
        Ok(Self {
            page,
            limit,
            query: ChapterQuery {
                filter,
                sort_by,
                sort_order,
                offset: (page - 1).saturating_mul(limit),
                limit,
            },
        })
    }
}

fn bounded(
    raw: Option<&str>,
    field: &str,
    default: usize,
    min: usize,
    max: usize,
    errors: &mut Vec<FieldError>,
) -> usize {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(n) if (min..=max).contains(&n) => n,
        _ => {
            let message = if max == usize::MAX {
                format!("must be an integer of at least {min}")
            } else {
                format!("must be an integer between {min} and {max}")
            };
            errors.push(FieldError::new(field, message).with_value(Value::from(raw)));
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let req = ListRequest::from_params(&HashMap::new()).unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 10);
        assert_eq!(req.query.offset, 0);
        assert_eq!(req.query.sort_by, SortField::CreatedAt);
        assert_eq!(req.query.sort_order, SortOrder::Desc);
        assert!(req.query.filter.is_empty());
    }

    #[test]
    fn test_filters_and_paging() {
        let req = ListRequest::from_params(&params(&[
            ("page", "3"),
            ("limit", "20"),
            ("class", "Class 11"),
            ("status", "In Progress"),
            ("weakChapters", "true"),
            ("sortBy", "questionSolved"),
            ("sortOrder", "asc"),
            ("subject", ""),
            ("utm_source", "mail"),
        ]))
        .unwrap();
        assert_eq!(req.query.offset, 40);
        assert_eq!(req.query.limit, 20);
        assert_eq!(req.query.filter.class.as_deref(), Some("Class 11"));
        assert_eq!(req.query.filter.subject, None);
        assert_eq!(req.query.filter.status, Some(ChapterStatus::InProgress));
        assert_eq!(req.query.filter.is_weak_chapter, Some(true));
        assert_eq!(req.query.sort_by, SortField::QuestionSolved);
        assert_eq!(req.query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_every_invalid_param_is_reported() {
        let errors = ListRequest::from_params(&params(&[
            ("page", "0"),
            ("limit", "101"),
            ("status", "Done"),
            ("weakChapters", "maybe"),
            ("sortBy", "password"),
            ("sortOrder", "up"),
        ]))
        .unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            ["page", "limit", "status", "weakChapters", "sortBy", "sortOrder"]
        );
    }

    #[test]
    fn test_non_numeric_page() {
        let errors = ListRequest::from_params(&params(&[("page", "two")])).unwrap_err();
        assert_eq!(errors[0].field, "page");
        assert_eq!(errors[0].value, Some(Value::from("two")));
    }
}
