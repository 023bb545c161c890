//! Post-processing of query results for the results grid.
//!
//! Everything here is a pure function of its inputs: the same
//! [`ResultView`] applied to the same [`QueryResult`] always produces the
//! same [`Page`], and the input is never modified.
//!
//! Steps run in a fixed order:
//!
//! ```text
//! filter (+ filter groups) -> sort -> group -> paginate
//! ```

mod compare;
mod filter;
mod group;

pub use compare::compare as compare_cells;
pub use filter::{FilterGroup, FilterLogic, FilterOperator, ResultFilter};
pub use group::{GroupFunction, GroupSpec};

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ResultSettings;
use crate::query::QueryResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("{0} needs a value column")]
    MissingValueColumn(&'static str),

    #[error("page size must be at least 1")]
    InvalidPageSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    /// First page at the configured default size.
    pub fn first(settings: &ResultSettings) -> Self {
        Self::new(1, settings.default_page_size)
    }
}

/// Everything the grid can ask for at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultView {
    pub filter: Option<ResultFilter>,
    pub filter_groups: Vec<FilterGroup>,
    pub sort: Option<SortSpec>,
    pub group: Option<GroupSpec>,
    pub page: Option<PageRequest>,
}

impl ResultView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: ResultFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn filter_group(mut self, group: FilterGroup) -> Self {
        self.filter_groups.push(group);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn group(mut self, group: GroupSpec) -> Self {
        self.group = Some(group);
        self
    }

    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(PageRequest::new(page, page_size));
        self
    }

    /// Page with the configured default size when no page was requested.
    pub fn or_default_page(mut self, settings: &ResultSettings) -> Self {
        if self.page.is_none() {
            self.page = Some(PageRequest::first(settings));
        }
        self
    }

    /// Apply this view to `result`.
    pub fn apply(&self, result: &QueryResult) -> Result<Page, ResultError> {
        let mut rows = filter::retain_rows(result, self.filter.as_ref(), &self.filter_groups)?;

        if let Some(sort) = &self.sort {
            let index = result
                .column_index(&sort.column)
                .ok_or_else(|| ResultError::UnknownColumn(sort.column.clone()))?;
            // Stable, so equal keys keep their incoming order. Nulls stay
            // last in both directions.
            rows.sort_by(|a, b| {
                let (x, y) = (compare::cell(a, index), compare::cell(b, index));
                match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => match sort.order {
                        SortOrder::Asc => compare::compare(x, y),
                        SortOrder::Desc => compare::compare(x, y).reverse(),
                    },
                }
            });
        }

        let shaped = match &self.group {
            Some(spec) => group::group_rows(result, &rows, spec)?,
            None => QueryResult {
                columns: result.columns.clone(),
                rows,
                errors: result.errors.clone(),
                rows_affected: result.rows_affected,
            },
        };

        paginate(shaped, self.page)
    }
}

/// One page of processed results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub result: QueryResult,
    pub total_rows: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Cut one page out of `result`.
///
/// Without a request everything is one page. Pages past the end are empty
/// but still report the totals.
pub fn paginate(mut result: QueryResult, request: Option<PageRequest>) -> Result<Page, ResultError> {
    let total_rows = result.rows.len();
    let Some(request) = request else {
        return Ok(Page {
            result,
            total_rows,
            total_pages: 1,
            page: 1,
            page_size: total_rows,
        });
    };
    if request.page_size == 0 {
        return Err(ResultError::InvalidPageSize);
    }

    let page = request.page.max(1);
    let total_pages = total_rows.div_ceil(request.page_size).max(1);
    let start = (page - 1).saturating_mul(request.page_size).min(total_rows);
    let end = start.saturating_add(request.page_size).min(total_rows);
    result.rows = result.rows.drain(start..end).collect();

    Ok(Page {
        result,
        total_rows,
        total_pages,
        page,
        page_size: request.page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result() -> QueryResult {
        QueryResult::new(
            vec!["name".into(), "score".into()],
            (1..=7)
                .map(|i| vec![json!(format!("p{}", i)), json!(i * 10)])
                .collect(),
        )
    }

    #[test]
    fn test_paginate() {
        let page = paginate(result(), Some(PageRequest::new(3, 3))).unwrap();
        assert_eq!(page.total_rows, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.result.rows, vec![vec![json!("p7"), json!(70)]]);

        let past_end = paginate(result(), Some(PageRequest::new(9, 3))).unwrap();
        assert!(past_end.result.rows.is_empty());
        assert_eq!(past_end.total_pages, 3);

        assert_eq!(
            paginate(result(), Some(PageRequest::new(1, 0))),
            Err(ResultError::InvalidPageSize)
        );
    }

    #[test]
    fn test_sort_desc_then_page() {
        let view = ResultView::new().sort(SortSpec::desc("score")).page(1, 2);
        let page = view.apply(&result()).unwrap();
        assert_eq!(
            page.result.rows,
            vec![vec![json!("p7"), json!(70)], vec![json!("p6"), json!(60)]]
        );
    }

    #[test]
    fn test_apply_is_idempotent_and_pure() {
        let input = result();
        let view = ResultView::new()
            .filter(ResultFilter::new("score", FilterOperator::GreaterOrEqual, 30))
            .sort(SortSpec::asc("name"))
            .page(2, 2);
        let first = view.apply(&input).unwrap();
        let second = view.apply(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(input, result());
        assert_eq!(first.total_rows, 5);
    }

    #[test]
    fn test_default_page_size_from_settings() {
        let settings = ResultSettings {
            default_page_size: 4,
        };
        let page = ResultView::new()
            .or_default_page(&settings)
            .apply(&result())
            .unwrap();
        assert_eq!(page.page_size, 4);
        assert_eq!(page.total_pages, 2);

        let explicit = ResultView::new().page(2, 5).or_default_page(&settings);
        assert_eq!(explicit.page, Some(PageRequest::new(2, 5)));
    }

    #[test]
    fn test_unknown_sort_column() {
        let view = ResultView::new().sort(SortSpec::asc("nope"));
        assert_eq!(
            view.apply(&result()),
            Err(ResultError::UnknownColumn("nope".into()))
        );
    }
}
