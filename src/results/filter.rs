//! Row filters for the results grid.
//!
//! These are deliberately simpler than the DSL WHERE clause: one column, one
//! operator, one value per condition.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::compare::{as_text, cell, compare, is_empty, loosely_equal};
use super::ResultError;
use crate::query::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    /// Whether the operator ignores its value.
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperator::IsEmpty | FilterOperator::IsNotEmpty)
    }

    fn test(&self, cell: &serde_json::Value, value: &serde_json::Value) -> bool {
        let contains = || {
            as_text(cell)
                .to_lowercase()
                .contains(&as_text(value).to_lowercase())
        };
        match self {
            FilterOperator::Equals => loosely_equal(cell, value),
            FilterOperator::NotEquals => !loosely_equal(cell, value),
            FilterOperator::Contains => contains(),
            FilterOperator::NotContains => !contains(),
            FilterOperator::StartsWith => as_text(cell)
                .to_lowercase()
                .starts_with(&as_text(value).to_lowercase()),
            FilterOperator::EndsWith => as_text(cell)
                .to_lowercase()
                .ends_with(&as_text(value).to_lowercase()),
            FilterOperator::GreaterThan => ordered(cell, value, |o| o == Ordering::Greater),
            FilterOperator::GreaterOrEqual => ordered(cell, value, |o| o != Ordering::Less),
            FilterOperator::LessThan => ordered(cell, value, |o| o == Ordering::Less),
            FilterOperator::LessOrEqual => ordered(cell, value, |o| o != Ordering::Greater),
            FilterOperator::IsEmpty => is_empty(cell),
            FilterOperator::IsNotEmpty => !is_empty(cell),
        }
    }
}

/// Range comparisons never match a null on either side.
fn ordered(
    cell: &serde_json::Value,
    value: &serde_json::Value,
    accept: impl FnOnce(Ordering) -> bool,
) -> bool {
    !cell.is_null() && !value.is_null() && accept(compare(cell, value))
}

/// One condition: `column <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFilter {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ResultFilter {
    pub fn new(
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    fn bind(&self, result: &QueryResult) -> Result<BoundFilter<'_>, ResultError> {
        let index = result
            .column_index(&self.column)
            .ok_or_else(|| ResultError::UnknownColumn(self.column.clone()))?;
        Ok(BoundFilter {
            index,
            filter: self,
        })
    }
}

struct BoundFilter<'a> {
    index: usize,
    filter: &'a ResultFilter,
}

impl BoundFilter<'_> {
    fn matches(&self, row: &[serde_json::Value]) -> bool {
        self.filter
            .operator
            .test(cell(row, self.index), &self.filter.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

/// A set of conditions joined by one logic operator.
///
/// An empty group matches every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: String,
    pub conditions: Vec<ResultFilter>,
    #[serde(default)]
    pub logic: FilterLogic,
}

impl FilterGroup {
    pub fn new(id: impl Into<String>, logic: FilterLogic) -> Self {
        Self {
            id: id.into(),
            conditions: Vec::new(),
            logic,
        }
    }

    pub fn with(mut self, condition: ResultFilter) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Keep the rows matching the single filter and every group.
pub(crate) fn retain_rows(
    result: &QueryResult,
    filter: Option<&ResultFilter>,
    groups: &[FilterGroup],
) -> Result<Vec<Vec<serde_json::Value>>, ResultError> {
    let single = filter.map(|f| f.bind(result)).transpose()?;
    let bound_groups = groups
        .iter()
        .map(|g| {
            g.conditions
                .iter()
                .map(|c| c.bind(result))
                .collect::<Result<Vec<_>, _>>()
                .map(|conds| (g.logic, conds))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(result
        .rows
        .iter()
        .filter(|row| single.as_ref().map_or(true, |f| f.matches(row)))
        .filter(|row| {
            bound_groups.iter().all(|(logic, conds)| {
                conds.is_empty()
                    || match logic {
                        FilterLogic::And => conds.iter().all(|c| c.matches(row)),
                        FilterLogic::Or => conds.iter().any(|c| c.matches(row)),
                    }
            })
        })
        .cloned()
        .collect())
}
