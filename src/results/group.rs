//! Group-by with one aggregate column.

use serde::{Deserialize, Serialize};

use super::compare::{as_number, as_text, compare};
use super::ResultError;
use crate::query::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl GroupFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupFunction::Count => "count",
            GroupFunction::Sum => "sum",
            GroupFunction::Avg => "avg",
            GroupFunction::Min => "min",
            GroupFunction::Max => "max",
        }
    }
}

/// Group rows by `column` and summarize each group.
///
/// COUNT counts rows and needs no value column; the other functions read
/// the numeric values of `value_column`, skipping everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub column: String,
    pub function: GroupFunction,
    #[serde(default)]
    pub value_column: Option<String>,
}

impl GroupSpec {
    pub fn count(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            function: GroupFunction::Count,
            value_column: None,
        }
    }

    pub fn aggregate(
        column: impl Into<String>,
        function: GroupFunction,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            function,
            value_column: Some(value_column.into()),
        }
    }

    /// Header of the summary column, e.g. `count` or `sum(amount)`.
    pub fn output_column(&self) -> String {
        match (&self.function, &self.value_column) {
            (GroupFunction::Count, _) | (_, None) => self.function.as_str().to_string(),
            (f, Some(col)) => format!("{}({})", f.as_str(), col),
        }
    }
}

/// Summarize `rows`; groups keep the order their key first appears in.
pub(crate) fn group_rows(
    result: &QueryResult,
    rows: &[Vec<serde_json::Value>],
    spec: &GroupSpec,
) -> Result<QueryResult, ResultError> {
    let key_index = result
        .column_index(&spec.column)
        .ok_or_else(|| ResultError::UnknownColumn(spec.column.clone()))?;
    let value_index = match (spec.function, &spec.value_column) {
        (GroupFunction::Count, _) => None,
        (_, None) => return Err(ResultError::MissingValueColumn(spec.function.as_str())),
        (_, Some(col)) => Some(
            result
                .column_index(col)
                .ok_or_else(|| ResultError::UnknownColumn(col.clone()))?,
        ),
    };

    let mut groups: Vec<(serde_json::Value, Vec<&Vec<serde_json::Value>>)> = Vec::new();
    for row in rows {
        let key = row.get(key_index).cloned().unwrap_or_default();
        let key_text = as_text(&key);
        match groups
            .iter_mut()
            .find(|(k, _)| k.is_null() == key.is_null() && as_text(k) == key_text)
        {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    let summarized = groups
        .into_iter()
        .map(|(key, members)| {
            let summary = match value_index {
                None => serde_json::Value::from(members.len()),
                Some(i) => summarize(spec.function, members.iter().filter_map(|r| r.get(i))),
            };
            vec![key, summary]
        })
        .collect();

    Ok(QueryResult::new(
        vec![spec.column.clone(), spec.output_column()],
        summarized,
    ))
}

fn summarize<'a>(
    function: GroupFunction,
    cells: impl Iterator<Item = &'a serde_json::Value>,
) -> serde_json::Value {
    let cells: Vec<&serde_json::Value> = cells.filter(|c| as_number(c).is_some()).collect();
    let numbers = || cells.iter().filter_map(|c| as_number(c));
    let number = |n: f64| {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    };
    match function {
        GroupFunction::Count => serde_json::Value::from(cells.len()),
        GroupFunction::Sum => number(numbers().sum()),
        GroupFunction::Avg if cells.is_empty() => serde_json::Value::Null,
        GroupFunction::Avg => number(numbers().sum::<f64>() / cells.len() as f64),
        GroupFunction::Min => cells
            .iter()
            .min_by(|a, b| compare(a, b))
            .map_or(serde_json::Value::Null, |c| (*c).clone()),
        GroupFunction::Max => cells
            .iter()
            .max_by(|a, b| compare(a, b))
            .map_or(serde_json::Value::Null, |c| (*c).clone()),
    }
}
