//! Ordering and loose equality for result cells.

use std::cmp::Ordering;

use serde_json::Value;

static NULL: Value = Value::Null;

/// Cell `index` of `row`; Null when the row is short.
pub(crate) fn cell(row: &[Value], index: usize) -> &Value {
    row.get(index).unwrap_or(&NULL)
}

/// Numeric view of a cell: JSON numbers and numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        _ => None,
    }
}

/// Text view of a cell; Null is empty.
pub fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 3,
        Value::Bool(_) => 1,
        Value::Number(_) => 0,
        Value::String(_) => 2,
        Value::Array(_) | Value::Object(_) => 2,
    }
}

/// Total order used for sorting.
///
/// Values that both read as numbers compare numerically. Otherwise numbers
/// come before booleans, then text (case-insensitive), with nulls last.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => {
            let rank = type_rank(a).cmp(&type_rank(b));
            if rank != Ordering::Equal || a.is_null() {
                return rank;
            }
            let (x, y) = (as_text(a), as_text(b));
            x.to_lowercase()
                .cmp(&y.to_lowercase())
                .then_with(|| x.cmp(&y))
        }
    }
}

/// Loose equality: numbers numerically, text exactly.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => as_text(a) == as_text(b),
        },
    }
}
