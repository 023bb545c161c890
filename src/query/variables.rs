//! `{{variable}}` template placeholders.
//!
//! Placeholders are expanded once, before parsing. A placeholder outside a
//! string literal becomes a SQL literal (`'text'`, `42`, `TRUE`, `NULL`);
//! one inside a single-quoted string is spliced in as raw text with quotes
//! escaped. Placeholders with no value become `NULL` (or nothing, inside a
//! string) and are reported back as unresolved.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::span::Spanned;
use crate::sql::quote_string;

/// `{{ name }}` where name is an identifier, optionally dotted.
static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("valid variable regex")
});

pub const CURRENT_FORM_ID: &str = "current_form_id";
pub const CURRENT_SUBMISSION_ID: &str = "current_submission_id";
pub const CURRENT_USER_ID: &str = "current_user_id";

/// A value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl VariableValue {
    /// Render as a standalone SQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            VariableValue::Text(s) => quote_string(s),
            VariableValue::Number(n) => format_number(*n),
            VariableValue::Bool(true) => "TRUE".to_string(),
            VariableValue::Bool(false) => "FALSE".to_string(),
            VariableValue::Null => "NULL".to_string(),
        }
    }

    /// Render for splicing inside an existing string literal.
    pub fn to_string_contents(&self) -> String {
        match self {
            VariableValue::Text(s) => s.replace('\'', "''"),
            VariableValue::Number(n) => format_number(*n),
            VariableValue::Bool(b) => b.to_string(),
            VariableValue::Null => String::new(),
        }
    }
}

fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "NULL".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let mut buffer = ryu::Buffer::new();
        buffer.format(n).to_string()
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Text(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::Text(s)
    }
}

impl From<f64> for VariableValue {
    fn from(n: f64) -> Self {
        VariableValue::Number(n)
    }
}

impl From<i64> for VariableValue {
    fn from(n: i64) -> Self {
        VariableValue::Number(n as f64)
    }
}

impl From<bool> for VariableValue {
    fn from(b: bool) -> Self {
        VariableValue::Bool(b)
    }
}

/// Values available for substitution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableContext {
    values: BTreeMap<String, VariableValue>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form_id(self, id: impl Into<String>) -> Self {
        self.with(CURRENT_FORM_ID, id.into())
    }

    pub fn with_submission_id(self, id: impl Into<String>) -> Self {
        self.with(CURRENT_SUBMISSION_ID, id.into())
    }

    pub fn with_user_id(self, id: impl Into<String>) -> Self {
        self.with(CURRENT_USER_ID, id.into())
    }

    /// Bind `now` (RFC 3339) and `today` (YYYY-MM-DD).
    pub fn with_clock(self, now: DateTime<Utc>) -> Self {
        self.with("now", now.to_rfc3339())
            .with("today", now.format("%Y-%m-%d").to_string())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of `replace_query_variables`.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    /// Query text with every placeholder expanded.
    pub text: String,
    /// Placeholders that had no value, with their span in the input text.
    pub unresolved: Vec<Spanned<String>>,
}

impl Substitution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Distinct variable names in order of first appearance.
pub fn extract_query_variables(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in VARIABLE_PATTERN.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Expand every placeholder in `text` using `context`.
pub fn replace_query_variables(text: &str, context: &VariableContext) -> Substitution {
    let mut out = String::with_capacity(text.len());
    let mut unresolved = Vec::new();
    let mut last = 0;

    for caps in VARIABLE_PATTERN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let name = &caps[1];
        out.push_str(&text[last..whole.start()]);

        let in_string = inside_string_literal(&text[..whole.start()]);
        let value = context.get(name);
        if value.is_none() {
            unresolved.push(Spanned::new(name.to_string(), whole.range()));
        }
        let value = value.unwrap_or(&VariableValue::Null);

        if in_string {
            out.push_str(&value.to_string_contents());
        } else {
            out.push_str(&value.to_sql_literal());
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);

    Substitution {
        text: out,
        unresolved,
    }
}

/// Whether the end of `prefix` sits inside a single-quoted literal.
fn inside_string_literal(prefix: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    for c in prefix.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ => {}
        }
    }
    in_single
}
