//! Field reference resolution.
//!
//! Maps what a user typed in a column position to a canonical field id of
//! one form. Three surface forms are accepted and all land on the same id:
//!
//! 1. `FIELD("id")`: the id must exist among the form's fields or system
//!    columns
//! 2. a bare or quoted id, matched verbatim
//! 3. a label, matched case-insensitively
//!
//! Labels are not unique. When several user fields share a label the one
//! that comes first in form order wins and the other candidates are
//! reported back so the caller can warn. System column labels are only
//! consulted when no user field carries the label.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::ast::ColumnRef;
use crate::schema::{FieldType, FormDefinition};

/// `FIELD("id")` or `FIELD('id')`, case-insensitive keyword.
static FIELD_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*FIELD\s*\(\s*(?:"([^"]*)"|'([^']*)')\s*\)\s*$"#)
        .expect("valid FIELD wrapper regex")
});

/// A column reference resolved to a canonical id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub id: String,
    pub field_type: FieldType,
    /// True for built-in columns such as `created_at`.
    pub system: bool,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub field: ResolvedField,
    /// Ids of other fields with the same label, in form order.
    pub also_matched: Vec<String>,
}

impl Resolution {
    pub fn is_ambiguous(&self) -> bool {
        !self.also_matched.is_empty()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("FIELD(\"{id}\") does not exist in form '{form}'")]
    UnknownId { id: String, form: String },

    #[error("unknown field '{name}' in form '{form}'")]
    UnknownName { name: String, form: String },
}

impl ResolveError {
    /// The token the user wrote.
    pub fn token(&self) -> &str {
        match self {
            ResolveError::UnknownId { id, .. } => id,
            ResolveError::UnknownName { name, .. } => name,
        }
    }
}

/// Resolves column references against one form.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    form: &'a FormDefinition,
}

impl<'a> FieldResolver<'a> {
    pub fn new(form: &'a FormDefinition) -> Self {
        Self { form }
    }

    pub fn form(&self) -> &'a FormDefinition {
        self.form
    }

    pub fn resolve(&self, column: &ColumnRef) -> Result<Resolution, ResolveError> {
        match column {
            ColumnRef::Field(id) => self.by_id(id).ok_or_else(|| ResolveError::UnknownId {
                id: id.clone(),
                form: self.form.id.clone(),
            }),
            ColumnRef::Bare(text) | ColumnRef::Quoted(text) => self
                .by_id(text)
                .or_else(|| self.by_label(text))
                .ok_or_else(|| ResolveError::UnknownName {
                    name: text.clone(),
                    form: self.form.id.clone(),
                }),
        }
    }

    /// Resolve a raw reference string such as `FIELD("f2")` or `Status`.
    pub fn resolve_token(&self, token: &str) -> Result<Resolution, ResolveError> {
        self.resolve(&parse_reference(token))
    }

    fn by_id(&self, id: &str) -> Option<Resolution> {
        if let Some(field) = self.form.field(id) {
            return Some(unambiguous(ResolvedField {
                id: field.id.clone(),
                field_type: field.field_type,
                system: false,
            }));
        }
        self.form.system_column(id).map(|col| {
            unambiguous(ResolvedField {
                id: col.id.clone(),
                field_type: col.field_type,
                system: true,
            })
        })
    }

    fn by_label(&self, label: &str) -> Option<Resolution> {
        let wanted = label.to_lowercase();

        let mut matches = self
            .form
            .fields_in_order()
            .into_iter()
            .filter(|f| f.label.to_lowercase() == wanted);
        if let Some(first) = matches.next() {
            return Some(Resolution {
                field: ResolvedField {
                    id: first.id.clone(),
                    field_type: first.field_type,
                    system: false,
                },
                also_matched: matches.map(|f| f.id.clone()).collect(),
            });
        }

        let mut system = self
            .form
            .system_columns
            .values()
            .filter(|c| c.label.to_lowercase() == wanted);
        system.next().map(|first| Resolution {
            field: ResolvedField {
                id: first.id.clone(),
                field_type: first.field_type,
                system: true,
            },
            also_matched: system.map(|c| c.id.clone()).collect(),
        })
    }
}

fn unambiguous(field: ResolvedField) -> Resolution {
    Resolution {
        field,
        also_matched: Vec::new(),
    }
}

/// Classify a raw reference string.
///
/// `FIELD("x")` becomes an id reference, a double-quoted string a quoted
/// reference, anything else a bare one.
pub fn parse_reference(token: &str) -> ColumnRef {
    if let Some(caps) = FIELD_WRAPPER.captures(token) {
        let id = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        return ColumnRef::Field(id.to_string());
    }
    let trimmed = token.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => ColumnRef::Quoted(inner.replace("\"\"", "\"")),
        None => ColumnRef::Bare(trimmed.to_string()),
    }
}
