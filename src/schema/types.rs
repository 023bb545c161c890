//! Form and field metadata types.
//!
//! These mirror what the form-definition store hands back. A `FormDefinition`
//! is an immutable snapshot: the cache replaces it wholesale on refresh.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Semantic type of a field or system column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Datetime,
    Date,
    Boolean,
    Select,
    MultiSelect,
    Email,
    File,
    #[serde(other)]
    Unknown,
}

impl FieldType {
    /// Whether values of this type can take part in numeric aggregates.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Datetime => "datetime",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multi_select",
            FieldType::Email => "email",
            FieldType::File => "file",
            FieldType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined field.
///
/// `id` is stable across renames. `label` is free text and may collide with
/// other labels in the same form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Vec<String>,
    /// Position in the form; used to break label ties.
    #[serde(default)]
    pub order: u32,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            options: Vec::new(),
            order: 0,
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// A built-in column every submission carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemColumnDefinition {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl SystemColumnDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
        }
    }
}

/// System columns attached to forms whose definition does not list its own.
///
/// Ids carry a leading underscore so a bare label such as `status` never
/// matches a system column id before the user field labelled `Status`.
pub fn default_system_columns() -> BTreeMap<String, SystemColumnDefinition> {
    [
        SystemColumnDefinition::new("_id", "Submission ID", FieldType::Text),
        SystemColumnDefinition::new("_created_at", "Submitted At", FieldType::Datetime),
        SystemColumnDefinition::new("_updated_at", "Updated At", FieldType::Datetime),
        SystemColumnDefinition::new("_status", "Status", FieldType::Select),
        SystemColumnDefinition::new("_submitted_by", "Submitted By", FieldType::Text),
    ]
    .into_iter()
    .map(|c| (c.id.clone(), c))
    .collect()
}

/// A form schema: its fields and system columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(default, rename = "system_columns")]
    pub system_columns: BTreeMap<String, SystemColumnDefinition>,
}

impl FormDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: BTreeMap::new(),
            system_columns: BTreeMap::new(),
        }
    }

    /// Add a field. A field with no explicit order is appended after the
    /// current last field.
    pub fn with_field(mut self, mut field: FieldDefinition) -> Self {
        if field.order == 0 {
            field.order = self.fields.values().map(|f| f.order).max().map_or(0, |m| m + 1);
        }
        self.fields.insert(field.id.clone(), field);
        self
    }

    pub fn with_system_column(mut self, column: SystemColumnDefinition) -> Self {
        self.system_columns.insert(column.id.clone(), column);
        self
    }

    /// Fill in the default system columns when none were supplied.
    pub fn with_default_system_columns(mut self) -> Self {
        if self.system_columns.is_empty() {
            self.system_columns = default_system_columns();
        }
        self
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.get(id)
    }

    pub fn system_column(&self, id: &str) -> Option<&SystemColumnDefinition> {
        self.system_columns.get(id)
    }

    /// Whether `id` names a field or a system column of this form.
    pub fn has_column(&self, id: &str) -> bool {
        self.fields.contains_key(id) || self.system_columns.contains_key(id)
    }

    /// Fields sorted by form order, ties broken by id.
    pub fn fields_in_order(&self) -> Vec<&FieldDefinition> {
        let mut fields: Vec<_> = self.fields.values().collect();
        fields.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        fields
    }
}
