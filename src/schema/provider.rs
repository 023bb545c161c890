//! SchemaProvider trait definition.
//!
//! The SchemaProvider trait abstracts over the external form-definition store.
//! The core only ever reads through it; it never mutates definitions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::FormDefinition;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while loading form metadata.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The store could not be reached or rejected the read.
    #[error("schema store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with data that does not describe a form.
    #[error("malformed form definition for '{form_id}': {message}")]
    Malformed { form_id: String, message: String },

    /// A single-form lookup found nothing.
    #[error("form not found: {0}")]
    FormNotFound(String),
}

/// Read access to form/field metadata for one organization.
///
/// # Example
///
/// ```ignore
/// use formql::schema::SchemaProvider;
///
/// async fn example(provider: &impl SchemaProvider) -> SchemaResult<()> {
///     let forms = provider.list_forms().await?;
///     let intake = provider.get_form_definition("intake").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Fetch one form, or `None` when it does not exist.
    async fn get_form_definition(&self, form_id: &str) -> SchemaResult<Option<FormDefinition>>;

    /// List every form visible to the caller.
    async fn list_forms(&self) -> SchemaResult<Vec<FormDefinition>>;

    /// Ask the store to drop any server-side caching before the next read.
    ///
    /// Stores without their own caching keep the default no-op.
    async fn refresh(&self) -> SchemaResult<()> {
        Ok(())
    }

    /// Fetch one form, failing when it does not exist.
    async fn require_form(&self, form_id: &str) -> SchemaResult<FormDefinition> {
        self.get_form_definition(form_id)
            .await?
            .ok_or_else(|| SchemaError::FormNotFound(form_id.to_string()))
    }
}

/// A schema provider backed by an in-process map.
///
/// Used by the CLI (forms loaded from a JSON file) and by tests.
#[derive(Debug, Default)]
pub struct InMemorySchemaProvider {
    forms: RwLock<BTreeMap<String, FormDefinition>>,
}

impl InMemorySchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_forms(forms: impl IntoIterator<Item = FormDefinition>) -> Self {
        Self {
            forms: RwLock::new(forms.into_iter().map(|f| (f.id.clone(), f)).collect()),
        }
    }

    /// Parse a JSON array of form definitions.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let forms: Vec<FormDefinition> = serde_json::from_str(json).map_err(|e| {
            SchemaError::Malformed {
                form_id: "<file>".to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self::from_forms(forms))
    }

    /// Insert or replace a form.
    pub async fn upsert_form(&self, form: FormDefinition) {
        self.forms.write().await.insert(form.id.clone(), form);
    }

    pub async fn remove_form(&self, form_id: &str) -> bool {
        self.forms.write().await.remove(form_id).is_some()
    }
}

#[async_trait]
impl SchemaProvider for InMemorySchemaProvider {
    async fn get_form_definition(&self, form_id: &str) -> SchemaResult<Option<FormDefinition>> {
        Ok(self.forms.read().await.get(form_id).cloned())
    }

    async fn list_forms(&self) -> SchemaResult<Vec<FormDefinition>> {
        Ok(self.forms.read().await.values().cloned().collect())
    }
}
