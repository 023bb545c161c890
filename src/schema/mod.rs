//! Form schema metadata and caching.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SchemaCacheManager                           │
//! │  - get_cache()      lazy first load, returns Arc<SchemaCache>   │
//! │  - refresh_cache()  atomic replace from the provider            │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SchemaProvider                             │
//! │  get_form_definition() / list_forms() / refresh()               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod cache;
mod provider;
mod types;

pub use cache::{SchemaCache, SchemaCacheManager};
pub use provider::{InMemorySchemaProvider, SchemaError, SchemaProvider, SchemaResult};
pub use types::{
    default_system_columns, FieldDefinition, FieldType, FormDefinition, SystemColumnDefinition,
};
