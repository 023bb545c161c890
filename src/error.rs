//! Crate-level error type.
//!
//! Each subsystem has its own error enum; `CoreError` wraps them for callers
//! that drive the whole pipeline. Query diagnostics are not errors: they come
//! back inside `ParsedQuery`.

use thiserror::Error;

use crate::calc::CalcError;
use crate::config::SettingsError;
use crate::query::execute::ExecutionError;
use crate::schema::SchemaError;

/// Result type for pipeline operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Calculation(#[from] CalcError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl CoreError {
    /// Short kind tag for the editor, matching the diagnostic kinds.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Schema(_) => "schema_error",
            CoreError::Calculation(e) => e.kind(),
            CoreError::Execution(_) => "execution_error",
            CoreError::Settings(_) => "settings_error",
        }
    }
}
