//! Calculation error types.

use thiserror::Error;

/// Result type for calculation operations.
pub type CalcResult<T> = Result<T, CalcError>;

/// Errors raised while parsing or evaluating an expression.
///
/// A calculation has no meaningful partial result, so the first error ends
/// evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    /// The expression text is malformed.
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A function was called with too few or too many arguments.
    #[error("{function} expects {expected} argument{}, got {found}", if expected.ends_with(" 1") { "" } else { "s" })]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    /// The function name is not in the catalog.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// An argument had the wrong type.
    #[error("{function}: expected {expected}, got {found}")]
    Type {
        function: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A runtime failure such as an unparseable date.
    #[error("{function}: {message}")]
    Evaluation { function: String, message: String },

    /// Fetching submissions for an aggregate failed.
    #[error("{function} over form '{form_id}' failed: {message}")]
    Aggregate {
        function: String,
        form_id: String,
        message: String,
    },
}

impl CalcError {
    pub fn arity(function: &str, min: usize, max: Option<usize>, found: usize) -> Self {
        let expected = match max {
            Some(0) => "no".to_string(),
            Some(max) if max == min => format!("exactly {}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        CalcError::Arity {
            function: function.to_string(),
            expected,
            found,
        }
    }

    pub fn type_error(function: &str, expected: &'static str, found: &'static str) -> Self {
        CalcError::Type {
            function: function.to_string(),
            expected,
            found,
        }
    }

    pub fn evaluation(function: &str, message: impl Into<String>) -> Self {
        CalcError::Evaluation {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// Short kind tag, as reported to the editor.
    pub fn kind(&self) -> &'static str {
        match self {
            CalcError::Syntax { .. } => "syntax_error",
            CalcError::Arity { .. } => "arity_error",
            CalcError::UnknownFunction(_) => "unknown_function",
            CalcError::Type { .. } => "type_error",
            CalcError::Evaluation { .. } => "evaluation_error",
            CalcError::Aggregate { .. } => "aggregate_error",
        }
    }
}
