//! Diagnostics produced while checking a query.

use serde::Serialize;

use super::span::Span;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks execution.
    Error,
    /// Reported to the editor; the query still runs.
    Warning,
}

/// What went wrong, as shown to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Syntax,
    UnknownField,
    UnknownForm,
    /// A label matched more than one field.
    AmbiguousField,
    /// A `{{name}}` placeholder had no value and was replaced with NULL.
    UnresolvedVariable,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::UnknownField => "unknown_field",
            DiagnosticKind::UnknownForm => "unknown_form",
            DiagnosticKind::AmbiguousField => "ambiguous_field",
            DiagnosticKind::UnresolvedVariable => "unresolved_variable",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic message with source location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// The byte range in the query text.
    pub span: Span,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Errors are diagnostics with `Severity::Error`.
pub type ParseError = Diagnostic;

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::error(DiagnosticKind::Syntax, span, message)
    }

    /// Byte offset where the problem starts.
    pub fn position(&self) -> usize {
        self.span.start
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}[{}]: {} (at {:?})",
            level, self.kind, self.message, self.span
        )
    }
}

impl std::error::Error for Diagnostic {}
