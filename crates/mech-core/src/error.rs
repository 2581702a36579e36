use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::span::Span;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error at {span}: {message}")]
    Syntax { message: String, span: Span },

    #[error("unresolved symbol `{name}` at {span}")]
    UnresolvedSymbol { name: String, span: Span },

    #[error("semantic error at {span}: {message}")]
    Semantic { message: String, span: Span },

    #[error("internal invariant violated in `{pass}` at {span} ({node_kind}): {message}")]
    InternalInvariantViolation {
        pass: String,
        node_kind: String,
        span: Span,
        message: String,
    },

    #[error("unsupported construct {construct} at {span}: {message}")]
    UnsupportedConstruct {
        construct: String,
        span: Span,
        message: String,
    },

    #[error("{} error(s) reported", .0.iter().filter(|d| d.is_error()).count())]
    Diagnostics(Vec<Diagnostic>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn internal(
        pass: impl Into<String>,
        node_kind: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Error::InternalInvariantViolation {
            pass: pass.into(),
            node_kind: node_kind.into(),
            span,
            message: message.into(),
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Error::UnsupportedConstruct {
            construct: construct.into(),
            span,
            message: message.into(),
        }
    }

    /// Internal violations abort the unit; everything else is a user-facing problem.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::InternalInvariantViolation { .. })
    }

    /// Diagnostics describing this error, for uniform reporting.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Error::Syntax { message, span } => vec![Diagnostic::syntax(message.clone(), *span)],
            Error::UnresolvedSymbol { name, span } => vec![Diagnostic::unresolved(name, *span)],
            Error::Semantic { message, span } => vec![Diagnostic::semantic(message.clone(), *span)],
            Error::InternalInvariantViolation { pass, span, .. } => vec![Diagnostic::error(
                DiagnosticKind::Internal,
                self.to_string(),
            )
            .with_span(*span)
            .with_source_context(pass.clone())],
            Error::UnsupportedConstruct { span, .. } => {
                vec![Diagnostic::unsupported(self.to_string(), *span)]
            }
            Error::Diagnostics(diagnostics) => diagnostics.clone(),
            other => vec![Diagnostic::error(DiagnosticKind::Note, other.to_string())],
        }
    }
}

impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_violation_carries_full_context() {
        let err = Error::internal("codegen", "Name", Span::new(0, 1, 2, 4, 9), "no symbol for `q`");
        assert!(err.is_internal());
        let text = err.to_string();
        assert!(text.contains("codegen"));
        assert!(text.contains("Name"));
        assert!(text.contains("4:9"));
    }

    #[test]
    fn diagnostics_error_counts_only_errors() {
        let err = Error::Diagnostics(vec![
            Diagnostic::warning("meh"),
            Diagnostic::semantic("bad", Span::synthetic()),
        ]);
        assert_eq!(err.to_string(), "1 error(s) reported");
    }
}
