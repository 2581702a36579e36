use crate::pass::PassName;
use mech_core::ast::{Ast, NodeId};
use mech_core::diagnostics::Diagnostic;
use mech_core::span::Span;
use mech_core::Error;

/// Internal invariant violation located at `id`.
pub fn node_error(pass: PassName, ast: &Ast, id: NodeId, message: impl Into<String>) -> Error {
    Error::internal(
        pass.as_str(),
        ast.node_type(id).as_str(),
        ast.span(id),
        message,
    )
}

/// User-facing semantic problem found by `pass`.
pub fn semantic_diagnostic(pass: PassName, message: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::semantic(message, span).with_source_context(pass.as_str())
}

/// Construct this backend cannot generate, reported by `pass`.
pub fn unsupported_diagnostic(pass: PassName, message: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::unsupported(message, span).with_source_context(pass.as_str())
}

/// Return early with an internal invariant violation located at a node
#[macro_export]
macro_rules! opt_bail {
    ($pass:expr, $ast:expr, $id:expr, $($arg:tt)*) => {
        return Err($crate::error::node_error($pass, $ast, $id, format!($($arg)*)))
    };
}

/// Ensure a tree-shape condition holds at a node, or return an internal invariant violation
#[macro_export]
macro_rules! opt_ensure {
    ($cond:expr, $pass:expr, $ast:expr, $id:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::opt_bail!($pass, $ast, $id, $($arg)*);
        }
    };
}
