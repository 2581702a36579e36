//! Diagnostic and error reporting utilities

use crate::Result;
use mech_core::diagnostics::{Diagnostic as MechDiagnostic, DiagnosticKind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| crate::CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// A located error of one `.mod` file
#[derive(Error, Debug, Diagnostic)]
pub enum MechcError {
    #[error("{message}")]
    #[diagnostic(
        code(mechc::syntax_error),
        help("check the block structure around this point")
    )]
    SyntaxError {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("syntax error here")]
        err_span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(mechc::unresolved_symbol), help("declare the name in a variable block"))]
    UnresolvedSymbol {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not declared")]
        err_span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(mechc::semantic_error))]
    SemanticError {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{kind}")]
        err_span: SourceSpan,
        kind: &'static str,
    },
}

/// The miette error of `diagnostic`, when it is an error with a real location.
pub fn located_error(name: &str, source: &str, diagnostic: &MechDiagnostic) -> Option<MechcError> {
    if !diagnostic.is_error() {
        return None;
    }
    let span = diagnostic.span?;
    let lo = span.lo as usize;
    let hi = (span.hi as usize).max(lo);
    if hi > source.len() || span.line == 0 {
        return None;
    }
    let err_span = SourceSpan::from((lo, hi - lo));
    let src = NamedSource::new(name, source.to_string());
    let message = diagnostic.message.clone();
    Some(match diagnostic.kind {
        DiagnosticKind::Syntax => MechcError::SyntaxError {
            message,
            src,
            err_span,
        },
        DiagnosticKind::UnresolvedSymbol => MechcError::UnresolvedSymbol {
            message,
            src,
            err_span,
        },
        other => MechcError::SemanticError {
            message,
            src,
            err_span,
            kind: other.as_str(),
        },
    })
}

/// Print located errors with source snippets. Returns how many were printed.
pub fn render_source_errors(name: &str, source: &str, diagnostics: &[MechDiagnostic]) -> usize {
    let mut printed = 0;
    for error in diagnostics
        .iter()
        .filter_map(|diagnostic| located_error(name, source, diagnostic))
    {
        eprintln!("{:?}", miette::Report::new(error));
        printed += 1;
    }
    printed
}
