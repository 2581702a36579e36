use crate::span::Span;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Error taxonomy shared by every phase of a compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DiagnosticKind {
    Syntax,
    UnresolvedSymbol,
    Semantic,
    Unsupported,
    Internal,
    Note,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::UnresolvedSymbol => "unresolved-symbol",
            DiagnosticKind::Semantic => "semantic",
            DiagnosticKind::Unsupported => "unsupported",
            DiagnosticKind::Internal => "internal",
            DiagnosticKind::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<Span>,
    pub suggestions: Vec<String>,
    pub source_context: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            kind,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            source_context: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            kind: DiagnosticKind::Note,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            source_context: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            kind: DiagnosticKind::Note,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            source_context: None,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::error(DiagnosticKind::Syntax, message).with_span(span)
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::error(DiagnosticKind::Semantic, message).with_span(span)
    }

    pub fn unresolved(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticKind::UnresolvedSymbol,
            format!("unresolved symbol `{name}`"),
        )
        .with_span(span)
    }

    pub fn unsupported(message: impl Into<String>, span: Span) -> Self {
        Self::error(DiagnosticKind::Unsupported, message).with_span(span)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "{}: ", span)?;
        }
        write!(f, "{} [{}]", self.message, self.kind.as_str())?;

        if !self.suggestions.is_empty() {
            let hints = self.suggestions.join("; ");
            write!(f, " (hints: {})", hints)?;
        }

        Ok(())
    }
}

/// A value together with the diagnostics produced while computing it.
/// `value` is `None` whenever an error-level diagnostic was produced.
#[derive(Debug, Clone)]
pub struct DiagnosticReport<T> {
    pub value: Option<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> DiagnosticReport<T> {
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            diagnostics: Vec::new(),
        }
    }

    pub fn success_with_diagnostics(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: Some(value),
            diagnostics,
        }
    }

    pub fn failure(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: None,
            diagnostics,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn into_result(self) -> Result<(T, Vec<Diagnostic>), Vec<Diagnostic>> {
        match self.value {
            Some(value) => Ok((value, self.diagnostics)),
            None => Err(self.diagnostics),
        }
    }
}

/// Diagnostics collected for one compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticManager {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn add_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn get_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn count_kind(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

/// Options for rendering diagnostics as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticDisplayOptions {
    pub verbose_info: bool,
}

impl DiagnosticDisplayOptions {
    pub fn new(verbose_info: bool) -> Self {
        Self { verbose_info }
    }
}

/// Render diagnostics one per line, prefixed with `context` (stage or file name).
pub fn render_plain(
    diagnostics: &[Diagnostic],
    fallback_context: Option<&str>,
    options: &DiagnosticDisplayOptions,
) -> Vec<String> {
    let mut lines = Vec::new();
    for diagnostic in diagnostics {
        if diagnostic.level == DiagnosticLevel::Info && !options.verbose_info {
            continue;
        }
        let context = diagnostic
            .source_context
            .as_deref()
            .or(fallback_context)
            .unwrap_or("pipeline");
        let level = match diagnostic.level {
            DiagnosticLevel::Error => "ERROR",
            DiagnosticLevel::Warning => "WARNING",
            DiagnosticLevel::Info => "INFO",
        };
        let location = diagnostic
            .span
            .map(|span| format!(" at {span}"))
            .unwrap_or_default();
        lines.push(format!(
            "[{}] {}({}){}: {}",
            context,
            level,
            diagnostic.kind.as_str(),
            location,
            diagnostic.message
        ));
        for suggestion in &diagnostic.suggestions {
            lines.push(format!("   suggestion: {}", suggestion));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_without_value_is_failure() {
        let report: DiagnosticReport<()> =
            DiagnosticReport::failure(vec![Diagnostic::syntax("boom", Span::synthetic())]);
        assert!(report.has_errors());
        assert!(report.into_result().is_err());
    }

    #[test]
    fn plain_rendering_includes_kind_and_location() {
        let diag = Diagnostic::unresolved("y", Span::new(0, 5, 6, 3, 7)).with_source_context("symtab");
        let lines = render_plain(&[diag], None, &DiagnosticDisplayOptions::default());
        assert_eq!(
            lines,
            vec!["[symtab] ERROR(unresolved-symbol) at 3:7: unresolved symbol `y`".to_string()]
        );
    }

    #[test]
    fn info_hidden_unless_verbose() {
        let diag = Diagnostic::info("note");
        assert!(render_plain(&[diag.clone()], None, &DiagnosticDisplayOptions::new(false)).is_empty());
        assert_eq!(render_plain(&[diag], None, &DiagnosticDisplayOptions::new(true)).len(), 1);
    }
}
