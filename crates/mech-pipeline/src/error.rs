use crate::config::PipelineOptions;
use mech_core::diagnostics::{render_plain, Diagnostic, DiagnosticDisplayOptions, DiagnosticLevel};
use thiserror::Error;

/// Diagnostics of one unit. `items` holds what the running stage produced;
/// `emit_stage` logs them and moves them to `reported`.
#[derive(Debug, Default, Clone)]
pub struct PipelineDiagnostics {
    pub items: Vec<Diagnostic>,
    pub reported: Vec<Diagnostic>,
    suppressed: usize,
}

impl PipelineDiagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        self.items.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|diagnostic| diagnostic.is_error()).count()
    }

    pub fn has_warnings(&self) -> bool {
        self.items
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Warning)
    }

    /// Errors dropped because of `max_errors`.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn emit_stage(&mut self, stage: &'static str, options: &PipelineOptions) {
        if self.items.is_empty() {
            return;
        }
        let max_errors = options.error_tolerance.max_errors;
        let mut errors = 0;
        let mut kept = Vec::with_capacity(self.items.len());
        for mut diagnostic in self.items.drain(..) {
            if diagnostic.is_error() {
                errors += 1;
                if max_errors > 0 && errors > max_errors {
                    self.suppressed += 1;
                    continue;
                }
            }
            if diagnostic.source_context.is_none() {
                diagnostic.source_context = Some(stage.to_string());
            }
            kept.push(diagnostic);
        }

        let opts = DiagnosticDisplayOptions::new(options.debug.verbose);
        for diagnostic in &kept {
            for line in render_plain(std::slice::from_ref(diagnostic), Some(stage), &opts) {
                match diagnostic.level {
                    DiagnosticLevel::Error => tracing::error!("{line}"),
                    DiagnosticLevel::Warning => tracing::warn!("{line}"),
                    DiagnosticLevel::Info => tracing::info!("{line}"),
                }
            }
        }
        if errors > kept.iter().filter(|diagnostic| diagnostic.is_error()).count() {
            tracing::warn!("[{stage}] {} further error(s) suppressed", errors - max_errors);
        }
        self.reported.extend(kept);
    }

    /// Everything reported so far, then anything still pending.
    pub fn all(&self) -> Vec<Diagnostic> {
        self.reported.iter().chain(&self.items).cloned().collect()
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stage reported user errors; they are in the diagnostics.
    #[error("[{stage}] stopped with {count} error(s)")]
    Diagnostics { stage: &'static str, count: usize },

    #[error("[{stage}] {source}")]
    Failed {
        stage: &'static str,
        source: mech_core::Error,
    },
}

impl PipelineError {
    pub fn new(stage: &'static str, source: mech_core::Error) -> Self {
        PipelineError::Failed { stage, source }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Diagnostics { stage, .. } | PipelineError::Failed { stage, .. } => *stage,
        }
    }

    /// The same error attributed to `stage`.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            PipelineError::Diagnostics { count, .. } => PipelineError::Diagnostics { stage, count },
            PipelineError::Failed { source, .. } => PipelineError::Failed { stage, source },
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, PipelineError::Failed { source, .. } if source.is_internal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_core::span::Span;
    use pretty_assertions::assert_eq;

    #[test]
    fn emitting_tags_and_caps_errors() {
        let mut options = PipelineOptions::default();
        options.error_tolerance.max_errors = 2;
        let mut diagnostics = PipelineDiagnostics::default();
        for name in ["a", "b", "c"] {
            diagnostics.push(Diagnostic::unresolved(name, Span::synthetic()));
        }
        diagnostics.push(Diagnostic::warning("unused"));
        assert_eq!(diagnostics.error_count(), 3);

        diagnostics.emit_stage("analyze", &options);
        assert!(diagnostics.items.is_empty());
        assert_eq!(diagnostics.suppressed(), 1);
        let contexts: Vec<_> = diagnostics
            .reported
            .iter()
            .map(|diagnostic| diagnostic.source_context.as_deref())
            .collect();
        assert_eq!(contexts, vec![Some("analyze"); 3]);
    }

    #[test]
    fn errors_can_be_reattributed() {
        let err = PipelineError::Diagnostics { stage: "parse", count: 1 };
        assert_eq!(err.in_stage("check").stage(), "check");
        assert!(!PipelineError::new("generate", mech_core::Error::Generic("x".into())).is_internal());
    }
}
