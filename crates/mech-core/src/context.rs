//! State owned by one compilation unit while it moves through the passes.

use crate::codegen_info::{CodegenInfo, PerfReport};
use crate::diagnostics::{Diagnostic, DiagnosticManager};
use crate::error::{Error, Result};
use crate::span::Span;
use crate::symtab::SymbolTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

pub const DEFAULT_NAME_SEED: u64 = 0x6d65_6368;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 4;

/// Fresh identifiers for compiler-introduced locals. Seeded, so the same
/// unit always gets the same names.
#[derive(Debug, Clone)]
pub struct UniqueNameGenerator {
    rng: StdRng,
    used: BTreeSet<String>,
}

impl Default for UniqueNameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_SEED)
    }
}

impl UniqueNameGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            used: BTreeSet::new(),
        }
    }

    /// Mark a name taken so it is never produced.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    pub fn reserve_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.reserve(name);
        }
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// `<base>_<suffix>` not produced or reserved before.
    pub fn fresh(&mut self, base: &str) -> String {
        loop {
            let suffix: String = (0..SUFFIX_LEN)
                .map(|_| {
                    let index = self.rng.gen_range(0..SUFFIX_ALPHABET.len());
                    SUFFIX_ALPHABET[index] as char
                })
                .collect();
            let candidate = format!("{base}_{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[derive(Debug)]
pub struct CompilationContext {
    pub file_name: String,
    pub symtab: Option<SymbolTable>,
    pub perf: Option<PerfReport>,
    pub info: Option<CodegenInfo>,
    pub diagnostics: DiagnosticManager,
    pub names: UniqueNameGenerator,
    completed: Vec<String>,
}

impl CompilationContext {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self::with_seed(file_name, DEFAULT_NAME_SEED)
    }

    pub fn with_seed(file_name: impl Into<String>, seed: u64) -> Self {
        Self {
            file_name: file_name.into(),
            symtab: None,
            perf: None,
            info: None,
            diagnostics: DiagnosticManager::new(),
            names: UniqueNameGenerator::new(seed),
            completed: Vec::new(),
        }
    }

    /// Symbol table for a pass that depends on it.
    pub fn symtab(&self, pass: &str) -> Result<&SymbolTable> {
        self.symtab.as_ref().ok_or_else(|| {
            Error::internal(
                pass,
                "Program",
                Span::synthetic(),
                "symbol table has not been built",
            )
        })
    }

    pub fn codegen_info(&self, pass: &str) -> Result<&CodegenInfo> {
        self.info.as_ref().ok_or_else(|| {
            Error::internal(
                pass,
                "Program",
                Span::synthetic(),
                "codegen info has not been collected",
            )
        })
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.add_diagnostic(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn mark_completed(&mut self, pass: &str) {
        self.completed.push(pass.to_string());
    }

    pub fn has_completed(&self, pass: &str) -> bool {
        self.completed.iter().any(|done| done == pass)
    }

    /// Passes run so far, in order, repeats included.
    pub fn completed_passes(&self) -> &[String] {
        &self.completed
    }

    /// Fail unless `required` already ran.
    pub fn require(&self, pass: &str, required: &str) -> Result<()> {
        if self.has_completed(required) {
            return Ok(());
        }
        Err(Error::internal(
            pass,
            "Program",
            Span::synthetic(),
            format!("requires pass `{required}` to run first"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generator_is_reproducible() {
        let mut a = UniqueNameGenerator::new(7);
        let mut b = UniqueNameGenerator::new(7);
        let first: Vec<_> = (0..4).map(|_| a.fresh("m")).collect();
        let second: Vec<_> = (0..4).map(|_| b.fresh("m")).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|name| name.starts_with("m_")));
    }

    #[test]
    fn generator_never_repeats_names() {
        let mut names = UniqueNameGenerator::new(1);
        let produced: BTreeSet<_> = (0..200).map(|_| names.fresh("x")).collect();
        assert_eq!(produced.len(), 200);
    }

    #[test]
    fn missing_prerequisite_is_internal_error() {
        let mut ctx = CompilationContext::new("hh.mod");
        let err = ctx.require("perf", "symtab").unwrap_err();
        assert!(err.is_internal());
        ctx.mark_completed("symtab");
        assert!(ctx.require("perf", "symtab").is_ok());
        assert!(ctx.symtab("codegen").is_err());
    }
}
