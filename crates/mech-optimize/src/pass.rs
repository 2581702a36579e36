// OptimizePass trait - interface for analysis and transform passes

use mech_core::{Ast, CompilationContext, Result};
use std::fmt;

mech_core::common_enum! {
    #[derive(Copy, PartialOrd, Ord)]
    pub enum PassName {
        Symtab,
        Verbatim,
        Compat,
        Kinetic,
        Linear,
        Solve,
        Pow,
        Perf,
        CodegenInfo,
    }
}

impl PassName {
    pub const ALL: &'static [PassName] = &[
        PassName::Symtab,
        PassName::Verbatim,
        PassName::Compat,
        PassName::Kinetic,
        PassName::Linear,
        PassName::Solve,
        PassName::Pow,
        PassName::Perf,
        PassName::CodegenInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PassName::Symtab => "symtab",
            PassName::Verbatim => "verbatim",
            PassName::Compat => "compat",
            PassName::Kinetic => "kinetic",
            PassName::Linear => "linear",
            PassName::Solve => "solve",
            PassName::Pow => "pow",
            PassName::Perf => "perf",
            PassName::CodegenInfo => "codegen_info",
        }
    }

    pub fn from_ident(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        PassName::ALL
            .iter()
            .copied()
            .find(|pass| pass.as_str() == normalized)
    }

    pub fn discipline(&self) -> PassDiscipline {
        match self {
            PassName::Symtab | PassName::Compat | PassName::Perf | PassName::CodegenInfo => {
                PassDiscipline::Analysis
            }
            PassName::Verbatim
            | PassName::Kinetic
            | PassName::Linear
            | PassName::Solve
            | PassName::Pow => PassDiscipline::Transform,
        }
    }

    /// Passes whose output this pass reads.
    pub fn requires(&self) -> &'static [PassName] {
        match self {
            PassName::Symtab | PassName::Verbatim | PassName::Pow => &[],
            PassName::Compat | PassName::Kinetic | PassName::Linear | PassName::Solve => {
                &[PassName::Symtab]
            }
            PassName::Perf => &[PassName::Symtab],
            PassName::CodegenInfo => &[PassName::Symtab, PassName::Perf],
        }
    }
}

impl fmt::Display for PassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only analysis or tree-rewriting transform. A pass sticks to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassDiscipline {
    Analysis,
    Transform,
}

pub trait OptimizePass {
    fn name(&self) -> PassName;

    fn discipline(&self) -> PassDiscipline {
        self.name().discipline()
    }

    /// Run over the whole unit. Analysis passes only read `ast`.
    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()>;
}
