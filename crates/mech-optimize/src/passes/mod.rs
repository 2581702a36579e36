//! The fixed set of analysis and transform passes.

pub mod codegen_info;
pub mod compat;
pub mod eigen;
pub mod kinetic;
pub mod linear;
pub mod perf;
pub mod pow;
pub mod solve;
pub mod symtab;
pub mod verbatim;

pub use codegen_info::CodegenInfoPass;
pub use compat::CompatPass;
pub use kinetic::KineticPass;
pub use linear::LinearPass;
pub use perf::PerfPass;
pub use pow::PowPass;
pub use solve::SolvePass;
pub use symtab::{SymtabPass, SymtabVisitor};
pub use verbatim::VerbatimPass;

use crate::pass::{OptimizePass, PassName};

/// The pass implementing `name`.
pub fn create_pass(name: PassName) -> Box<dyn OptimizePass + Send + Sync> {
    match name {
        PassName::Symtab => Box::new(SymtabPass),
        PassName::Verbatim => Box::new(VerbatimPass),
        PassName::Compat => Box::new(CompatPass),
        PassName::Kinetic => Box::new(KineticPass),
        PassName::Linear => Box::new(LinearPass),
        PassName::Solve => Box::new(SolvePass),
        PassName::Pow => Box::new(PowPass),
        PassName::Perf => Box::new(PerfPass),
        PassName::CodegenInfo => Box::new(CodegenInfoPass),
    }
}
