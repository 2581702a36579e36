//! mech-codegen: C output for lowered mechanisms
//!
//! This crate turns a unit that went through the whole pass pipeline into
//! one C translation unit. The plain C backend targets the runtime's
//! `NrnThread`/`Memb_list` interface; the Kernkraft backend emits the same
//! kernels as bare loops over flat arrays for static performance analysis.

pub mod backend;
pub mod c;
pub mod error;
pub mod kernkraft;
pub mod layout;
pub mod printer;

pub use backend::{BackendKind, CBackend, CodegenBackend, Kernel, Routine};
pub use c::{CodegenCVisitor, CodegenOptions};
pub use error::{CodegenError, Result};
pub use kernkraft::KernkraftBackend;
pub use layout::Layout;
pub use printer::CodePrinter;

use mech_core::diagnostics::Diagnostic;
use mech_core::{Ast, CompilationContext};

/// Generate the translation unit for an analysed unit. A unit that
/// reported any error does not reach the printer.
pub fn generate(
    ast: &Ast,
    ctx: &CompilationContext,
    backend: &dyn CodegenBackend,
    options: &CodegenOptions,
) -> Result<String> {
    if ctx.has_errors() {
        let errors: Vec<Diagnostic> = ctx.diagnostics.errors().cloned().collect();
        return Err(mech_core::Error::Diagnostics(errors).into());
    }
    let table = ctx.symtab(c::PASS)?;
    let info = ctx.codegen_info(c::PASS)?;
    let code = CodegenCVisitor::new(ast, table, info, backend, options)
        .with_source_name(ctx.file_name.clone())
        .generate()?;
    tracing::info!(
        "generated {} lines of {} for `{}`",
        code.lines().count(),
        backend.name(),
        info.mechanism_name
    );
    Ok(code)
}
