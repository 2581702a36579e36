//! The five stages of one compilation unit.
//!
//! `parse` lexes and parses the source; `analyze`, `transform` and `check`
//! each run a slice of the fixed pass order; `generate` prints C. A stage
//! that produced an error-level diagnostic ends the unit.

use crate::config::{PipelineOptions, StageName};
use crate::error::{PipelineDiagnostics, PipelineError};
use crate::pipeline::PipelineStage;
use mech_codegen::{BackendKind, CodegenBackend, CodegenOptions};
use mech_core::codegen_info::CodegenInfo;
use mech_core::{Ast, CompilationContext};
use mech_lang::ModParser;
use mech_optimize::{PassName, PassPipeline, PipelineStatus};

/// Source text of one `.mod` file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: String,
    pub source: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// A parsed unit on its way through the passes.
#[derive(Debug)]
pub struct Unit {
    pub name: String,
    pub ast: Ast,
    pub ctx: CompilationContext,
    /// JSON rendering of the AST after the requested stage.
    pub ast_dump: Option<String>,
}

impl Unit {
    fn dump(&mut self, stage: StageName, requested: Option<StageName>) -> Result<(), PipelineError> {
        if requested == Some(stage) {
            let text = mech_core::ast::json::to_string_pretty(&self.ast)
                .map_err(|err| PipelineError::new(stage.as_str(), err))?;
            self.ast_dump = Some(text);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub name: String,
    pub code: String,
    /// File extension of the backend that printed `code`.
    pub extension: &'static str,
    pub info: CodegenInfo,
    pub ast_dump: Option<String>,
}

pub struct ParseStage {
    seed: u64,
    dump_ast: Option<StageName>,
}

impl ParseStage {
    pub fn new(options: &PipelineOptions) -> Self {
        Self {
            seed: options.seed,
            dump_ast: options.dump_ast,
        }
    }
}

impl PipelineStage for ParseStage {
    type SrcCtx = SourceUnit;
    type DstCtx = Unit;

    fn name(&self) -> &'static str {
        StageName::Parse.as_str()
    }

    fn run(&self, context: SourceUnit, diagnostics: &mut PipelineDiagnostics) -> Result<Unit, PipelineError> {
        let report = ModParser::new().parse_source(&context.source);
        let count = report.diagnostics.iter().filter(|d| d.is_error()).count();
        diagnostics.extend(report.diagnostics);
        let Some(ast) = report.value else {
            return Err(PipelineError::Diagnostics {
                stage: self.name(),
                count,
            });
        };
        let ctx = CompilationContext::with_seed(context.name.clone(), self.seed);
        let mut unit = Unit {
            name: context.name,
            ast,
            ctx,
            ast_dump: None,
        };
        unit.dump(StageName::Parse, self.dump_ast)?;
        Ok(unit)
    }
}

/// A slice of the pass order run as one stage.
pub struct PassStage {
    stage: StageName,
    passes: PassPipeline,
    dump_ast: Option<StageName>,
    print_passes: bool,
}

impl PassStage {
    /// Passes of `stage`; run back to back the three pass stages form the
    /// standard pass order.
    pub fn passes_of(stage: StageName) -> &'static [PassName] {
        match stage {
            StageName::Analyze => &[PassName::Symtab, PassName::Verbatim, PassName::Compat],
            StageName::Transform => &[PassName::Kinetic, PassName::Linear, PassName::Solve, PassName::Pow],
            StageName::Check => &[PassName::Symtab, PassName::Perf, PassName::CodegenInfo],
            StageName::Parse | StageName::Generate => &[],
        }
    }

    pub fn new(stage: StageName, options: &PipelineOptions) -> Self {
        Self {
            stage,
            passes: PassPipeline::from_names(Self::passes_of(stage)),
            dump_ast: options.dump_ast,
            print_passes: options.debug.print_passes,
        }
    }
}

impl PipelineStage for PassStage {
    type SrcCtx = Unit;
    type DstCtx = Unit;

    fn name(&self) -> &'static str {
        self.stage.as_str()
    }

    fn run(&self, mut unit: Unit, diagnostics: &mut PipelineDiagnostics) -> Result<Unit, PipelineError> {
        let stage = self.name();
        let print_passes = self.print_passes;
        let status = self
            .passes
            .run_with(&mut unit.ast, &mut unit.ctx, |pass, ast| {
                if print_passes {
                    tracing::info!("[{stage}] pass `{pass}` done, {} node(s)", ast.len());
                }
                Ok(())
            })
            .map_err(|err| PipelineError::new(stage, err))?;
        if self.stage == StageName::Check {
            unit.ast
                .verify_tree()
                .map_err(|err| PipelineError::new(stage, err))?;
        }
        diagnostics.extend(unit.ctx.diagnostics.take());
        if let PipelineStatus::Stopped { after } = status {
            tracing::debug!("[{stage}] stopped after `{after}`");
            return Err(PipelineError::Diagnostics {
                stage,
                count: diagnostics.error_count(),
            });
        }
        unit.dump(self.stage, self.dump_ast)?;
        Ok(unit)
    }
}

pub struct GenerateStage {
    backend: BackendKind,
    options: CodegenOptions,
}

impl GenerateStage {
    pub fn new(options: &PipelineOptions) -> Self {
        Self {
            backend: options.backend,
            options: options.codegen.clone(),
        }
    }
}

impl PipelineStage for GenerateStage {
    type SrcCtx = Unit;
    type DstCtx = CompiledUnit;

    fn name(&self) -> &'static str {
        StageName::Generate.as_str()
    }

    fn run(&self, unit: Unit, diagnostics: &mut PipelineDiagnostics) -> Result<CompiledUnit, PipelineError> {
        let stage = self.name();
        let backend = self.backend.create();
        let code = match mech_codegen::generate(&unit.ast, &unit.ctx, backend.as_ref(), &self.options) {
            Ok(code) => code,
            Err(err) => {
                let err = mech_core::Error::from(err);
                if err.is_internal() {
                    return Err(PipelineError::new(stage, err));
                }
                let found = err.to_diagnostics();
                let count = found.len();
                diagnostics.extend(found);
                return Err(PipelineError::Diagnostics { stage, count });
            }
        };
        let info = unit
            .ctx
            .codegen_info(stage)
            .map_err(|err| PipelineError::new(stage, err))?
            .clone();
        Ok(CompiledUnit {
            name: unit.name,
            code,
            extension: backend.extension(),
            info,
            ast_dump: unit.ast_dump,
        })
    }
}
