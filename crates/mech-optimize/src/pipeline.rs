use crate::pass::{OptimizePass, PassDiscipline, PassName};
use crate::passes::create_pass;
use mech_core::{Ast, CompilationContext, Error, Result};

/// How a pipeline run ended when no internal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed,
    /// A pass reported user errors; later passes were skipped.
    Stopped { after: PassName },
}

impl PipelineStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineStatus::Completed)
    }
}

pub struct PassPipeline {
    passes: Vec<Box<dyn OptimizePass + Send + Sync>>,
}

impl Default for PassPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl PassPipeline {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The order every compilation unit goes through. The symbol table is
    /// rebuilt after the transforms so the later analyses see the locals
    /// the lowerings introduced.
    pub fn standard() -> Self {
        Self::from_names(&[
            PassName::Symtab,
            PassName::Verbatim,
            PassName::Compat,
            PassName::Kinetic,
            PassName::Linear,
            PassName::Solve,
            PassName::Pow,
            PassName::Symtab,
            PassName::Perf,
            PassName::CodegenInfo,
        ])
    }

    pub fn from_names(names: &[PassName]) -> Self {
        Self {
            passes: names.iter().map(|&name| create_pass(name)).collect(),
        }
    }

    pub fn with_pass(mut self, pass: impl OptimizePass + Send + Sync + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> Vec<PassName> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<PipelineStatus> {
        self.run_with(ast, ctx, |_, _| Ok(()))
    }

    /// Run every pass in order, calling `after_pass` once each pass has
    /// finished and the tree has been checked.
    pub fn run_with<F>(
        &self,
        ast: &mut Ast,
        ctx: &mut CompilationContext,
        mut after_pass: F,
    ) -> Result<PipelineStatus>
    where
        F: FnMut(PassName, &Ast) -> Result<()>,
    {
        for pass in &self.passes {
            let name = pass.name();
            for required in name.requires() {
                ctx.require(name.as_str(), required.as_str())?;
            }
            mech_core::debug!("running pass `{}`", name);
            pass.run(ast, ctx)?;
            ctx.mark_completed(name.as_str());

            if pass.discipline() == PassDiscipline::Transform {
                ast.verify_tree().map_err(|err| blame(name, err))?;
            }
            after_pass(name, ast)?;

            if ctx.has_errors() {
                mech_core::info!(
                    "stopping after `{}`: {} error(s) reported",
                    name,
                    ctx.diagnostics.errors().count()
                );
                return Ok(PipelineStatus::Stopped { after: name });
            }
        }
        Ok(PipelineStatus::Completed)
    }
}

/// A broken tree is the fault of the transform that just ran.
fn blame(pass: PassName, err: Error) -> Error {
    match err {
        Error::InternalInvariantViolation {
            node_kind,
            span,
            message,
            ..
        } => Error::internal(pass.as_str(), node_kind, span, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Ast {
        mech_lang::parse_source(source).value.expect("parses")
    }

    #[test]
    fn standard_order_rebuilds_symtab_after_transforms() {
        let names: Vec<_> = PassPipeline::standard()
            .pass_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "symtab", "verbatim", "compat", "kinetic", "linear", "solve", "pow", "symtab",
                "perf", "codegen_info"
            ]
        );
    }

    #[test]
    fn pass_without_its_prerequisite_is_an_internal_error() {
        let mut ast = parse("ASSIGNED { x }\n");
        let mut ctx = CompilationContext::new("order.mod");
        let err = PassPipeline::from_names(&[PassName::Perf])
            .run(&mut ast, &mut ctx)
            .unwrap_err();
        match err {
            Error::InternalInvariantViolation { pass, message, .. } => {
                assert_eq!(pass, "perf");
                assert!(message.contains("symtab"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn hook_sees_every_pass_in_order() {
        let mut ast = parse("ASSIGNED { x }\nINITIAL { x = 2 ^ 3 }\n");
        let mut ctx = CompilationContext::new("hook.mod");
        let mut seen = Vec::new();
        let status = PassPipeline::standard()
            .run_with(&mut ast, &mut ctx, |pass, _| {
                seen.push(pass);
                Ok(())
            })
            .unwrap();
        assert_eq!(status, PipelineStatus::Completed);
        assert_eq!(seen, PassPipeline::standard().pass_names());
        assert!(ctx.info.is_some());
    }

    #[test]
    fn user_errors_stop_the_pipeline() {
        let mut ast = parse("INITIAL { y = 1 }\n");
        let mut ctx = CompilationContext::new("stop.mod");
        let status = PassPipeline::standard().run(&mut ast, &mut ctx).unwrap();
        assert_eq!(status, PipelineStatus::Stopped { after: PassName::Symtab });
        assert!(ctx.info.is_none());
    }
}
