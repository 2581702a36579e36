use crate::config::PipelineOptions;
use crate::error::{PipelineDiagnostics, PipelineError};
use std::marker::PhantomData;

pub trait PipelineStage: Send + Sync {
    type SrcCtx;
    type DstCtx;

    fn name(&self) -> &'static str;
    fn run(
        &self,
        context: Self::SrcCtx,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<Self::DstCtx, PipelineError>;
}

pub struct Pipeline<Src, Dst> {
    run: Box<
        dyn Fn(Src, &mut PipelineDiagnostics, &PipelineOptions) -> Result<Dst, PipelineError>
            + Send
            + Sync,
    >,
    stages: Vec<&'static str>,
}

impl<Src, Dst> Pipeline<Src, Dst> {
    pub fn run(
        &self,
        context: Src,
        diagnostics: &mut PipelineDiagnostics,
        options: &PipelineOptions,
    ) -> Result<Dst, PipelineError> {
        (self.run)(context, diagnostics, options)
    }

    pub fn stage_names(&self) -> &[&'static str] {
        &self.stages
    }
}

pub struct PipelineBuilder<Src, Dst> {
    pipeline: Pipeline<Src, Dst>,
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src> PipelineBuilder<Src, Src> {
    pub fn new() -> Self {
        let run = |context: Src,
                   _diagnostics: &mut PipelineDiagnostics,
                   _options: &PipelineOptions| Ok(context);
        Self {
            pipeline: Pipeline {
                run: Box::new(run),
                stages: Vec::new(),
            },
            _marker: PhantomData,
        }
    }
}

impl<Src> Default for PipelineBuilder<Src, Src> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Src, Mid> PipelineBuilder<Src, Mid> {
    /// Append `stage`. Its diagnostics are emitted when it ends, and a
    /// failure is attributed to it unless it names an earlier stage.
    pub fn add_stage<Next, S>(self, stage: S) -> PipelineBuilder<Src, Next>
    where
        S: PipelineStage<SrcCtx = Mid, DstCtx = Next> + 'static,
        Src: 'static,
        Mid: 'static,
        Next: 'static,
    {
        let name = stage.name();
        let previous = self.pipeline.run;
        let mut stages = self.pipeline.stages;
        stages.push(name);
        let run = move |context: Src,
                        diagnostics: &mut PipelineDiagnostics,
                        options: &PipelineOptions| {
            let mid = previous(context, diagnostics, options)?;
            tracing::info!("stage `{name}`");
            let result = stage.run(mid, diagnostics);
            let warned = options.error_tolerance.warnings_as_errors && diagnostics.has_warnings();
            let errors = diagnostics.error_count();
            diagnostics.emit_stage(name, options);
            match result {
                Ok(_) if warned => Err(PipelineError::Diagnostics {
                    stage: name,
                    count: errors.max(1),
                }),
                Ok(next) => Ok(next),
                Err(err) if err.stage() == name => Err(err),
                Err(err) => Err(err.in_stage(name)),
            }
        };

        PipelineBuilder {
            pipeline: Pipeline {
                run: Box::new(run),
                stages,
            },
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Pipeline<Src, Mid> {
        self.pipeline
    }
}
