//! mech-pipeline: one compilation unit end to end
//!
//! Stages are chained with a typed [`PipelineBuilder`]: parse, analyze,
//! transform, check and generate. Diagnostics are emitted at the end of the
//! stage that produced them, and the first stage with an error ends the
//! unit. Independent units compile in parallel with [`compile_units`].

pub mod config;
pub mod error;
pub mod pipeline;
pub mod stages;

pub use config::{DebugOptions, ErrorToleranceOptions, PipelineOptions, StageName};
pub use error::{PipelineDiagnostics, PipelineError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStage};
pub use stages::{CompiledUnit, GenerateStage, ParseStage, PassStage, SourceUnit, Unit};

use mech_core::diagnostics::Diagnostic;
use rayon::prelude::*;

/// Parse and run the pass stages up to and including `until`.
pub fn front_end(options: &PipelineOptions, until: StageName) -> Pipeline<SourceUnit, Unit> {
    let mut builder = PipelineBuilder::new().add_stage(ParseStage::new(options));
    for stage in [StageName::Analyze, StageName::Transform, StageName::Check] {
        if stage <= until {
            builder = builder.add_stage(PassStage::new(stage, options));
        }
    }
    builder.build()
}

/// Every stage, from source text to C.
pub fn compiler(options: &PipelineOptions) -> Pipeline<SourceUnit, CompiledUnit> {
    PipelineBuilder::new()
        .add_stage(ParseStage::new(options))
        .add_stage(PassStage::new(StageName::Analyze, options))
        .add_stage(PassStage::new(StageName::Transform, options))
        .add_stage(PassStage::new(StageName::Check, options))
        .add_stage(GenerateStage::new(options))
        .build()
}

/// Result of one unit with everything it reported.
#[derive(Debug)]
pub struct UnitOutcome<T> {
    pub name: String,
    pub result: Result<T, PipelineError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> UnitOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub fn run_unit<T>(
    pipeline: &Pipeline<SourceUnit, T>,
    unit: SourceUnit,
    options: &PipelineOptions,
) -> UnitOutcome<T> {
    let name = unit.name.clone();
    let mut diagnostics = PipelineDiagnostics::default();
    let result = pipeline.run(unit, &mut diagnostics, options);
    match &result {
        Ok(_) => tracing::info!("`{name}` compiled"),
        Err(err) => tracing::info!("`{name}` failed: {err}"),
    }
    UnitOutcome {
        name,
        result,
        diagnostics: diagnostics.all(),
    }
}

pub fn compile_unit(unit: SourceUnit, options: &PipelineOptions) -> UnitOutcome<CompiledUnit> {
    run_unit(&compiler(options), unit, options)
}

/// Compile independent units in parallel. Outcomes keep the input order and
/// nothing is shared between units.
pub fn compile_units(units: Vec<SourceUnit>, options: &PipelineOptions) -> Vec<UnitOutcome<CompiledUnit>> {
    let pipeline = compiler(options);
    units
        .into_par_iter()
        .map(|unit| run_unit(&pipeline, unit, options))
        .collect()
}
