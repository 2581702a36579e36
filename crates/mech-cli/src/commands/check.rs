//! Code checking and validation command implementation

use crate::commands::common::{collect_inputs, read_unit, report_errors};
use crate::commands::PipelineFlags;
use crate::{cli::CliConfig, CliError, Result};
use clap::Args;
use console::style;
use mech_pipeline::{front_end, run_unit, StageName};
use std::path::PathBuf;

/// Arguments for the check command
#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Files or directories to check
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Check only syntax, skip semantic analysis
    #[arg(long)]
    pub syntax_only: bool,

    #[command(flatten)]
    pub pipeline: PipelineFlags,
}

impl CheckArgs {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            syntax_only: false,
            pipeline: PipelineFlags::default(),
        }
    }
}

/// Execute the check command, returning the number of warnings seen
pub fn check_command(args: CheckArgs, config: &CliConfig) -> Result<usize> {
    let inputs = collect_inputs(&args.paths)?;
    let mut options = config.pipeline.clone();
    args.pipeline.apply(&mut options);
    let until = if args.syntax_only {
        StageName::Parse
    } else {
        StageName::Check
    };
    let pipeline = front_end(&options, until);

    let mut failed = 0;
    let mut warnings = 0;
    for input in &inputs {
        let unit = read_unit(input)?;
        let source = unit.source.clone();
        let outcome = run_unit(&pipeline, unit, &options);
        warnings += outcome
            .diagnostics
            .iter()
            .filter(|diagnostic| !diagnostic.is_error())
            .count();
        match outcome.result {
            Ok(_) => println!("{} {}", style("✓").green(), input.display()),
            Err(err) => {
                report_errors(input, &source, &outcome.diagnostics);
                println!("{} {}: {}", style("✗").red(), input.display(), err);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Compilation(format!(
            "{} of {} file(s) have errors",
            failed,
            inputs.len()
        )));
    }
    Ok(warnings)
}
