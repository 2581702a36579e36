//! Parse command: print the AST of one file as JSON.

use crate::commands::common::{read_unit, report_errors, write_output};
use crate::commands::compile::parse_stage;
use crate::commands::PipelineFlags;
use crate::{cli::CliConfig, CliError, Result};
use clap::Args;
use mech_pipeline::{front_end, PipelineDiagnostics, StageName};
use std::path::PathBuf;

/// Arguments for the parse command
#[derive(Debug, Clone, Args)]
pub struct ParseArgs {
    /// `.mod` file to parse
    pub input: PathBuf,

    /// Render the AST after this stage instead of right after parsing
    #[arg(long, default_value = "parse", value_parser = parse_stage)]
    pub stage: StageName,

    /// Write the JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineFlags,
}

impl ParseArgs {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            stage: StageName::Parse,
            output: None,
            pipeline: PipelineFlags::default(),
        }
    }
}

/// Execute the parse command, returning the rendered JSON
pub fn parse_command(args: ParseArgs, config: &CliConfig) -> Result<String> {
    if args.stage == StageName::Generate {
        return Err(CliError::InvalidInput(
            "the AST can be rendered up to the check stage".to_string(),
        ));
    }
    let mut options = config.pipeline.clone();
    args.pipeline.apply(&mut options);

    let unit = read_unit(&args.input)?;
    let source = unit.source.clone();
    let mut diagnostics = PipelineDiagnostics::default();
    let unit = match front_end(&options, args.stage).run(unit, &mut diagnostics, &options) {
        Ok(unit) => unit,
        Err(err) => {
            report_errors(&args.input, &source, &diagnostics.all());
            return Err(CliError::Compilation(err.to_string()));
        }
    };

    let json = mech_core::ast::json::to_string_pretty(&unit.ast)
        .map_err(|err| CliError::Compilation(err.to_string()))?;
    match &args.output {
        Some(path) => write_output(path, &json)?,
        None => println!("{json}"),
    }
    Ok(json)
}
