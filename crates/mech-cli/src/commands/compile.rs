//! Compilation command implementation

use crate::commands::common::{collect_inputs, read_unit, report_errors, write_output};
use crate::commands::PipelineFlags;
use crate::{cli::CliConfig, CliError, Result};
use clap::Args;
use console::style;
use mech_codegen::BackendKind;
use mech_pipeline::{compile_units, PipelineOptions, StageName};
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments for the compile command
#[derive(Debug, Clone, Args)]
pub struct CompileArgs {
    /// `.mod` files or directories containing them
    #[arg(required = true)]
    pub input: Vec<PathBuf>,

    /// Output file, only with a single input
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for generated files
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Code generation backend (c, kernkraft)
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// Floating point type of the generated code
    #[arg(long)]
    pub float_type: Option<String>,

    /// Emit per-block operation counts as comments
    #[arg(long)]
    pub perf_comments: bool,

    /// Write the AST as JSON after this stage
    #[arg(long, value_parser = parse_stage)]
    pub dump_ast: Option<StageName>,

    #[command(flatten)]
    pub pipeline: PipelineFlags,
}

fn parse_backend(value: &str) -> std::result::Result<BackendKind, String> {
    value.parse().map_err(|err: mech_codegen::CodegenError| err.to_string())
}

pub(crate) fn parse_stage(value: &str) -> std::result::Result<StageName, String> {
    value.parse()
}

impl CompileArgs {
    pub fn new(input: Vec<PathBuf>) -> Self {
        Self {
            input,
            output: None,
            out_dir: None,
            backend: None,
            float_type: None,
            perf_comments: false,
            dump_ast: None,
            pipeline: PipelineFlags::default(),
        }
    }

    fn options(&self, config: &CliConfig) -> PipelineOptions {
        let mut options = config.pipeline.clone();
        if let Some(backend) = self.backend {
            options.backend = backend;
        }
        if let Some(float_type) = &self.float_type {
            options.codegen.float_type = float_type.clone();
        }
        if self.perf_comments {
            options.codegen.emit_perf_comments = true;
        }
        if self.dump_ast.is_some() {
            options.dump_ast = self.dump_ast;
        }
        self.pipeline.apply(&mut options);
        options
    }
}

/// Execute the compile command, returning the files written
pub fn compile_command(args: CompileArgs, config: &CliConfig) -> Result<Vec<PathBuf>> {
    let inputs = collect_inputs(&args.input)?;
    if args.output.is_some() && inputs.len() > 1 {
        return Err(CliError::InvalidInput(
            "--output takes a single input; use --out-dir for several".to_string(),
        ));
    }
    let options = args.options(config);
    info!(
        "compiling {} unit(s) with the {} backend",
        inputs.len(),
        options.backend
    );

    let units = inputs
        .iter()
        .map(|path| read_unit(path))
        .collect::<Result<Vec<_>>>()?;
    let sources: Vec<String> = units.iter().map(|unit| unit.source.clone()).collect();
    let outcomes = compile_units(units, &options);

    let mut written = Vec::new();
    let mut failed = 0;
    for ((input, source), outcome) in inputs.iter().zip(&sources).zip(outcomes) {
        let compiled = match outcome.result {
            Ok(compiled) => compiled,
            Err(err) => {
                report_errors(input, source, &outcome.diagnostics);
                eprintln!("{} {}: {}", style("✗").red(), input.display(), err);
                failed += 1;
                continue;
            }
        };
        let output = output_path(&args, config, input, &compiled.name, compiled.extension);
        write_output(&output, &compiled.code)?;
        if let (Some(stage), Some(dump)) = (options.dump_ast, &compiled.ast_dump) {
            let dump_path = output.with_file_name(format!("{}.{}.json", compiled.name, stage));
            write_output(&dump_path, dump)?;
            written.push(dump_path);
        }
        println!("{} {} -> {}", style("✓").green(), input.display(), output.display());
        written.push(output);
    }

    if failed > 0 {
        return Err(CliError::Compilation(format!(
            "{} of {} unit(s) failed",
            failed,
            inputs.len()
        )));
    }
    Ok(written)
}

fn output_path(
    args: &CompileArgs,
    config: &CliConfig,
    input: &Path,
    name: &str,
    extension: &str,
) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let file_name = format!("{name}{extension}");
    match args.out_dir.as_ref().or(config.output.directory.as_ref()) {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}
