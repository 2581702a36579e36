//! Command implementations for mechc

pub mod check;
pub mod common;
pub mod compile;
pub mod parse;

pub use check::check_command;
pub use compile::compile_command;
pub use parse::parse_command;

use clap::Args;
use mech_pipeline::PipelineOptions;

/// Pipeline flags shared by every command; they override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineFlags {
    /// Seed of the unique-name generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum number of errors reported per stage (0 = unlimited)
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Treat warnings as errors
    #[arg(long)]
    pub warnings_as_errors: bool,

    /// Log every pass as it finishes
    #[arg(long)]
    pub print_passes: bool,
}

impl PipelineFlags {
    pub fn apply(&self, options: &mut PipelineOptions) {
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if let Some(max_errors) = self.max_errors {
            options.error_tolerance.max_errors = max_errors;
        }
        if self.warnings_as_errors {
            options.error_tolerance.warnings_as_errors = true;
        }
        if self.print_passes {
            options.debug.print_passes = true;
        }
    }
}
