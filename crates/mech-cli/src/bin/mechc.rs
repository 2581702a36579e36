//! mechc, the mechanism compiler
//!
//! # Usage
//!
//! ```bash
//! # Compile a mechanism to C next to the source
//! mechc compile hh.mod
//!
//! # Compile a directory for the Kernkraft backend into build/
//! mechc compile mod/ --backend kernkraft --out-dir build
//!
//! # Print the AST after the transform stage
//! mechc parse hh.mod --stage transform
//!
//! # Check files without generating code
//! mechc check mod/
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use mech_cli::{
    cli::CliConfig,
    commands::{self, check::CheckArgs, compile::CompileArgs, parse::ParseArgs},
    diagnostics::setup_error_reporting,
    Result,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "mechc",
    version = env!("CARGO_PKG_VERSION"),
    about = "Source-to-source compiler from mechanism descriptions to C",
    long_about = r#"
mechc parses .mod mechanism descriptions, lowers kinetic schemes, linear and
non-linear systems and ODE solve methods, and prints C kernels.

EXAMPLES:
    mechc compile hh.mod                       # Write hh.c next to hh.mod
    mechc compile mod/ --out-dir build         # Compile every .mod in mod/
    mechc parse hh.mod --stage analyze         # AST as JSON after analysis
    mechc check mod/                           # Report diagnostics only
    "#
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, global = true, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile mechanisms to C
    Compile(CompileArgs),

    /// Print the AST of a mechanism as JSON
    Parse(ParseArgs),

    /// Run every stage but code generation and report diagnostics
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_error_reporting()?;
    setup_logging(cli.verbose, cli.quiet, cli.log, cli.log_format)?;

    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if cli.verbose > 0 {
        config.pipeline.debug.verbose = true;
    }

    let result = match cli.command {
        Commands::Compile(args) => commands::compile_command(args, &config).map(|_| ()),
        Commands::Parse(args) => commands::parse_command(args, &config).map(|_| ()),
        Commands::Check(args) => commands::check_command(args, &config).map(|_| ()),
    };

    match result {
        Ok(()) => {
            if cli.verbose > 0 {
                info!("Command completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            if cli.verbose > 0 {
                error!(?e, "detailed error context");
            }
            std::process::exit(1);
        }
    }
}

fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_level: Option<LogLevel>,
    log_format: LogFormat,
) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(formatter)
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(formatter.json())
                .with(filter)
                .init();
        }
    }

    Ok(())
}
