//! mechc library
//!
//! Command implementations behind the `mechc` binary. Each command layers its
//! flags over the loaded [`cli::CliConfig`] and drives `mech-pipeline`.

pub mod cli;
pub mod commands;
pub mod diagnostics;

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Compilation error: {0}")]
        Compilation(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
