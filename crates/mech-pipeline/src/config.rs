use mech_codegen::{BackendKind, CodegenOptions};
use mech_core::context::DEFAULT_NAME_SEED;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mech_core::common_enum! {
    /// Stages of one compilation unit, in execution order.
    #[derive(Copy, PartialOrd, Ord)]
    #[serde(rename_all = "lowercase")]
    pub enum StageName {
        Parse,
        Analyze,
        Transform,
        Check,
        Generate,
    }
}

impl StageName {
    pub const ALL: &'static [StageName] = &[
        StageName::Parse,
        StageName::Analyze,
        StageName::Transform,
        StageName::Check,
        StageName::Generate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Parse => "parse",
            StageName::Analyze => "analyze",
            StageName::Transform => "transform",
            StageName::Check => "check",
            StageName::Generate => "generate",
        }
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        StageName::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown stage `{s}`, expected one of: {}",
                    StageName::ALL.iter().map(|stage| stage.as_str()).collect::<Vec<_>>().join(", ")
                )
            })
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Code generation backend
    pub backend: BackendKind,
    /// Options of the C printer
    pub codegen: CodegenOptions,
    /// Stage after which the AST is rendered as JSON
    pub dump_ast: Option<StageName>,
    /// Seed of the unique-name generator of every unit
    pub seed: u64,
    /// Debug options
    pub debug: DebugOptions,
    /// Error tolerance options
    pub error_tolerance: ErrorToleranceOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            codegen: CodegenOptions::default(),
            dump_ast: None,
            seed: DEFAULT_NAME_SEED,
            debug: DebugOptions::default(),
            error_tolerance: ErrorToleranceOptions::default(),
        }
    }
}

/// Debug options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOptions {
    /// Log every pass as it finishes
    pub print_passes: bool,
    /// Report info-level diagnostics too
    pub verbose: bool,
}

/// Error tolerance configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorToleranceOptions {
    /// Maximum number of errors reported per stage (0 = unlimited)
    pub max_errors: usize,
    /// Stop at the end of a stage that produced warnings
    pub warnings_as_errors: bool,
}

impl Default for ErrorToleranceOptions {
    fn default() -> Self {
        Self {
            max_errors: 20,
            warnings_as_errors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_parse_and_order() {
        assert_eq!("Check".parse::<StageName>().unwrap(), StageName::Check);
        assert!(StageName::Parse < StageName::Generate);
        let err = "lower".parse::<StageName>().unwrap_err();
        assert!(err.contains("parse, analyze, transform, check, generate"), "{err}");
    }
}
