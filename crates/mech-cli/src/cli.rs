//! CLI configuration and settings management

use crate::{CliError, Result};
use mech_pipeline::PipelineOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "mechc.toml";

/// CLI configuration loaded from config files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Options handed to every compilation unit
    pub pipeline: PipelineOptions,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for generated files; next to each input when unset
    pub directory: Option<PathBuf>,
}

impl CliConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Later locations take precedence: system, home, then current directory.
        let mut candidates = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("mechc").join("config.toml"));
        }
        if let Some(home_dir) = dirs::home_dir() {
            candidates.push(home_dir.join(".mechc.toml"));
        }
        candidates.push(PathBuf::from(CONFIG_FILE));

        let mut config = Self::default();
        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            tracing::debug!("loading configuration from {}", candidate.display());
            config = config.merge(Self::load_from_file(&candidate)?);
        }
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| CliError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Merge with a configuration loaded later; whole files replace each
    /// other except for an unset output directory.
    pub fn merge(self, other: Self) -> Self {
        Self {
            pipeline: other.pipeline,
            output: OutputConfig {
                directory: other.output.directory.or(self.output.directory),
            },
        }
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mechc").join("config.toml"))
    }
}
