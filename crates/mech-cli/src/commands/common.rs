//! Common helpers shared by the commands.

use crate::diagnostics::render_source_errors;
use crate::{CliError, Result};
use mech_core::diagnostics::Diagnostic;
use mech_pipeline::SourceUnit;
use std::path::{Path, PathBuf};

pub const SOURCE_EXTENSION: &str = "mod";

/// Expand the given paths into `.mod` files. Directories contribute their
/// `.mod` entries sorted by name; files are taken as given.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(CliError::InvalidInput(format!(
                "Input path does not exist: {}",
                path.display()
            )));
        }
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(path)? {
                let entry = entry?.path();
                if entry.is_file() && entry.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
                    found.push(entry);
                }
            }
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    if inputs.is_empty() {
        return Err(CliError::InvalidInput("no .mod files to process".to_string()));
    }
    Ok(inputs)
}

/// Name of the unit read from `path`, its file stem.
pub fn unit_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn read_unit(path: &Path) -> Result<SourceUnit> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        CliError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(SourceUnit::new(unit_name(path), source))
}

/// Render the located errors of a unit, if any.
pub fn report_errors(path: &Path, source: &str, diagnostics: &[Diagnostic]) {
    let printed = render_source_errors(&path.display().to_string(), source, diagnostics);
    tracing::debug!("{} located error(s) rendered for {}", printed, path.display());
}

pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn directories_expand_to_sorted_mod_files() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mod", "a.mod", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let inputs = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = inputs.iter().map(|path| unit_name(path)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_inputs_are_rejected() {
        let err = collect_inputs(&[PathBuf::from("/nonexistent/x.mod")]).unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));
    }
}
