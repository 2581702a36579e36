//! Integration tests for mechc

use assert_cmd::Command;
use mech_cli::cli::CliConfig;
use mech_cli::commands::check::{check_command, CheckArgs};
use mech_cli::commands::compile::{compile_command, CompileArgs};
use mech_cli::commands::parse::{parse_command, ParseArgs};
use mech_cli::CliError;
use mech_pipeline::StageName;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const LEAK: &str = r#"
NEURON {
    SUFFIX leak
    NONSPECIFIC_CURRENT i
    RANGE g, e
}

PARAMETER {
    g = 0.001 (S/cm2)
    e = -70 (mV)
}

ASSIGNED {
    v (mV)
    i (mA/cm2)
}

BREAKPOINT {
    i = g * (v - e)
}
"#;

const BROKEN: &str = "ASSIGNED { z }\nINITIAL {\n    z = y + y\n}\n";

fn write_mod(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("mechc").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("compile"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("mechc").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_compile_writes_c_next_to_input() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_mod(temp_dir.path(), "leak.mod", LEAK);

    let written = compile_command(CompileArgs::new(vec![input]), &CliConfig::default()).unwrap();

    let expected = temp_dir.path().join("leak.c");
    assert_eq!(written, vec![expected.clone()]);
    let code = fs::read_to_string(expected).unwrap();
    assert!(code.contains("nrn_cur_leak"), "{code}");
}

#[test]
fn test_compile_directory_with_backend_and_dump() {
    let temp_dir = TempDir::new().unwrap();
    let sources = temp_dir.path().join("mod");
    fs::create_dir(&sources).unwrap();
    write_mod(&sources, "leak.mod", LEAK);
    let out_dir = temp_dir.path().join("build");

    let mut args = CompileArgs::new(vec![sources]);
    args.out_dir = Some(out_dir.clone());
    args.backend = Some(mech_codegen::BackendKind::Kernkraft);
    args.dump_ast = Some(StageName::Transform);
    let written = compile_command(args, &CliConfig::default()).unwrap();

    assert_eq!(
        written,
        vec![out_dir.join("leak.transform.json"), out_dir.join("leak.kr.c")]
    );
    let dump = fs::read_to_string(out_dir.join("leak.transform.json")).unwrap();
    assert!(mech_core::ast::json::from_str(&dump).is_ok());
}

#[test]
fn test_compile_failure_keeps_other_units() {
    let temp_dir = TempDir::new().unwrap();
    write_mod(temp_dir.path(), "a_leak.mod", LEAK);
    write_mod(temp_dir.path(), "b_broken.mod", BROKEN);

    let err = compile_command(
        CompileArgs::new(vec![temp_dir.path().to_path_buf()]),
        &CliConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err, CliError::Compilation(ref message) if message == "1 of 2 unit(s) failed"));
    assert!(temp_dir.path().join("a_leak.c").exists());
    assert!(!temp_dir.path().join("b_broken.c").exists());
}

#[test]
fn test_output_flag_needs_single_input() {
    let temp_dir = TempDir::new().unwrap();
    let a = write_mod(temp_dir.path(), "a.mod", LEAK);
    let b = write_mod(temp_dir.path(), "b.mod", LEAK);
    let mut args = CompileArgs::new(vec![a, b]);
    args.output = Some(temp_dir.path().join("out.c"));
    let err = compile_command(args, &CliConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::InvalidInput(_)));
}

#[test]
fn test_config_file_sets_float_type() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_mod(temp_dir.path(), "leak.mod", LEAK);
    let config_path = temp_dir.path().join("mechc.toml");
    fs::write(&config_path, "[pipeline.codegen]\nfloat_type = \"float\"\n").unwrap();

    let config = CliConfig::load(Some(&config_path)).unwrap();
    let written = compile_command(CompileArgs::new(vec![input]), &config).unwrap();
    let code = fs::read_to_string(&written[0]).unwrap();
    assert!(code.contains("float* g;"), "{code}");
    assert!(!code.contains("double* "), "{code}");
}

#[test]
fn test_parse_prints_ast_json() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_mod(temp_dir.path(), "leak.mod", LEAK);
    let output = temp_dir.path().join("leak.json");

    let mut args = ParseArgs::new(input);
    args.output = Some(output.clone());
    let json = parse_command(args, &CliConfig::default()).unwrap();

    assert_eq!(fs::read_to_string(output).unwrap(), json);
    let ast = mech_core::ast::json::from_str(&json).unwrap();
    assert_eq!(ast.top_level().len(), 4);
}

#[test]
fn test_parse_rejects_generate_stage() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_mod(temp_dir.path(), "leak.mod", LEAK);
    let mut args = ParseArgs::new(input);
    args.stage = StageName::Generate;
    assert!(matches!(
        parse_command(args, &CliConfig::default()),
        Err(CliError::InvalidInput(_))
    ));
}

#[test]
fn test_check_reports_broken_files() {
    let temp_dir = TempDir::new().unwrap();
    let good = write_mod(temp_dir.path(), "leak.mod", LEAK);
    let bad = write_mod(temp_dir.path(), "broken.mod", BROKEN);

    assert!(check_command(CheckArgs::new(vec![good]), &CliConfig::default()).is_ok());
    let err = check_command(CheckArgs::new(vec![bad.clone()]), &CliConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::Compilation(_)));

    let mut syntax_only = CheckArgs::new(vec![bad]);
    syntax_only.syntax_only = true;
    assert!(check_command(syntax_only, &CliConfig::default()).is_ok());
}

#[test]
fn test_cli_compile_failure_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    write_mod(temp_dir.path(), "broken.mod", BROKEN);

    let mut cmd = Command::cargo_bin("mechc").unwrap();
    cmd.arg("-C")
        .arg(temp_dir.path())
        .arg("compile")
        .arg("broken.mod");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("`y`"));
}
