// Stage-by-stage runs of whole compilation units.

use mech_codegen::BackendKind;
use mech_core::diagnostics::DiagnosticKind;
use mech_pipeline::{
    compile_unit, compile_units, front_end, PipelineDiagnostics, PipelineError, PipelineOptions,
    SourceUnit, StageName,
};
use pretty_assertions::assert_eq;

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

const CHANNEL: &str = r#"
NEURON {
    SUFFIX chan
    USEION k READ ek WRITE ik
    RANGE gbar, x, y
}

PARAMETER {
    gbar = 0.036
    kf = 0.1
    kb = 0.05
}

STATE { n A B x y }

ASSIGNED { v ek ik ninf ntau }

INITIAL {
    n = ninf
}

BREAKPOINT {
    SOLVE gates METHOD cnexp
    SOLVE scheme METHOD derivimplicit
    SOLVE sys
    ik = gbar * n ^ 4 * (v - ek)
}

DERIVATIVE gates {
    n' = (ninf - n) / ntau
}

KINETIC scheme {
    ~ A <-> B (kf, kb)
}

LINEAR sys {
    ~ x + y = 3
    ~ x - y = 1
}
"#;

const UNDECLARED: &str = "ASSIGNED { z }\nINITIAL {\n    z = y + y\n}\n";

const UNTERMINATED: &str = "NEURON {\n    SUFFIX leak\n}\n\nDERIVATIVE states {\n    m' = (minf - m) / mtau\n";

fn unit(name: &str, source: &str) -> SourceUnit {
    SourceUnit::new(name, source)
}

#[test]
fn leak_channel_compiles_to_c() {
    let outcome = compile_unit(unit("leak", LEAK), &PipelineOptions::default());
    let compiled = outcome.result.expect("compiles");
    assert_eq!(compiled.name, "leak");
    assert_eq!(compiled.extension, ".c");
    assert!(compiled.code.contains("void nrn_cur_leak("), "{}", compiled.code);
    assert!(compiled.ast_dump.is_none());
    assert!(outcome.diagnostics.iter().all(|d| !d.is_error()));
}

#[test]
fn lowered_kinetic_and_linear_blocks_reach_codegen() {
    let outcome = compile_unit(unit("chan", CHANNEL), &PipelineOptions::default());
    let compiled = outcome.result.expect("compiles");
    assert!(compiled.code.contains("linear system in"), "{}", compiled.code);
    assert!(compiled.code.contains("newton iteration in"), "{}", compiled.code);
    assert!(compiled.info.currents.iter().any(|current| current == "ik"));
}

#[test]
fn undeclared_variable_stops_in_analyze() {
    let outcome = compile_unit(unit("bad", UNDECLARED), &PipelineOptions::default());
    let err = outcome.result.expect_err("fails");
    assert_eq!(err.stage(), "analyze");
    assert!(matches!(err, PipelineError::Diagnostics { count: 1, .. }), "{err}");
    let unresolved: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnresolvedSymbol)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].source_context.as_deref(), Some("analyze"));
}

#[test]
fn unterminated_block_stops_in_parse_with_one_error() {
    let outcome = compile_unit(unit("cut", UNTERMINATED), &PipelineOptions::default());
    let err = outcome.result.expect_err("fails");
    assert_eq!(err.stage(), "parse");
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Syntax);
}

#[test]
fn ast_dump_after_parse_reads_back() {
    let options = PipelineOptions {
        dump_ast: Some(StageName::Parse),
        ..PipelineOptions::default()
    };
    let compiled = compile_unit(unit("leak", LEAK), &options)
        .result
        .expect("compiles");
    let dump = compiled.ast_dump.expect("dumped");
    let ast = mech_core::ast::json::from_str(&dump).expect("valid json");
    assert_eq!(ast.top_level().len(), 4);
    assert!(ast.verify_tree().is_ok());
}

#[test]
fn front_end_stops_at_the_requested_stage() {
    let options = PipelineOptions::default();
    let pipeline = front_end(&options, StageName::Analyze);
    assert_eq!(pipeline.stage_names(), ["parse", "analyze"]);

    let mut diagnostics = PipelineDiagnostics::default();
    let analyzed = pipeline
        .run(unit("chan", CHANNEL), &mut diagnostics, &options)
        .expect("analyzes");
    assert!(analyzed.ctx.symtab("test").is_ok());
    assert!(analyzed.ctx.codegen_info("test").is_err());
}

#[test]
fn units_compile_in_order_and_fail_alone() {
    let units = vec![
        unit("leak", LEAK),
        unit("bad", UNDECLARED),
        unit("chan", CHANNEL),
        unit("cut", UNTERMINATED),
    ];
    let outcomes = compile_units(units, &PipelineOptions::default());
    let summary: Vec<_> = outcomes
        .iter()
        .map(|outcome| (outcome.name.as_str(), outcome.is_ok()))
        .collect();
    assert_eq!(
        summary,
        vec![("leak", true), ("bad", false), ("chan", true), ("cut", false)]
    );
}

#[test]
fn output_depends_only_on_source_and_seed() {
    let options = PipelineOptions::default();
    let first = compile_unit(unit("chan", CHANNEL), &options).result.expect("compiles");
    let second = compile_unit(unit("chan", CHANNEL), &options).result.expect("compiles");
    assert_eq!(first.code, second.code);

    let parallel = compile_units(vec![unit("chan", CHANNEL); 4], &options);
    for outcome in parallel {
        assert_eq!(outcome.result.expect("compiles").code, first.code);
    }
}

#[test]
fn kernkraft_backend_is_selected_by_options() {
    let options = PipelineOptions {
        backend: BackendKind::Kernkraft,
        ..PipelineOptions::default()
    };
    let compiled = compile_unit(unit("leak", LEAK), &options)
        .result
        .expect("compiles");
    assert_eq!(compiled.extension, ".kr.c");
    assert!(compiled.code.contains("Backend: C-Kernkraft"), "{}", compiled.code);
    assert!(!compiled.code.contains("nrn_init"), "{}", compiled.code);
}
