// End-to-end generation of C from parsed and lowered mechanisms.

use mech_codegen::{generate, BackendKind, CBackend, CodegenBackend, CodegenOptions, KernkraftBackend};
use mech_core::{Ast, CompilationContext, Error};
use mech_optimize::pass::PassName;
use mech_optimize::{PassPipeline, PipelineStatus};
use pretty_assertions::assert_eq;

const HH: &str = r#"
TITLE hh.mod squid sodium, potassium, and leak channels

NEURON {
    SUFFIX hh
    USEION na READ ena WRITE ina
    USEION k READ ek WRITE ik
    NONSPECIFIC_CURRENT il
    RANGE gnabar, gkbar, gl, el, gna, gk
    RANGE minf, hinf, ninf, mtau, htau, ntau
    THREADSAFE
}

PARAMETER {
    gnabar = .12 (S/cm2)
    gkbar = .036 (S/cm2)
    gl = .0003 (S/cm2)
    el = -54.3 (mV)
}

STATE { m h n }

ASSIGNED {
    v (mV)
    ena (mV)
    ek (mV)
    gna (S/cm2)
    gk (S/cm2)
    ina (mA/cm2)
    ik (mA/cm2)
    il (mA/cm2)
    minf hinf ninf
    mtau (ms) htau (ms) ntau (ms)
}

BREAKPOINT {
    SOLVE states METHOD cnexp
    gna = gnabar * m * m * m * h
    ina = gna * (v - ena)
    gk = gkbar * n ^ 4
    ik = gk * (v - ek)
    il = gl * (v - el)
}

INITIAL {
    rates(v)
    m = minf
    h = hinf
    n = ninf
}

DERIVATIVE states {
    rates(v)
    m' = (minf - m) / mtau
    h' = (hinf - h) / htau
    n' = (ninf - n) / ntau
}

PROCEDURE rates(v (mV)) {
    LOCAL alpha, beta, sum, q10
    q10 = 3 ^ ((celsius - 6.3) / 10)
    alpha = .1 * vtrap(-(v + 40), 10)
    beta = 4 * exp(-(v + 65) / 18)
    sum = alpha + beta
    mtau = 1 / (q10 * sum)
    minf = alpha / sum
    alpha = .07 * exp(-(v + 65) / 20)
    beta = 1 / (exp(-(v + 35) / 10) + 1)
    sum = alpha + beta
    htau = 1 / (q10 * sum)
    hinf = alpha / sum
    alpha = .01 * vtrap(-(v + 55), 10)
    beta = .125 * exp(-(v + 65) / 80)
    sum = alpha + beta
    ntau = 1 / (q10 * sum)
    ninf = alpha / sum
}

FUNCTION vtrap(x, y) {
    IF (fabs(x / y) < 1e-6) {
        vtrap = y * (1 - x / y / 2)
    } ELSE {
        vtrap = x / (exp(x / y) - 1)
    }
}
"#;

fn parse(source: &str) -> Ast {
    mech_lang::parse_source(source).value.expect("parses")
}

fn lower(source: &str) -> (Ast, CompilationContext) {
    let mut ast = parse(source);
    let mut ctx = CompilationContext::new("hh.mod");
    let status = PassPipeline::standard()
        .run(&mut ast, &mut ctx)
        .expect("no internal error");
    assert_eq!(status, PipelineStatus::Completed, "{:?}", ctx.diagnostics.get_diagnostics());
    (ast, ctx)
}

fn analyse_only(source: &str) -> (Ast, CompilationContext) {
    let mut ast = parse(source);
    let mut ctx = CompilationContext::new("unit.mod");
    PassPipeline::from_names(&[PassName::Symtab, PassName::Perf, PassName::CodegenInfo])
        .run(&mut ast, &mut ctx)
        .expect("no internal error");
    (ast, ctx)
}

fn has_line(code: &str, line: &str) -> bool {
    code.lines().any(|candidate| candidate.trim() == line)
}

#[test]
fn hh_generates_every_kernel() {
    let (ast, ctx) = lower(HH);
    let code = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");

    assert!(code.starts_with("/***"), "{code}");
    assert!(has_line(&code, " * Generated by mechc from hh.mod"), "{code}");
    assert!(has_line(&code, "#include <math.h>"), "{code}");
    assert!(has_line(&code, "extern double celsius;"), "{code}");
    assert!(has_line(&code, "} hh_Instance;"), "{code}");
    assert!(has_line(&code, "double* ion_ena;"), "{code}");
    assert!(has_line(&code, "double* ion_ina;"), "{code}");
    assert!(has_line(&code, "void nrn_init_hh(NrnThread* nt, Memb_list* ml, int type) {"), "{code}");
    assert!(has_line(&code, "void nrn_cur_hh(NrnThread* nt, Memb_list* ml, int type) {"), "{code}");
    assert!(has_line(&code, "void nrn_state_hh(NrnThread* nt, Memb_list* ml, int type) {"), "{code}");
    assert!(has_line(&code, "inst->ion_ina[id] = inst->gna[id] * (v - inst->ion_ena[id]);"), "{code}");
    assert!(has_line(&code, "current += inst->ion_ina[id];"), "{code}");
    assert!(has_line(&code, "current += inst->il[id];"), "{code}");
    assert!(has_line(&code, "nt->vec_rhs[node_id] -= rhs;"), "{code}");
    assert!(code.contains("exp(nt->dt * "), "{code}");
    assert!(code.contains("pow("), "{code}");
    assert!(!code.contains('^'), "{code}");
}

#[test]
fn arguments_named_like_the_context_are_renamed() {
    let (ast, ctx) = lower(HH);
    let code = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");
    assert!(
        has_line(&code, "static inline int rates(hh_Instance* inst, NrnThread* nt, int id, double v, double _lv);"),
        "{code}"
    );
    assert!(has_line(&code, "rates(inst, nt, id, v, v);"), "{code}");
    assert!(has_line(&code, "ret_vtrap = x / (exp(x / y) - 1.0);"), "{code}");
}

#[test]
fn generation_is_deterministic() {
    let (ast, ctx) = lower(HH);
    let first = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");
    let (ast, ctx) = lower(HH);
    let second = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");
    assert_eq!(first, second);
}

#[test]
fn json_round_trip_generates_identical_code() {
    let (ast, ctx) = lower(HH);
    let expected = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");

    let text = mech_core::ast::json::to_string_pretty(&ast).expect("serializes");
    let mut rebuilt = mech_core::ast::json::from_str(&text).expect("deserializes");
    let mut rebuilt_ctx = CompilationContext::new("hh.mod");
    PassPipeline::from_names(&[PassName::Symtab, PassName::Perf, PassName::CodegenInfo])
        .run(&mut rebuilt, &mut rebuilt_ctx)
        .expect("no internal error");
    let actual = generate(&rebuilt, &rebuilt_ctx, &CBackend, &CodegenOptions::default()).expect("generates");
    assert_eq!(actual, expected);
}

#[test]
fn kernkraft_uses_flat_arrays() {
    let (ast, ctx) = lower(HH);
    let backend = BackendKind::Kernkraft.create();
    let code = generate(&ast, &ctx, backend.as_ref(), &CodegenOptions::default()).expect("generates");
    assert!(code.contains("Backend: C-Kernkraft"), "{code}");
    assert!(has_line(&code, "double m[N];"), "{code}");
    assert!(has_line(&code, "for (id = start; id < end; id++) {"), "{code}");
    assert!(has_line(&code, "vec_d[id] += g;"), "{code}");
    assert!(has_line(&code, "ion_ina[id] = gna[id] * (v - ion_ena[id]);"), "{code}");
    assert!(!code.contains("nrn_init"), "{code}");
    assert!(!code.contains("inst->"), "{code}");
    assert!(!code.contains("mech_runtime.h"), "{code}");
    assert_eq!(KernkraftBackend.name(), backend.name());
}

#[test]
fn float_type_and_perf_comments_follow_options() {
    let (ast, ctx) = lower(HH);
    let options = CodegenOptions {
        float_type: "float".into(),
        emit_perf_comments: true,
    };
    let code = generate(&ast, &ctx, &CBackend, &options).expect("generates");
    assert!(has_line(&code, "float* gnabar;"), "{code}");
    assert!(code.contains("/* perf: "), "{code}");
    assert!(!code.contains("double* "), "{code}");
}

#[test]
fn unlowered_kinetic_block_is_an_internal_error() {
    let (ast, ctx) = analyse_only(
        r#"
NEURON { SUFFIX kin }
STATE { A B }
BREAKPOINT { SOLVE scheme METHOD sparse }
KINETIC scheme { ~ A <-> B (1, 2) }
"#,
    );
    let err = Error::from(
        generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect_err("must fail"),
    );
    match err {
        Error::InternalInvariantViolation { pass, node_kind, .. } => {
            assert_eq!(pass, "codegen");
            assert_eq!(node_kind, "KineticBlock");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn discrete_block_is_unsupported() {
    let (ast, ctx) = analyse_only(
        r#"
NEURON { SUFFIX disc RANGE x }
STATE { x }
DISCRETE step { x = x + 1 }
"#,
    );
    let err = Error::from(
        generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect_err("must fail"),
    );
    assert!(
        matches!(&err, Error::UnsupportedConstruct { construct, .. } if construct == "DISCRETE"),
        "{err:?}"
    );
}

#[test]
fn units_with_errors_do_not_reach_the_printer() {
    let mut ast = parse("NEURON { SUFFIX bad }\nINITIAL { y = 1 }\n");
    let mut ctx = CompilationContext::new("bad.mod");
    let status = PassPipeline::standard().run(&mut ast, &mut ctx).expect("no internal error");
    assert!(!status.is_completed());
    let err = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect_err("must fail");
    assert!(!err.is_internal());
    assert!(matches!(Error::from(err), Error::Diagnostics(diagnostics) if diagnostics.len() == 1));
}

#[test]
fn guarded_cnexp_state_update_is_generated() {
    let (ast, ctx) = lower(
        r#"
NEURON { SUFFIX gate RANGE minf, mtau }
STATE { m }
ASSIGNED { minf mtau }
BREAKPOINT { SOLVE states METHOD cnexp }
DERIVATIVE states {
    IF (mtau > 0) {
        m' = (minf - m) / mtau
    } ELSE {
        m' = 0
    }
}
"#,
    );
    let code = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");
    assert!(code.contains("void nrn_state_gate("), "{code}");
    assert!(has_line(&code, "if (inst->mtau[id] > 0.0) {"), "{code}");
    assert!(code.contains("exp(nt->dt * "), "{code}");
    assert!(!code.contains("m'"), "{code}");
}

#[test]
fn integer_division_is_floating_point_in_c() {
    let (ast, ctx) = lower(
        r#"
NEURON { SUFFIX half RANGE x }
ASSIGNED { x }
INITIAL { x = 1/2 }
"#,
    );
    let code = generate(&ast, &ctx, &CBackend, &CodegenOptions::default()).expect("generates");
    assert!(has_line(&code, "inst->x[id] = 1.0 / 2.0;"), "{code}");
}
