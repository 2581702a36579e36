// Whole-unit runs of the pass pipeline over parsed mechanisms.

use mech_core::ast::nodes::{EigenLinearSolverBlock, FunctionCall};
use mech_core::ast::NodeType;
use mech_core::diagnostics::DiagnosticKind;
use mech_core::visitor::AstLookupVisitor;
use mech_core::{Ast, CompilationContext, Error};
use mech_optimize::pass::{OptimizePass, PassName};
use mech_optimize::passes::{CodegenInfoPass, PerfPass, SymtabPass};
use mech_optimize::{PassPipeline, PipelineStatus};
use pretty_assertions::assert_eq;

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

fn parse(source: &str) -> Ast {
    mech_lang::parse_source(source).value.expect("parses")
}

fn compile(source: &str) -> (Ast, CompilationContext, PipelineStatus) {
    let mut ast = parse(source);
    let mut ctx = CompilationContext::new("chan.mod");
    let status = PassPipeline::standard()
        .run(&mut ast, &mut ctx)
        .expect("no internal error");
    (ast, ctx, status)
}

#[test]
fn full_mechanism_runs_every_pass() {
    let (ast, ctx, status) = compile(CHANNEL);
    assert_eq!(status, PipelineStatus::Completed, "{:?}", ctx.diagnostics.get_diagnostics());
    let completed: Vec<_> = ctx.completed_passes().to_vec();
    assert_eq!(completed.len(), 10);
    let info = ctx.info.as_ref().expect("codegen info");
    assert_eq!(info.mechanism_name, "chan");
    assert_eq!(info.eigen_linear_blocks, 1);
    assert!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::KineticBlock]).is_empty());
    assert!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::DiffEquation]).is_empty());
    assert!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::ReactionStatement]).is_empty());
}

#[test]
fn tree_stays_a_tree_after_every_transform() {
    let mut ast = parse(CHANNEL);
    let mut ctx = CompilationContext::new("chan.mod");
    let mut checked = Vec::new();
    PassPipeline::standard()
        .run_with(&mut ast, &mut ctx, |pass, ast| {
            ast.verify_tree()?;
            checked.push(pass);
            Ok(())
        })
        .expect("no internal error");
    assert_eq!(checked, PassPipeline::standard().pass_names());
}

#[test]
fn analyses_are_idempotent() {
    let (mut ast, mut ctx, _) = compile(CHANNEL);

    let table = ctx.symtab.clone();
    let perf = ctx.perf.clone();
    let info = ctx.info.clone();
    SymtabPass.run(&mut ast, &mut ctx).unwrap();
    PerfPass.run(&mut ast, &mut ctx).unwrap();
    CodegenInfoPass.run(&mut ast, &mut ctx).unwrap();

    assert_eq!(ctx.symtab, table);
    assert_eq!(ctx.perf, perf);
    assert_eq!(ctx.info, info);
}

#[test]
fn declared_variable_has_one_entry_and_no_errors() {
    let (_, ctx, status) = compile("ASSIGNED { x z }\nINITIAL { z = x + 1 }\n");
    assert!(status.is_completed());
    assert!(!ctx.has_errors());
    let table = ctx.symtab.as_ref().unwrap();
    let entries = table
        .scopes()
        .iter()
        .flat_map(|scope| scope.symbols())
        .filter(|symbol| symbol.name == "x")
        .count();
    assert_eq!(entries, 1);
    assert_eq!(ctx.diagnostics.count_kind(DiagnosticKind::UnresolvedSymbol), 0);
}

#[test]
fn undeclared_variable_is_reported_once_and_stops_the_unit() {
    let (_, ctx, status) = compile("ASSIGNED { z }\nINITIAL {\n    z = y + y\n}\n");
    assert_eq!(status, PipelineStatus::Stopped { after: PassName::Symtab });
    let unresolved: Vec<_> = ctx
        .diagnostics
        .get_diagnostics()
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnresolvedSymbol)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("`y`"));
    let span = unresolved[0].span.expect("located");
    assert_eq!((span.line, span.column), (3, 9));
    assert!(ctx.info.is_none());
}

#[test]
fn two_equation_linear_block_solves_once_in_source_order() {
    let (ast, ctx, _) = compile("STATE { x y }\nLINEAR sys {\n    ~ x + y = 3\n    ~ x - y = 1\n}\n");
    assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics.get_diagnostics());

    let calls: Vec<_> = AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::FunctionCall])
        .into_iter()
        .filter_map(|id| ast.cast::<FunctionCall>(id))
        .filter(|call| call.name == "solve_linear_system")
        .collect();
    assert_eq!(calls.len(), 1);

    let solvers = AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::EigenLinearSolverBlock]);
    assert_eq!(solvers.len(), 1);
    let solver = ast.cast::<EigenLinearSolverBlock>(solvers[0]).unwrap();
    assert_eq!(solver.unknowns, vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn pass_run_out_of_order_is_an_internal_error() {
    let mut ast = parse("STATE { m }\nDERIVATIVE d { m' = -m }\n");
    let mut ctx = CompilationContext::new("order.mod");
    let err = PassPipeline::from_names(&[PassName::Solve, PassName::Symtab])
        .run(&mut ast, &mut ctx)
        .unwrap_err();
    assert!(matches!(err, Error::InternalInvariantViolation { ref pass, .. } if pass == "solve"));
    assert!(ctx.completed_passes().is_empty());
}

const GUARDED_GATE: &str = r#"
NEURON { SUFFIX gate RANGE minf, mtau }
STATE { m }
ASSIGNED { minf mtau }
BREAKPOINT { SOLVE states METHOD {method} }
DERIVATIVE states {
    IF (mtau > 0) {
        m' = (minf - m) / mtau
    }
}
"#;

#[test]
fn explicit_methods_lower_odes_under_if() {
    for method in ["cnexp", "euler"] {
        let (ast, ctx, status) = compile(&GUARDED_GATE.replace("{method}", method));
        assert_eq!(status, PipelineStatus::Completed, "{method}: {:?}", ctx.diagnostics.get_diagnostics());
        assert!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::DiffEquation]).is_empty());
        assert!(ctx.info.is_some());
    }
}

#[test]
fn implicit_method_stops_on_odes_under_if() {
    let (ast, ctx, status) = compile(&GUARDED_GATE.replace("{method}", "derivimplicit"));
    assert_eq!(status, PipelineStatus::Stopped { after: PassName::Solve });
    assert_eq!(ctx.diagnostics.count_kind(DiagnosticKind::Unsupported), 1);
    let span = ctx.diagnostics.errors().next().and_then(|d| d.span).expect("located");
    assert_eq!(span.line, 8);
    assert_eq!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::DiffEquation]).len(), 1);
}

#[test]
fn reaction_inside_if_stops_the_unit() {
    let (ast, ctx, status) = compile(
        "PARAMETER { kf kb }\nSTATE { A B }\n\
         BREAKPOINT { SOLVE scheme METHOD sparse }\n\
         KINETIC scheme {\n    IF (kf > 0) {\n        ~ A <-> B (kf, kb)\n    }\n}\n",
    );
    assert_eq!(status, PipelineStatus::Stopped { after: PassName::Kinetic });
    assert_eq!(ctx.diagnostics.count_kind(DiagnosticKind::Unsupported), 1);
    assert_eq!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::KineticBlock]).len(), 1);
}

#[test]
fn undeclared_target_is_reported_where_it_is_assigned() {
    let (_, ctx, status) = compile("INITIAL {\n    w = w * 2\n}\n");
    assert_eq!(status, PipelineStatus::Stopped { after: PassName::Symtab });
    let unresolved: Vec<_> = ctx.diagnostics.errors().collect();
    assert_eq!(unresolved.len(), 1);
    let span = unresolved[0].span.expect("located");
    assert_eq!((span.line, span.column), (2, 5));
}
