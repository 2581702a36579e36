use mech_core::ast::NodeType;
use mech_core::diagnostics::DiagnosticKind;
use mech_core::visitor::json::{JsonOptions, JsonVisitor};
use mech_core::visitor::printer::ModPrinter;
use mech_lang::{lex, parse, parse_source};
use pretty_assertions::assert_eq;

const KINETIC_SOURCE: &str = r#"
NEURON {
    SUFFIX cad
    USEION ca READ ica, cai WRITE cai
    RANGE depth, taur
}

PARAMETER {
    depth = .1 (um)
    taur = 200 (ms)
    cainf = 100e-6 (mM)
}

STATE { ca (mM) }

INITIAL {
    ca = cainf
}

BREAKPOINT {
    SOLVE state METHOD cnexp
}

DERIVATIVE state {
    LOCAL drive
    drive = -(10000) * ica / (2 * 96489 * depth)
    IF (drive <= 0.) { drive = 0. }
    ca' = drive + (cainf - ca) / taur
}

KINETIC scheme {
    COMPARTMENT depth { ca }
    ~ ca << (-ica / 2)
    ~ ca <-> cab (kf, kb)
    CONSERVE ca + cab = 1
}
"#;

fn structure(source: &str) -> serde_json::Value {
    let ast = parse_source(source).value.expect("parses");
    JsonVisitor::render_with(&ast, ast.root(), JsonOptions { skip_spans: true })
}

#[test]
fn parsing_is_deterministic() {
    let tokens = lex(KINETIC_SOURCE).expect("lexes");
    let first = parse(&tokens).value.expect("parses");
    let second = parse(&tokens).value.expect("parses");
    assert_eq!(first, second);
}

#[test]
fn printed_source_parses_to_the_same_tree() {
    let ast = parse_source(KINETIC_SOURCE).value.expect("parses");
    let printed = ModPrinter::print(&ast, ast.root());
    assert_eq!(structure(KINETIC_SOURCE), structure(&printed));
}

#[test]
fn every_reachable_node_has_one_parent() {
    let ast = parse_source(KINETIC_SOURCE).value.expect("parses");
    let reachable = ast.verify_tree().expect("strict tree");
    assert_eq!(reachable, ast.descendants(ast.root()).len());
}

#[test]
fn error_list_is_deterministic() {
    let source = "INITIAL {\n  a = = 1\n}\nBREAKPOINT {\n  b = (2\n}\nFUNCTION {\n}\n";
    let first = parse_source(source);
    let second = parse_source(source);
    assert!(first.value.is_none());
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.diagnostics.len(), 3, "{:?}", first.diagnostics);
    assert!(first
        .diagnostics
        .iter()
        .all(|d| d.kind == DiagnosticKind::Syntax));
}

#[test]
fn unterminated_block_yields_single_error_at_open_brace() {
    let source = "NEURON {\n    SUFFIX leak\n}\n\nDERIVATIVE states {\n    m' = (minf - m) / mtau\n";
    let report = parse_source(source);
    assert!(report.value.is_none());
    assert_eq!(report.diagnostics.len(), 1);
    let span = report.diagnostics[0].span.expect("located");
    assert_eq!((span.line, span.column), (5, 19));
}

#[test]
fn top_level_kinds_in_source_order() {
    let ast = parse_source(KINETIC_SOURCE).value.expect("parses");
    let kinds: Vec<_> = ast
        .top_level()
        .into_iter()
        .map(|id| ast.node_type(id))
        .collect();
    assert_eq!(
        kinds,
        vec![
            NodeType::NeuronBlock,
            NodeType::ParamBlock,
            NodeType::StateBlock,
            NodeType::InitialBlock,
            NodeType::BreakpointBlock,
            NodeType::DerivativeBlock,
            NodeType::KineticBlock,
        ]
    );
}

#[test]
fn lexer_failure_is_a_syntax_diagnostic() {
    let report = parse_source("NEURON { SUFFIX a }\nVERBATIM\n int x;\n");
    assert!(report.value.is_none());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Syntax);
    assert_eq!(report.diagnostics[0].span.map(|s| s.line), Some(2));
}
