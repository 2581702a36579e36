// Arena, visitor and serialization behavior seen from outside the crate.

use mech_core::ast::json;
use mech_core::ast::nodes::{InitialBlock, Program};
use mech_core::ast::{BinaryOp, NodeType, UnaryOp};
use mech_core::span::Span;
use mech_core::visitor::json::JsonOptions;
use mech_core::visitor::{AstLookupVisitor, JsonVisitor, ModPrinter};
use mech_core::{Ast, Error, NodeId};
use pretty_assertions::assert_eq;

fn at(line: u32, column: u32) -> Span {
    Span::new(0, 0, 0, line, column)
}

/// INITIAL { LOCAL tmp  tmp = -(a + b) * 2  c = tmp ^ 2 }
fn initial_program() -> (Ast, NodeId) {
    let mut ast = Ast::new();
    let locals = ast.local_list([("tmp", None)], at(2, 5));
    let a = ast.name("a", at(3, 13));
    let b = ast.name("b", at(3, 17));
    let sum = ast.binary(BinaryOp::Add, a, b, at(3, 13));
    let negated = ast.unary(UnaryOp::Neg, sum, at(3, 11));
    let two = ast.integer(2, at(3, 22));
    let product = ast.binary(BinaryOp::Mul, negated, two, at(3, 11));
    let first = ast.assign_to("tmp", product, at(3, 5));
    let tmp = ast.name("tmp", at(4, 9));
    let two = ast.integer(2, at(4, 15));
    let power = ast.binary(BinaryOp::Pow, tmp, two, at(4, 9));
    let second = ast.assign_to("c", power, at(4, 5));
    let body = ast.statement_block(vec![locals, first, second], at(1, 9));
    let initial = ast.alloc(InitialBlock { body }, at(1, 1));
    let root = ast.root();
    ast.cast_mut::<Program>(root).unwrap().blocks.push(initial);
    (ast, initial)
}

#[test]
fn synthesized_block_prints_as_source() {
    let (ast, initial) = initial_program();
    assert_eq!(
        ModPrinter::print(&ast, initial),
        "INITIAL {\n    LOCAL tmp\n    tmp = -(a + b) * 2\n    c = tmp ^ 2\n}"
    );
}

#[test]
fn built_program_is_a_tree() {
    let (ast, _) = initial_program();
    let reachable = ast.verify_tree().unwrap();
    assert_eq!(reachable, ast.descendants(ast.root()).len());
}

#[test]
fn reusing_a_node_is_caught_with_its_location() {
    let (mut ast, initial) = initial_program();
    let body = ast.block_body(initial).unwrap();
    let statements = ast.children(body);
    let shared = statements[1];
    ast.cast_mut::<mech_core::ast::nodes::StatementBlock>(body)
        .unwrap()
        .statements
        .push(shared);
    match ast.verify_tree().unwrap_err() {
        Error::InternalInvariantViolation { pass, node_kind, span, .. } => {
            assert_eq!(pass, "verify_tree");
            assert_eq!(node_kind, "Assignment");
            assert_eq!((span.line, span.column), (3, 5));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn lookup_finds_nodes_in_source_order() {
    let (ast, _) = initial_program();
    let names: Vec<_> = AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::Name])
        .into_iter()
        .filter_map(|id| ast.cast::<mech_core::ast::nodes::Name>(id))
        .map(|name| name.name.clone())
        .collect();
    assert_eq!(names, vec!["tmp", "a", "b", "c", "tmp"]);
}

#[test]
fn json_round_trip_prints_the_same_program() {
    let (ast, _) = initial_program();
    let text = json::to_string_pretty(&ast).unwrap();
    let rebuilt = json::from_str(&text).unwrap();
    assert_eq!(
        ModPrinter::print(&rebuilt, rebuilt.root()),
        ModPrinter::print(&ast, ast.root())
    );
    assert_eq!(rebuilt.verify_tree().unwrap(), ast.verify_tree().unwrap());
}

#[test]
fn spanless_rendering_ignores_locations() {
    let (ast, initial) = initial_program();
    let (mut moved, moved_initial) = initial_program();
    for id in moved.descendants(moved.root()) {
        moved.set_span(id, Span::synthetic());
    }
    let options = JsonOptions { skip_spans: true };
    assert_eq!(
        JsonVisitor::render_with(&ast, initial, options),
        JsonVisitor::render_with(&moved, moved_initial, options)
    );
    assert_ne!(
        JsonVisitor::render(&ast, initial),
        JsonVisitor::render(&moved, moved_initial)
    );
}
