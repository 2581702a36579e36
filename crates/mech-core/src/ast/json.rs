//! Reading and writing the nested JSON form produced by
//! [`JsonVisitor`](crate::visitor::JsonVisitor).

use super::{Ast, Node, NodeId, NodeKind, NodeType};
use crate::error::{Error, Result};
use crate::span::Span;
use crate::visitor::JsonVisitor;
use serde_json::{Map, Value};

/// Render the whole tree.
pub fn to_value(ast: &Ast) -> Value {
    JsonVisitor::render(ast, ast.root())
}

pub fn to_string_pretty(ast: &Ast) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_value(ast))?)
}

pub fn from_str(text: &str) -> Result<Ast> {
    let value: Value = serde_json::from_str(text)?;
    from_value(&value)
}

/// Rebuild an arena from a rendered tree. Nodes are allocated in pre-order.
/// Input whose child slots share a node is rejected.
pub fn from_value(value: &Value) -> Result<Ast> {
    let mut ast = Ast {
        nodes: Vec::new(),
        root: NodeId(0),
    };
    ast.root = build(&mut ast, value)?;
    ast.verify_tree().map_err(|err| malformed(err.to_string()))?;
    Ok(ast)
}

fn build(ast: &mut Ast, value: &Value) -> Result<NodeId> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed("node is not an object"))?;
    let type_name = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("node has no `type`"))?;
    let node_type = NodeType::from_name(type_name)
        .ok_or_else(|| malformed(format!("unknown node type `{type_name}`")))?;
    let span = match object.get("span") {
        Some(span) => serde_json::from_value::<Span>(span.clone())?,
        None => Span::synthetic(),
    };
    let fields = object
        .get("fields")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let mut tagged = Map::new();
    tagged.insert(node_type.as_str().to_string(), fields);
    let mut kind: NodeKind = serde_json::from_value(Value::Object(tagged))?;

    let slot = NodeId(ast.nodes.len() as u32);
    ast.nodes.push(Node {
        kind: kind.clone(),
        span,
    });

    let children = match object.get("children") {
        Some(Value::Array(children)) => children.as_slice(),
        _ => &[],
    };
    let mut built = Vec::with_capacity(children.len());
    for child in children {
        built.push(build(ast, child)?);
    }

    let mut failure = None;
    kind.for_each_child_mut(&mut |child| match built.get(child.index()) {
        Some(id) => *child = *id,
        None => failure = Some(child.index()),
    });
    if let Some(position) = failure {
        return Err(malformed(format!(
            "`{type_name}` refers to child {position} but has {} children",
            built.len()
        )));
    }
    ast.nodes[slot.index()].kind = kind;
    Ok(slot)
}

fn malformed(message: impl Into<String>) -> Error {
    Error::Generic(format!("malformed AST json: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Program};
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_preserves_structure() {
        let mut ast = Ast::new();
        let s = Span::new(0, 3, 4, 1, 4);
        let a = ast.name("a", s);
        let two = ast.double(2.0, s);
        let product = ast.binary(BinaryOp::Mul, a, two, s);
        let stmt = ast.expression_statement(product, s);
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);

        let rebuilt = from_value(&to_value(&ast)).unwrap();
        assert_eq!(rebuilt.compact(), ast.compact());
    }

    #[test]
    fn shared_child_slots_are_rejected() {
        let mut ast = Ast::new();
        let s = Span::new(0, 3, 4, 1, 4);
        let a = ast.name("a", s);
        let b = ast.name("b", s);
        let sum = ast.binary(BinaryOp::Add, a, b, s);
        let stmt = ast.expression_statement(sum, s);
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);

        let mut value = to_value(&ast);
        let binary = &mut value["children"][0]["children"][0];
        assert_eq!(binary["type"], "BinaryExpression");
        let lhs = binary["fields"]["lhs"].clone();
        binary["fields"]["rhs"] = lhs;

        let err = from_value(&value).unwrap_err();
        assert!(err.to_string().contains("more than one parent"), "{err}");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let value = serde_json::json!({"type": "Bogus", "children": []});
        assert!(from_value(&value).is_err());
    }
}
