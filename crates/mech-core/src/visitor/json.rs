//! Nested key-value rendering of a subtree.
//!
//! Every node becomes
//! `{"type": <kind>, "span": {...}, "fields": {...}, "children": [...]}`.
//! `fields` is the node payload with each child slot replaced by the
//! position of that child in `children`, so the object can be turned back
//! into an arena by [`crate::ast::json::from_value`].

use super::{walk_node, AstVisitor};
use crate::ast::{Ast, NodeId};
use crate::error::Result;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOptions {
    /// Omit spans for a compact, location-independent rendering.
    pub skip_spans: bool,
}

#[derive(Default)]
pub struct JsonVisitor {
    options: JsonOptions,
    stack: Vec<(Map<String, Value>, Vec<Value>)>,
    result: Option<Value>,
}

impl JsonVisitor {
    pub fn new(options: JsonOptions) -> Self {
        Self {
            options,
            stack: Vec::new(),
            result: None,
        }
    }

    /// Render the subtree rooted at `id`.
    pub fn render(ast: &Ast, id: NodeId) -> Value {
        Self::render_with(ast, id, JsonOptions::default())
    }

    pub fn render_with(ast: &Ast, id: NodeId, options: JsonOptions) -> Value {
        let mut visitor = JsonVisitor::new(options);
        // the handler below never returns an error
        let _ = visitor.visit_node(ast, id);
        visitor.result.unwrap_or(Value::Null)
    }

    fn header(&self, ast: &Ast, id: NodeId) -> Map<String, Value> {
        let node = ast.node(id);
        let mut object = Map::new();
        object.insert("type".into(), Value::String(node.kind.kind_name().into()));
        if !self.options.skip_spans {
            let span = serde_json::to_value(node.span).unwrap_or(Value::Null);
            object.insert("span".into(), span);
        }
        object.insert("fields".into(), payload_fields(ast, id));
        object
    }
}

/// Payload of `id` with child slots renumbered to child positions. Falls back
/// to an empty object if the payload cannot be represented.
fn payload_fields(ast: &Ast, id: NodeId) -> Value {
    let mut kind = ast.kind(id).clone();
    let mut position = 0u32;
    kind.for_each_child_mut(&mut |slot| {
        *slot = NodeId::from_index(position);
        position += 1;
    });
    match serde_json::to_value(&kind) {
        Ok(Value::Object(mut tagged)) => tagged
            .remove(kind.kind_name())
            .unwrap_or_else(|| json!({})),
        _ => json!({}),
    }
}

impl AstVisitor for JsonVisitor {
    fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
        let header = self.header(ast, id);
        self.stack.push((header, Vec::new()));
        walk_node(self, ast, id)?;
        let Some((mut object, children)) = self.stack.pop() else {
            return Ok(());
        };
        object.insert("children".into(), Value::Array(children));
        let value = Value::Object(object);
        match self.stack.last_mut() {
            Some((_, siblings)) => siblings.push(value),
            None => self.result = Some(value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Program};
    use crate::span::Span;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_nested_children_with_positions() {
        let mut ast = Ast::new();
        let s = Span::synthetic();
        let a = ast.name("a", s);
        let one = ast.integer(1, s);
        let sum = ast.binary(BinaryOp::Add, a, one, s);
        let value = JsonVisitor::render_with(&ast, sum, JsonOptions { skip_spans: true });
        assert_eq!(
            value,
            json!({
                "type": "BinaryExpression",
                "fields": {"op": "Add", "lhs": 0, "rhs": 1},
                "children": [
                    {"type": "Name", "fields": {"name": "a"}, "children": []},
                    {"type": "Integer", "fields": {"value": 1}, "children": []},
                ]
            })
        );
    }

    #[test]
    fn rendering_is_pure() {
        let mut ast = Ast::new();
        let s = Span::new(0, 0, 1, 1, 1);
        let a = ast.name("a", s);
        let stmt = ast.expression_statement(a, s);
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);
        let before = ast.clone();
        let first = JsonVisitor::render(&ast, root);
        let second = JsonVisitor::render(&ast, root);
        assert_eq!(first, second);
        assert_eq!(ast, before);
    }
}
