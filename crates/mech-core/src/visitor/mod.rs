//! Visitor framework.
//!
//! [`AstVisitor`] is the read-only discipline: handlers inspect nodes and
//! accumulate state outside the tree. [`AstTransformer`] is the transforming
//! discipline: handlers receive the arena mutably and may overwrite child
//! slots. Both walk pre-order, depth-first, children left to right, and every
//! per-kind handler defaults to recursing into the children.

pub mod json;
pub mod lookup;
pub mod printer;

pub use json::JsonVisitor;
pub use lookup::AstLookupVisitor;
pub use printer::ModPrinter;

use crate::ast::nodes::*;
use crate::ast::{Ast, NodeId, NodeKind, NodeType};
use crate::error::Result;

macro_rules! define_visitor_traits {
    ($($variant:ident => $visit:ident, $transform:ident;)*) => {
        pub trait AstVisitor {
            /// Entry point for one node; dispatches to the per-kind handler.
            fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
                walk_node(self, ast, id)
            }

            fn visit_children(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
                for child in ast.children(id) {
                    self.visit_node(ast, child)?;
                }
                Ok(())
            }

            $(
                fn $visit(&mut self, ast: &Ast, id: NodeId, _node: &$variant) -> Result<()> {
                    self.visit_children(ast, id)
                }
            )*
        }

        /// Call the handler of `visitor` matching the kind of `id`.
        pub fn walk_node<V: AstVisitor + ?Sized>(visitor: &mut V, ast: &Ast, id: NodeId) -> Result<()> {
            match ast.kind(id) {
                $(NodeKind::$variant(node) => visitor.$visit(ast, id, node),)*
            }
        }

        pub trait AstTransformer {
            /// Entry point for one node; dispatches to the per-kind handler.
            fn transform_node(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
                walk_node_mut(self, ast, id)
            }

            /// Recurse into the children present when this call starts.
            fn transform_children(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
                for child in ast.children(id) {
                    self.transform_node(ast, child)?;
                }
                Ok(())
            }

            $(
                fn $transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
                    self.transform_children(ast, id)
                }
            )*
        }

        /// Call the handler of `transformer` matching the kind of `id`.
        pub fn walk_node_mut<T: AstTransformer + ?Sized>(
            transformer: &mut T,
            ast: &mut Ast,
            id: NodeId,
        ) -> Result<()> {
            match ast.node_type(id) {
                $(NodeType::$variant => transformer.$transform(ast, id),)*
            }
        }
    };
}

crate::for_each_node_kind!(define_visitor_traits);

/// Run a read-only visitor over the whole tree.
pub fn visit_ast<V: AstVisitor + ?Sized>(visitor: &mut V, ast: &Ast) -> Result<()> {
    visitor.visit_node(ast, ast.root())
}

/// Run a transformer over the whole tree.
pub fn transform_ast<T: AstTransformer + ?Sized>(transformer: &mut T, ast: &mut Ast) -> Result<()> {
    let root = ast.root();
    transformer.transform_node(ast, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::span::Span;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct OrderRecorder {
        seen: Vec<String>,
    }

    impl AstVisitor for OrderRecorder {
        fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
            self.seen.push(ast.node_type(id).to_string());
            walk_node(self, ast, id)
        }

        fn visit_name(&mut self, _ast: &Ast, _id: NodeId, node: &Name) -> Result<()> {
            self.seen.push(node.name.clone());
            Ok(())
        }
    }

    struct RenameTransformer;

    impl AstTransformer for RenameTransformer {
        fn transform_name(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
            if let Some(name) = ast.cast_mut::<Name>(id) {
                name.name = name.name.to_uppercase();
            }
            Ok(())
        }
    }

    fn sample() -> Ast {
        let mut ast = Ast::new();
        let s = Span::synthetic();
        let a = ast.name("a", s);
        let b = ast.name("b", s);
        let c = ast.name("c", s);
        let mul = ast.binary(BinaryOp::Mul, b, c, s);
        let sum = ast.binary(BinaryOp::Add, a, mul, s);
        let stmt = ast.expression_statement(sum, s);
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);
        ast
    }

    #[test]
    fn traversal_is_preorder_left_to_right() {
        let ast = sample();
        let mut recorder = OrderRecorder::default();
        visit_ast(&mut recorder, &ast).unwrap();
        assert_eq!(
            recorder.seen,
            vec![
                "Program",
                "ExpressionStatement",
                "BinaryExpression",
                "Name",
                "a",
                "BinaryExpression",
                "Name",
                "b",
                "Name",
                "c",
            ]
        );
    }

    #[test]
    fn transformer_reaches_every_leaf() {
        let mut ast = sample();
        transform_ast(&mut RenameTransformer, &mut ast).unwrap();
        let mut recorder = OrderRecorder::default();
        visit_ast(&mut recorder, &ast).unwrap();
        let names: Vec<_> = recorder
            .seen
            .into_iter()
            .filter(|s| s.len() == 1)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
