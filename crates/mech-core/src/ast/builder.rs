use super::nodes::*;
use super::ops::{BinaryOp, UnaryOp};
use super::{Ast, NodeId};
use crate::span::Span;

/// Constructors for nodes synthesized by transform passes.
impl Ast {
    pub fn name(&mut self, name: impl Into<String>, span: Span) -> NodeId {
        self.alloc(Name { name: name.into() }, span)
    }

    pub fn indexed_name(&mut self, name: impl Into<String>, index: i64, span: Span) -> NodeId {
        let index = self.integer(index, span);
        self.alloc(
            IndexedName {
                name: name.into(),
                index,
            },
            span,
        )
    }

    pub fn integer(&mut self, value: i64, span: Span) -> NodeId {
        self.alloc(Integer { value }, span)
    }

    pub fn double(&mut self, value: f64, span: Span) -> NodeId {
        self.alloc(Double::from_f64(value), span)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId, span: Span) -> NodeId {
        self.alloc(BinaryExpression { op, lhs, rhs }, span)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId, span: Span) -> NodeId {
        self.alloc(UnaryExpression { op, operand }, span)
    }

    pub fn call(&mut self, name: impl Into<String>, arguments: Vec<NodeId>, span: Span) -> NodeId {
        self.alloc(
            FunctionCall {
                name: name.into(),
                arguments,
            },
            span,
        )
    }

    /// `lhs = rhs` as a statement.
    pub fn assignment(&mut self, lhs: NodeId, rhs: NodeId, span: Span) -> NodeId {
        self.alloc(Assignment { lhs, rhs }, span)
    }

    /// `name = rhs` as a statement.
    pub fn assign_to(&mut self, name: impl Into<String>, rhs: NodeId, span: Span) -> NodeId {
        let lhs = self.name(name, span);
        self.assignment(lhs, rhs, span)
    }

    pub fn expression_statement(&mut self, expression: NodeId, span: Span) -> NodeId {
        self.alloc(ExpressionStatement { expression }, span)
    }

    pub fn statement_block(&mut self, statements: Vec<NodeId>, span: Span) -> NodeId {
        self.alloc(StatementBlock { statements }, span)
    }

    /// `LOCAL a, b[4], ...`
    pub fn local_list<S: Into<String>>(
        &mut self,
        variables: impl IntoIterator<Item = (S, Option<u32>)>,
        span: Span,
    ) -> NodeId {
        let variables = variables
            .into_iter()
            .map(|(name, length)| {
                self.alloc(
                    LocalVar {
                        name: name.into(),
                        length,
                    },
                    span,
                )
            })
            .collect();
        self.alloc(LocalList { variables }, span)
    }
}
