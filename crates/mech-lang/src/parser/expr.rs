//! Expressions, by precedence climbing. `^` is handled below the unary
//! operators so that `-x^2` parses as `-(x^2)`.

use mech_core::ast::{
    BinaryOp, Double, FunctionCall, IndexedName, Integer, Name, NodeId, ParenExpression,
    PrimeName, StringLit, UnaryOp,
};

use super::{PResult, Parser};
use crate::lexer::TokenKind;

impl<'t> Parser<'t> {
    pub(crate) fn expression(&mut self) -> PResult<NodeId> {
        self.binary_expression(1)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        let token = self.peek()?;
        if token.kind != TokenKind::Symbol {
            return None;
        }
        match BinaryOp::from_symbol(&token.lexeme)? {
            BinaryOp::Pow => None,
            op => Some(op),
        }
    }

    fn binary_expression(&mut self, min_prec: u8) -> PResult<NodeId> {
        let mut lhs = self.unary_expression()?;
        while let Some(op) = self.peek_binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.binary_expression(prec + 1)?;
            let span = self.ast.span(lhs).to(self.ast.span(rhs));
            lhs = self.ast.binary(op, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn unary_expression(&mut self) -> PResult<NodeId> {
        let op = if self.check_symbol("-") {
            Some(UnaryOp::Neg)
        } else if self.check_symbol("!") {
            Some(UnaryOp::Not)
        } else {
            None
        };
        let Some(op) = op else {
            return self.power_expression();
        };
        self.advance();
        let start = self.prev_span();
        let operand = self.unary_expression()?;
        let span = start.to(self.ast.span(operand));
        Ok(self.ast.unary(op, operand, span))
    }

    fn power_expression(&mut self) -> PResult<NodeId> {
        let base = self.primary()?;
        if !self.eat_symbol("^") {
            return Ok(base);
        }
        let exponent = self.unary_expression()?;
        let span = self.ast.span(base).to(self.ast.span(exponent));
        Ok(self.ast.binary(BinaryOp::Pow, base, exponent, span))
    }

    fn primary(&mut self) -> PResult<NodeId> {
        let Some(token) = self.peek() else {
            return Err(self.expected("expression"));
        };
        let span = token.span;
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                let id = match token.lexeme.parse::<i64>() {
                    Ok(value) => self.ast.alloc(Integer { value }, span),
                    Err(_) => self.ast.alloc(
                        Double {
                            value: token.lexeme.clone(),
                        },
                        span,
                    ),
                };
                Ok(id)
            }
            TokenKind::Real => {
                self.advance();
                Ok(self.ast.alloc(
                    Double {
                        value: token.lexeme.clone(),
                    },
                    span,
                ))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let value = token.lexeme.trim_matches('"').to_string();
                Ok(self.ast.alloc(StringLit { value }, span))
            }
            TokenKind::PrimeName => {
                self.advance();
                let name = token.lexeme.trim_end_matches('\'');
                let order = (token.lexeme.len() - name.len()) as u8;
                Ok(self.ast.alloc(
                    PrimeName {
                        name: name.to_string(),
                        order,
                    },
                    span,
                ))
            }
            TokenKind::Ident => {
                self.advance();
                let name = token.lexeme.clone();
                if self.check_symbol("(") {
                    let arguments = self.call_arguments()?;
                    let span = self.span_from(span);
                    return Ok(self.ast.alloc(FunctionCall { name, arguments }, span));
                }
                if self.eat_symbol("[") {
                    let index = self.expression()?;
                    self.expect_symbol("]")?;
                    let span = self.span_from(span);
                    return Ok(self.ast.alloc(IndexedName { name, index }, span));
                }
                Ok(self.ast.alloc(Name { name }, span))
            }
            TokenKind::Symbol if token.lexeme == "(" => {
                self.advance();
                let expr = self.expression()?;
                self.expect_symbol(")")?;
                let span = self.span_from(span);
                Ok(self.ast.alloc(ParenExpression { expr }, span))
            }
            _ => Err(self.expected("expression")),
        }
    }

    /// `( expr, ... )`
    pub(crate) fn call_arguments(&mut self) -> PResult<Vec<NodeId>> {
        self.expect_symbol("(")?;
        let mut arguments = Vec::new();
        if self.eat_symbol(")") {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.expression()?);
            if self.eat_symbol(",") {
                continue;
            }
            self.expect_symbol(")")?;
            return Ok(arguments);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::lex;
    use crate::parser::parse_expression;
    use mech_core::visitor::printer::ModPrinter;
    use mech_core::{Ast, NodeId, NodeKind};
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> (Ast, NodeId) {
        let tokens = lex(source).expect("lexes");
        parse_expression(&tokens).value.expect("parses")
    }

    /// Fully parenthesized rendering, to make the tree shape visible.
    fn shape(ast: &Ast, id: NodeId) -> String {
        match ast.kind(id) {
            NodeKind::BinaryExpression(b) => format!(
                "({} {} {})",
                shape(ast, b.lhs),
                b.op,
                shape(ast, b.rhs)
            ),
            NodeKind::UnaryExpression(u) => format!("({}{})", u.op.as_str(), shape(ast, u.operand)),
            _ => ModPrinter::print(ast, id),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let (ast, id) = parse("a + b * c - d");
        assert_eq!(shape(&ast, id), "((a + (b * c)) - d)");
    }

    #[test]
    fn power_is_right_associative_and_above_unary_minus() {
        let (ast, id) = parse("-x ^ 2 ^ y");
        assert_eq!(shape(&ast, id), "(-(x ^ (2 ^ y)))");
    }

    #[test]
    fn logical_and_comparison_levels() {
        let (ast, id) = parse("a < b && c >= d || !e");
        assert_eq!(shape(&ast, id), "(((a < b) && (c >= d)) || (!e))");
    }

    #[test]
    fn calls_indices_and_parentheses() {
        let (ast, id) = parse("exp(-v / 10) * g[2] + (1)");
        assert_eq!(shape(&ast, id), "((exp(-v / 10) * g[2]) + (1))");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let tokens = lex("a b").expect("lexes");
        let report = parse_expression(&tokens);
        assert!(report.value.is_none());
        assert_eq!(report.diagnostics.len(), 1);
    }
}
