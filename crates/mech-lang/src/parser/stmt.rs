use mech_core::ast::{
    Assignment, Compartment, Conserve, DiffEquation, ElseIf, ExpressionStatement, FromStatement,
    If, LagStatement, LinEquation, LocalList, LocalVar, MutexLock, MutexUnlock, Name, NodeId,
    NodeKind, OntologyStatement, PlotDirective, PlotVar, ReactVarName, ReactionOp,
    ReactionStatement, SolveBlock, Verbatim, While,
};

use super::{PResult, Parser};
use crate::lexer::{Keyword, TokenKind};

impl<'t> Parser<'t> {
    /// `{ statement* }`
    pub(crate) fn statement_block(&mut self) -> PResult<NodeId> {
        let (statements, open) = self.braced(|p| p.statement())?;
        let span = self.span_from(open);
        Ok(self.ast.statement_block(statements, span))
    }

    pub(crate) fn statement(&mut self) -> PResult<NodeId> {
        let Some(token) = self.peek() else {
            return Err(self.expected("statement"));
        };
        match token.kind {
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::Local => self.local_statement(),
                Keyword::If => self.if_statement(),
                Keyword::While => self.while_statement(),
                Keyword::From => self.from_statement(),
                Keyword::Solve => self.solve_statement(),
                Keyword::Conserve => self.conserve_statement(),
                Keyword::Compartment => self.compartment_statement(),
                Keyword::Lag => self.lag_statement(),
                Keyword::MutexLock => {
                    self.advance();
                    Ok(self.ast.alloc(MutexLock {}, token.span))
                }
                Keyword::MutexUnlock => {
                    self.advance();
                    Ok(self.ast.alloc(MutexUnlock {}, token.span))
                }
                Keyword::Plot => self.plot_statement(),
                Keyword::Represents => self.ontology_statement(),
                _ => Err(self.expected("statement")),
            },
            TokenKind::Verbatim => Ok(self.verbatim()),
            TokenKind::PrimeName => self.diff_equation(),
            TokenKind::Symbol if token.lexeme == "~" => self.tilde_statement(),
            TokenKind::Symbol if token.lexeme == "{" => self.statement_block(),
            TokenKind::Ident => self.assignment_or_expression(),
            _ => Err(self.expected("statement")),
        }
    }

    pub(crate) fn verbatim(&mut self) -> NodeId {
        let span = self.peek().map(|t| t.span).unwrap_or_default();
        let text = self.advance().map(|t| t.lexeme.clone()).unwrap_or_default();
        self.ast.alloc(Verbatim { text }, span)
    }

    fn local_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Local)?.span;
        let mut variables = Vec::new();
        loop {
            let name = self.expect_ident("local variable name")?;
            let length = if self.eat_symbol("[") {
                let length = self.expect_integer("array length")?;
                self.expect_symbol("]")?;
                Some(length)
            } else {
                None
            };
            let span = self.span_from(name.span);
            variables.push(self.ast.alloc(
                LocalVar {
                    name: name.lexeme.clone(),
                    length,
                },
                span,
            ));
            if !self.eat_symbol(",") {
                break;
            }
        }
        let span = self.span_from(start);
        Ok(self.ast.alloc(LocalList { variables }, span))
    }

    fn diff_equation(&mut self) -> PResult<NodeId> {
        let lhs = self.expression()?;
        self.expect_symbol("=")?;
        let rhs = self.expression()?;
        let span = self.ast.span(lhs).to(self.prev_span());
        Ok(self.ast.alloc(DiffEquation { lhs, rhs }, span))
    }

    fn assignment_or_expression(&mut self) -> PResult<NodeId> {
        let lhs = self.expression()?;
        let start = self.ast.span(lhs);
        if !self.check_symbol("=") {
            let span = self.span_from(start);
            return Ok(self.ast.alloc(ExpressionStatement { expression: lhs }, span));
        }
        if !matches!(self.ast.kind(lhs), NodeKind::Name(_) | NodeKind::IndexedName(_)) {
            return Err(self.error_here("invalid assignment target"));
        }
        self.advance();
        let rhs = self.expression()?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(Assignment { lhs, rhs }, span))
    }

    /// `( expr )` around IF and WHILE conditions.
    fn condition(&mut self) -> PResult<NodeId> {
        self.expect_symbol("(")?;
        let condition = self.expression()?;
        self.expect_symbol(")")?;
        Ok(condition)
    }

    fn if_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::If)?.span;
        let condition = self.condition()?;
        let then_block = self.statement_block()?;
        let mut else_ifs = Vec::new();
        let mut else_block = None;
        while self.check_keyword(Keyword::Else) {
            let else_span = self.advance().map(|t| t.span).unwrap_or(start);
            if self.eat_keyword(Keyword::If) {
                let condition = self.condition()?;
                let block = self.statement_block()?;
                let span = self.span_from(else_span);
                else_ifs.push(self.ast.alloc(ElseIf { condition, block }, span));
            } else {
                else_block = Some(self.statement_block()?);
                break;
            }
        }
        let span = self.span_from(start);
        Ok(self.ast.alloc(
            If {
                condition,
                then_block,
                else_ifs,
                else_block,
            },
            span,
        ))
    }

    fn while_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::While)?.span;
        let condition = self.condition()?;
        let block = self.statement_block()?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(While { condition, block }, span))
    }

    fn from_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::From)?.span;
        let variable = self.expect_ident("loop variable")?.lexeme.clone();
        self.expect_symbol("=")?;
        let from = self.expression()?;
        self.expect_keyword(Keyword::To)?;
        let to = self.expression()?;
        let by = if self.eat_keyword(Keyword::By) {
            Some(self.expression()?)
        } else {
            None
        };
        let block = self.statement_block()?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(
            FromStatement {
                variable,
                from,
                to,
                by,
                block,
            },
            span,
        ))
    }

    fn solve_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Solve)?.span;
        let block_name = self.expect_ident("block name")?.lexeme.clone();
        let mut method = None;
        let mut steadystate = None;
        if self.eat_keyword(Keyword::Method) {
            method = Some(self.expect_ident("solve method")?.lexeme.clone());
        } else if self.eat_keyword(Keyword::SteadyState) {
            steadystate = Some(self.expect_ident("steady state method")?.lexeme.clone());
        }
        let span = self.span_from(start);
        Ok(self.ast.alloc(
            SolveBlock {
                block_name,
                method,
                steadystate,
            },
            span,
        ))
    }

    fn conserve_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Conserve)?.span;
        let react = self.react_list()?;
        self.expect_symbol("=")?;
        let expr = self.expression()?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(Conserve { react, expr }, span))
    }

    fn compartment_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Compartment)?.span;
        let volume = self.expression()?;
        let (names, _) = self.braced(|p| {
            let token = p.expect_ident("state name")?;
            Ok(p.ast.alloc(
                Name {
                    name: token.lexeme.clone(),
                },
                token.span,
            ))
        })?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(Compartment { volume, names }, span))
    }

    fn lag_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Lag)?.span;
        let name = self.expect_ident("lagged variable")?.lexeme.clone();
        self.expect_keyword(Keyword::By)?;
        let by = self.expect_ident("lag time")?.lexeme.clone();
        let span = self.span_from(start);
        Ok(self.ast.alloc(LagStatement { name, by }, span))
    }

    fn plot_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Plot)?.span;
        let mut variables = vec![self.plot_var()?];
        while self.eat_symbol(",") {
            variables.push(self.plot_var()?);
        }
        self.expect_keyword(Keyword::Vs)?;
        let against = self.plot_var()?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(PlotDirective { variables, against }, span))
    }

    fn plot_var(&mut self) -> PResult<NodeId> {
        let token = self.expect_ident("plot variable")?;
        let index = if self.eat_symbol("[") {
            let index = self.expression()?;
            self.expect_symbol("]")?;
            Some(index)
        } else {
            None
        };
        let span = self.span_from(token.span);
        Ok(self.ast.alloc(
            PlotVar {
                name: token.lexeme.clone(),
                index,
            },
            span,
        ))
    }

    pub(crate) fn ontology_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_keyword(Keyword::Represents)?.span;
        if !self.check_kind(TokenKind::StringLiteral) {
            return Err(self.expected("ontology term string"));
        }
        let term = self
            .advance()
            .map(|t| t.lexeme.trim_matches('"').to_string())
            .unwrap_or_default();
        let span = self.span_from(start);
        Ok(self.ast.alloc(OntologyStatement { term }, span))
    }

    // ------------------------------------------------------------ `~`

    fn tilde_statement(&mut self) -> PResult<NodeId> {
        let start = self.expect_symbol("~")?.span;
        if self.reaction_ahead() {
            return self.reaction(start);
        }
        let lhs = self.expression()?;
        self.expect_symbol("=")?;
        let rhs = self.expression()?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(LinEquation { lhs, rhs }, span))
    }

    /// Whether the statement after `~` is a reaction rather than `lhs = rhs`.
    fn reaction_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0;
        while let Some(token) = self.peek_nth(offset) {
            offset += 1;
            if token.keyword().is_some() {
                return false;
            }
            if token.kind != TokenKind::Symbol {
                continue;
            }
            match token.lexeme.as_str() {
                "(" | "[" => depth += 1,
                ")" | "]" => depth = depth.saturating_sub(1),
                "<->" | "->" | "<<" if depth == 0 => return true,
                "=" | "{" | "}" | "~" if depth == 0 => return false,
                _ => {}
            }
        }
        false
    }

    fn reaction(&mut self, start: mech_core::span::Span) -> PResult<NodeId> {
        let lhs = self.react_list()?;
        let op = match self.peek().map(|t| t.lexeme.as_str()) {
            Some("<->") => ReactionOp::Reversible,
            Some("->") => ReactionOp::Forward,
            Some("<<") => ReactionOp::Flux,
            _ => return Err(self.expected("reaction operator")),
        };
        self.advance();
        let rhs = if op == ReactionOp::Flux {
            Vec::new()
        } else {
            self.react_list()?
        };
        self.expect_symbol("(")?;
        let forward_rate = self.expression()?;
        let backward_rate = if op == ReactionOp::Reversible {
            self.expect_symbol(",")?;
            Some(self.expression()?)
        } else {
            None
        };
        self.expect_symbol(")")?;
        let span = self.span_from(start);
        Ok(self.ast.alloc(
            ReactionStatement {
                op,
                lhs,
                rhs,
                forward_rate,
                backward_rate,
            },
            span,
        ))
    }

    fn react_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut reacts = vec![self.react()?];
        while self.eat_symbol("+") {
            reacts.push(self.react()?);
        }
        Ok(reacts)
    }

    /// `[coefficient] name`
    fn react(&mut self) -> PResult<NodeId> {
        let start = self.peek().map(|t| t.span).unwrap_or_default();
        let coefficient = if self.check_kind(TokenKind::Integer) {
            Some(self.expect_integer("stoichiometric coefficient")?)
        } else {
            None
        };
        let name = self.expect_ident("reactant")?.lexeme.clone();
        let span = self.span_from(start);
        Ok(self.ast.alloc(ReactVarName { name, coefficient }, span))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_source;
    use mech_core::ast::{NodeType, ReactionOp, ReactionStatement};
    use mech_core::visitor::lookup::AstLookupVisitor;
    use mech_core::Ast;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Ast {
        let report = parse_source(source);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        report.value.expect("parses")
    }

    fn count(ast: &Ast, node_type: NodeType) -> usize {
        AstLookupVisitor::lookup(ast, ast.root(), &[node_type]).len()
    }

    #[test]
    fn control_flow_statements() {
        let ast = parse(
            "PROCEDURE p() {\n\
             LOCAL i, buf[3]\n\
             IF (v > 0) { i = 1 } ELSE IF (v < -10) { i = 2 } ELSE { i = 3 }\n\
             WHILE (i < 10) { i = i + 1 }\n\
             FROM i = 0 TO 2 BY 1 { buf[i] = i }\n\
             }",
        );
        assert_eq!(count(&ast, NodeType::If), 1);
        assert_eq!(count(&ast, NodeType::ElseIf), 1);
        assert_eq!(count(&ast, NodeType::While), 1);
        assert_eq!(count(&ast, NodeType::FromStatement), 1);
        assert_eq!(count(&ast, NodeType::LocalVar), 2);
    }

    #[test]
    fn tilde_distinguishes_reactions_from_equations() {
        let ast = parse(
            "KINETIC kin {\n~ 2 A + B <-> C (kf, kb)\n~ C -> D (k3)\n~ D << (flux)\n}\n\
             LINEAR lin {\n~ x + y = 3\n}",
        );
        let reactions = AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::ReactionStatement]);
        let ops: Vec<_> = reactions
            .iter()
            .filter_map(|id| ast.cast::<ReactionStatement>(*id))
            .map(|r| r.op)
            .collect();
        assert_eq!(
            ops,
            vec![ReactionOp::Reversible, ReactionOp::Forward, ReactionOp::Flux]
        );
        assert_eq!(count(&ast, NodeType::LinEquation), 1);
    }

    #[test]
    fn directives_and_verbatim() {
        let ast = parse(
            "BREAKPOINT {\nSOLVE states METHOD cnexp\nMUTEXLOCK\nMUTEXUNLOCK\n\
             VERBATIM\n  return 0;\nENDVERBATIM\nREPRESENTS \"NCIT:C17145\"\n}",
        );
        assert_eq!(count(&ast, NodeType::SolveBlock), 1);
        assert_eq!(count(&ast, NodeType::MutexLock), 1);
        assert_eq!(count(&ast, NodeType::Verbatim), 1);
        assert_eq!(count(&ast, NodeType::OntologyStatement), 1);
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let report = parse_source("INITIAL {\n  f(x) = 2\n}");
        assert!(report.value.is_none());
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("assignment target"));
    }
}
