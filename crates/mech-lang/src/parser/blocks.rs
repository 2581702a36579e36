//! Top-level blocks and the declaration forms that only appear in them.

use mech_core::ast::{
    AfterBlock, Argument, AssignedBlock, AssignedDefinition, BbcorePointer, BeforeBlock,
    BreakpointBlock, ConstantBlock, ConstantStatement, ConstructorBlock, DerivativeBlock,
    DestructorBlock, DiscreteBlock, Double, ElectrodeCurrent, FunctionBlock, FunctionTableBlock,
    Global, IndependentBlock, InitialBlock, Integer, KineticBlock, Limits, LinearBlock,
    MatchBlock, ModelTitle, Name, NetReceiveBlock, NeuronBlock, NodeId, NonLinearBlock,
    Nonspecific, ParamAssign, ParamBlock, PartialBlock, Pointer, ProcedureBlock, Range,
    StateBlock, StateVar, Suffix, SuffixKind, ThreadSafe, UnitBlock, UnitDef, Useion,
};
use mech_core::span::Span;

use super::{PResult, Parser};
use crate::lexer::{Keyword, TokenKind};

impl<'t> Parser<'t> {
    pub(crate) fn top_level(&mut self) -> PResult<NodeId> {
        let Some(token) = self.peek() else {
            return Err(self.expected("top-level block"));
        };
        let start = token.span;
        match token.kind {
            TokenKind::Title => {
                self.advance();
                Ok(self.ast.alloc(
                    ModelTitle {
                        title: token.lexeme.clone(),
                    },
                    start,
                ))
            }
            TokenKind::Verbatim => Ok(self.verbatim()),
            TokenKind::Keyword(keyword) if keyword.is_top_level() => {
                self.advance();
                self.top_level_block(keyword, start)
            }
            _ => Err(self.error_here(format!(
                "expected a top-level block, found {}",
                self.peek_description()
            ))),
        }
    }

    fn top_level_block(&mut self, keyword: Keyword, start: Span) -> PResult<NodeId> {
        let id = match keyword {
            Keyword::Neuron => {
                let (statements, _) = self.braced(|p| p.neuron_statement())?;
                let span = self.span_from(start);
                self.ast.alloc(NeuronBlock { statements }, span)
            }
            Keyword::Parameter => {
                let (statements, _) = self.braced(|p| p.param_assign())?;
                let span = self.span_from(start);
                self.ast.alloc(ParamBlock { statements }, span)
            }
            Keyword::State => {
                let (statements, _) = self.braced(|p| p.state_var())?;
                let span = self.span_from(start);
                self.ast.alloc(StateBlock { statements }, span)
            }
            Keyword::Assigned => {
                let (definitions, _) = self.braced(|p| p.assigned_definition())?;
                let span = self.span_from(start);
                self.ast.alloc(AssignedBlock { definitions }, span)
            }
            Keyword::Constant => {
                let (statements, _) = self.braced(|p| p.constant_statement())?;
                let span = self.span_from(start);
                self.ast.alloc(ConstantBlock { statements }, span)
            }
            Keyword::Units => {
                let (definitions, _) = self.braced(|p| p.unit_def())?;
                let span = self.span_from(start);
                self.ast.alloc(UnitBlock { definitions }, span)
            }
            Keyword::Independent => {
                let text = self.raw_braced()?;
                let span = self.span_from(start);
                self.ast.alloc(IndependentBlock { text }, span)
            }
            Keyword::Partial => {
                let name = self.block_name()?;
                let text = self.raw_braced()?;
                let span = self.span_from(start);
                self.ast.alloc(PartialBlock { name, text }, span)
            }
            Keyword::Match => {
                let text = self.raw_braced()?;
                let span = self.span_from(start);
                self.ast.alloc(MatchBlock { text }, span)
            }
            Keyword::Initial => {
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(InitialBlock { body }, span)
            }
            Keyword::Breakpoint => {
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(BreakpointBlock { body }, span)
            }
            Keyword::Constructor => {
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(ConstructorBlock { body }, span)
            }
            Keyword::Destructor => {
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(DestructorBlock { body }, span)
            }
            Keyword::Before | Keyword::After => {
                let target = self.expect_word("block to attach to")?.lexeme.clone();
                let body = self.statement_block()?;
                let span = self.span_from(start);
                if keyword == Keyword::Before {
                    self.ast.alloc(BeforeBlock { target, body }, span)
                } else {
                    self.ast.alloc(AfterBlock { target, body }, span)
                }
            }
            Keyword::Derivative => {
                let name = self.block_name()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(DerivativeBlock { name, body }, span)
            }
            Keyword::Kinetic => {
                let name = self.block_name()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(KineticBlock { name, body }, span)
            }
            Keyword::Linear => {
                let name = self.block_name()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(LinearBlock { name, body }, span)
            }
            Keyword::NonLinear => {
                let name = self.block_name()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(NonLinearBlock { name, body }, span)
            }
            Keyword::Discrete => {
                let name = self.block_name()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(DiscreteBlock { name, body }, span)
            }
            Keyword::Procedure | Keyword::Function => {
                let name = self.block_name()?;
                let arguments = self.argument_list()?;
                let unit = self.units()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                if keyword == Keyword::Procedure {
                    self.ast.alloc(
                        ProcedureBlock {
                            name,
                            arguments,
                            unit,
                            body,
                        },
                        span,
                    )
                } else {
                    self.ast.alloc(
                        FunctionBlock {
                            name,
                            arguments,
                            unit,
                            body,
                        },
                        span,
                    )
                }
            }
            Keyword::FunctionTable => {
                let name = self.block_name()?;
                let arguments = self.argument_list()?;
                let unit = self.units()?;
                let span = self.span_from(start);
                self.ast.alloc(
                    FunctionTableBlock {
                        name,
                        arguments,
                        unit,
                    },
                    span,
                )
            }
            Keyword::NetReceive => {
                let arguments = self.argument_list()?;
                let body = self.statement_block()?;
                let span = self.span_from(start);
                self.ast.alloc(NetReceiveBlock { arguments, body }, span)
            }
            other => {
                return Err(self.error_here(format!("`{other}` cannot start a top-level block")))
            }
        };
        Ok(id)
    }

    fn block_name(&mut self) -> PResult<String> {
        Ok(self.expect_ident("block name")?.lexeme.clone())
    }

    // ------------------------------------------------------------ NEURON

    fn neuron_statement(&mut self) -> PResult<NodeId> {
        let Some(token) = self.peek() else {
            return Err(self.expected("NEURON statement"));
        };
        if token.kind == TokenKind::Verbatim {
            return Ok(self.verbatim());
        }
        let Some(keyword) = token.keyword() else {
            return Err(self.expected("NEURON statement"));
        };
        let start = token.span;
        if keyword == Keyword::Represents {
            return self.ontology_statement();
        }
        self.advance();
        let id = match keyword {
            Keyword::Suffix | Keyword::PointProcess => {
                let kind = if keyword == Keyword::Suffix {
                    SuffixKind::Suffix
                } else {
                    SuffixKind::PointProcess
                };
                let name = self.expect_ident("mechanism name")?.lexeme.clone();
                let span = self.span_from(start);
                self.ast.alloc(Suffix { kind, name }, span)
            }
            Keyword::Range => {
                let names = self.name_list()?;
                let span = self.span_from(start);
                self.ast.alloc(Range { names }, span)
            }
            Keyword::Global => {
                let names = self.name_list()?;
                let span = self.span_from(start);
                self.ast.alloc(Global { names }, span)
            }
            Keyword::Pointer => {
                let names = self.name_list()?;
                let span = self.span_from(start);
                self.ast.alloc(Pointer { names }, span)
            }
            Keyword::BbcorePointer => {
                let names = self.name_list()?;
                let span = self.span_from(start);
                self.ast.alloc(BbcorePointer { names }, span)
            }
            Keyword::NonspecificCurrent => {
                let currents = self.name_list()?;
                let span = self.span_from(start);
                self.ast.alloc(Nonspecific { currents }, span)
            }
            Keyword::ElectrodeCurrent => {
                let currents = self.name_list()?;
                let span = self.span_from(start);
                self.ast.alloc(ElectrodeCurrent { currents }, span)
            }
            Keyword::ThreadSafe => {
                let names = if self.check_kind(TokenKind::Ident) {
                    self.name_list()?
                } else {
                    Vec::new()
                };
                let span = self.span_from(start);
                self.ast.alloc(ThreadSafe { names }, span)
            }
            Keyword::UseIon => {
                let ion = self.expect_ident("ion name")?.lexeme.clone();
                let reads = if self.eat_keyword(Keyword::Read) {
                    self.name_list()?
                } else {
                    Vec::new()
                };
                let writes = if self.eat_keyword(Keyword::Write) {
                    self.name_list()?
                } else {
                    Vec::new()
                };
                let valence = if self.eat_keyword(Keyword::Valence) {
                    Some(self.signed_number()?)
                } else {
                    None
                };
                let span = self.span_from(start);
                self.ast.alloc(
                    Useion {
                        ion,
                        reads,
                        writes,
                        valence,
                    },
                    span,
                )
            }
            other => {
                return Err(self.error_here(format!("`{other}` is not allowed in a NEURON block")))
            }
        };
        Ok(id)
    }

    /// `a, b, c` as `Name` nodes.
    fn name_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut names = Vec::new();
        loop {
            let token = self.expect_ident("name")?;
            names.push(self.ast.alloc(
                Name {
                    name: token.lexeme.clone(),
                },
                token.span,
            ));
            if !self.eat_symbol(",") {
                return Ok(names);
            }
        }
    }

    // ------------------------------------------------------------ declarations

    /// `-12`, `.5e3`, `+1` as a literal node.
    fn signed_number(&mut self) -> PResult<NodeId> {
        let start = self.peek().map(|t| t.span).unwrap_or_default();
        let text = self.signed_number_text()?;
        let span = self.span_from(start);
        Ok(match text.parse::<i64>() {
            Ok(value) => self.ast.alloc(Integer { value }, span),
            Err(_) => self.ast.alloc(Double { value: text }, span),
        })
    }

    fn signed_number_text(&mut self) -> PResult<String> {
        let negative = if self.eat_symbol("-") {
            true
        } else {
            self.eat_symbol("+");
            false
        };
        match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Integer | TokenKind::Real) => {
                self.advance();
                Ok(if negative {
                    format!("-{}", token.lexeme)
                } else {
                    token.lexeme.clone()
                })
            }
            _ => Err(self.expected("number")),
        }
    }

    /// `(mA/cm2)`. Adjacent words keep a separating space.
    pub(crate) fn units(&mut self) -> PResult<Option<String>> {
        if !self.check_symbol("(") {
            return Ok(None);
        }
        self.advance();
        let mut unit = String::new();
        let mut previous_word = false;
        loop {
            let Some(token) = self.peek() else {
                return Err(self.expected("`)` closing the unit"));
            };
            if token.is_symbol(")") {
                self.advance();
                return Ok(Some(unit));
            }
            let word = matches!(
                token.kind,
                TokenKind::Ident | TokenKind::Integer | TokenKind::Real | TokenKind::Keyword(_)
            );
            if word && previous_word {
                unit.push(' ');
            }
            unit.push_str(&token.lexeme);
            previous_word = word;
            self.advance();
        }
    }

    fn required_units(&mut self) -> PResult<String> {
        match self.units()? {
            Some(unit) => Ok(unit),
            None => Err(self.expected("unit in parentheses")),
        }
    }

    fn param_assign(&mut self) -> PResult<NodeId> {
        let token = self.expect_ident("parameter name")?;
        let value = if self.eat_symbol("=") {
            Some(self.signed_number()?)
        } else {
            None
        };
        let unit = self.units()?;
        let limits = if self.eat_symbol("<") {
            let lo = self.signed_number_text()?;
            self.expect_symbol(",")?;
            let hi = self.signed_number_text()?;
            self.expect_symbol(">")?;
            Some(Limits { lo, hi })
        } else {
            None
        };
        let span = self.span_from(token.span);
        Ok(self.ast.alloc(
            ParamAssign {
                name: token.lexeme.clone(),
                value,
                unit,
                limits,
            },
            span,
        ))
    }

    fn state_var(&mut self) -> PResult<NodeId> {
        let token = self.expect_ident("state variable")?;
        let unit = self.units()?;
        let span = self.span_from(token.span);
        Ok(self.ast.alloc(
            StateVar {
                name: token.lexeme.clone(),
                unit,
            },
            span,
        ))
    }

    fn assigned_definition(&mut self) -> PResult<NodeId> {
        let token = self.expect_ident("assigned variable")?;
        let length = if self.eat_symbol("[") {
            let length = self.expect_integer("array length")?;
            self.expect_symbol("]")?;
            Some(length)
        } else {
            None
        };
        let unit = self.units()?;
        let span = self.span_from(token.span);
        Ok(self.ast.alloc(
            AssignedDefinition {
                name: token.lexeme.clone(),
                length,
                unit,
            },
            span,
        ))
    }

    fn constant_statement(&mut self) -> PResult<NodeId> {
        let token = self.expect_ident("constant name")?;
        self.expect_symbol("=")?;
        let value = self.signed_number()?;
        let unit = self.units()?;
        let span = self.span_from(token.span);
        Ok(self.ast.alloc(
            ConstantStatement {
                name: token.lexeme.clone(),
                value,
                unit,
            },
            span,
        ))
    }

    /// `(mV) = (millivolt)` or `FARADAY = (faraday) (coulomb)`.
    fn unit_def(&mut self) -> PResult<NodeId> {
        let start = self.peek().map(|t| t.span).unwrap_or_default();
        let (name, from, to) = if self.check_symbol("(") {
            let from = self.required_units()?;
            self.expect_symbol("=")?;
            (None, from, self.required_units()?)
        } else {
            let name = self.expect_ident("unit name")?.lexeme.clone();
            self.expect_symbol("=")?;
            let from = if self.check_symbol("(") {
                self.required_units()?
            } else {
                self.signed_number_text()?
            };
            (Some(name), from, self.required_units()?)
        };
        let span = self.span_from(start);
        Ok(self.ast.alloc(UnitDef { name, from, to }, span))
    }

    /// `( name [units], ... )`
    fn argument_list(&mut self) -> PResult<Vec<NodeId>> {
        self.expect_symbol("(")?;
        let mut arguments = Vec::new();
        if self.eat_symbol(")") {
            return Ok(arguments);
        }
        loop {
            let token = self.expect_ident("argument name")?;
            let unit = self.units()?;
            let span = self.span_from(token.span);
            arguments.push(self.ast.alloc(
                Argument {
                    name: token.lexeme.clone(),
                    unit,
                },
                span,
            ));
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
    use crate::parser::parse_source;
    use mech_core::ast::{NodeType, ParamAssign, Suffix, SuffixKind, UnitDef, Useion};
    use mech_core::visitor::lookup::AstLookupVisitor;
    use mech_core::Ast;
    use pretty_assertions::assert_eq;

    const HH: &str = r#"
TITLE hh.mod   squid sodium, potassium, and leak channels

UNITS {
    (mA) = (milliamp)
    (mV) = (millivolt)
    FARADAY = (faraday) (coulomb)
}

NEURON {
    SUFFIX hh
    USEION na READ ena WRITE ina
    USEION ca READ cai, cao WRITE ica VALENCE 2
    NONSPECIFIC_CURRENT il
    RANGE gnabar, gl, el
    GLOBAL minf, mtau
    THREADSAFE
}

PARAMETER {
    gnabar = .12 (S/cm2) <0,1e9>
    el = -54.3 (mV)
    celsius (degC)
}

STATE { m h }

ASSIGNED {
    v (mV)
    ina (mA/cm2)
    minf mtau (ms)
    buf[4]
}

FUNCTION vtrap(x (mV), y) (mV) {
    vtrap = x / (exp(x / y) - 1)
}
"#;

    fn parse(source: &str) -> Ast {
        let report = parse_source(source);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        report.value.expect("parses")
    }

    fn find<T: mech_core::ast::NodeCast + Clone>(ast: &Ast, node_type: NodeType) -> Vec<T> {
        AstLookupVisitor::lookup(ast, ast.root(), &[node_type])
            .into_iter()
            .filter_map(|id| ast.cast::<T>(id).cloned())
            .collect()
    }

    #[test]
    fn declaration_blocks() {
        let ast = parse(HH);
        assert_eq!(ast.top_level().len(), 7);

        let suffix: Vec<Suffix> = find(&ast, NodeType::Suffix);
        assert_eq!(suffix[0].kind, SuffixKind::Suffix);
        assert_eq!(suffix[0].name, "hh");

        let ions: Vec<Useion> = find(&ast, NodeType::Useion);
        assert_eq!(ions.len(), 2);
        assert_eq!(ions[1].reads.len(), 2);
        assert!(ions[1].valence.is_some());

        let params: Vec<ParamAssign> = find(&ast, NodeType::ParamAssign);
        assert_eq!(params[0].unit.as_deref(), Some("S/cm2"));
        let limits = params[0].limits.clone().expect("limits");
        assert_eq!((limits.lo.as_str(), limits.hi.as_str()), ("0", "1e9"));
        assert!(params[2].value.is_none());

        let units: Vec<UnitDef> = find(&ast, NodeType::UnitDef);
        assert_eq!(units[2].name.as_deref(), Some("FARADAY"));
        assert_eq!(units[2].to, "coulomb");

        assert_eq!(find::<mech_core::ast::StateVar>(&ast, NodeType::StateVar).len(), 2);
        assert_eq!(find::<mech_core::ast::Argument>(&ast, NodeType::Argument).len(), 2);
    }

    #[test]
    fn assigned_names_without_units_share_a_line() {
        let ast = parse("ASSIGNED {\n  minf mtau (ms)\n}");
        let defs: Vec<mech_core::ast::AssignedDefinition> =
            find(&ast, NodeType::AssignedDefinition);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].unit, None);
        assert_eq!(defs[1].unit.as_deref(), Some("ms"));
    }

    #[test]
    fn raw_blocks_keep_their_text() {
        let ast = parse("INDEPENDENT { t FROM 0 TO 1 WITH 1 (ms) }");
        let blocks: Vec<mech_core::ast::IndependentBlock> =
            find(&ast, NodeType::IndependentBlock);
        assert_eq!(blocks[0].text, "t FROM 0 TO 1 WITH 1 ( ms )");
    }

    #[test]
    fn broken_neuron_statement_recovers() {
        let report = parse_source("NEURON {\n  SUFFIX\n  RANGE a\n  USEION na READ\n}\n");
        assert!(report.value.is_none());
        assert_eq!(report.diagnostics.len(), 2, "{:?}", report.diagnostics);
    }
}
