//! Constructs the C backends cannot generate. Every finding is an
//! `Unsupported` diagnostic; the tree is not modified.

use crate::error::unsupported_diagnostic;
use crate::pass::{OptimizePass, PassName};
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, NodeId, NodeKind, NodeType};
use mech_core::diagnostics::Diagnostic;
use mech_core::span::Span;
use mech_core::symtab::SymbolTable;
use mech_core::visitor::AstLookupVisitor;
use mech_core::{CompilationContext, Result};

pub const SUPPORTED_METHODS: &[&str] = &["cnexp", "euler", "derivimplicit", "sparse"];

const CHECKED: &[NodeType] = &[
    NodeType::SolveBlock,
    NodeType::DiscreteBlock,
    NodeType::PartialBlock,
    NodeType::BeforeBlock,
    NodeType::AfterBlock,
    NodeType::MatchBlock,
    NodeType::ConstantBlock,
    NodeType::ConstructorBlock,
    NodeType::DestructorBlock,
    NodeType::IndependentBlock,
    NodeType::FunctionTableBlock,
    NodeType::Global,
    NodeType::Pointer,
    NodeType::BbcorePointer,
];

pub struct CompatPass;

impl OptimizePass for CompatPass {
    fn name(&self) -> PassName {
        PassName::Compat
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let table = ctx.symtab(PassName::Compat.as_str())?;
        let found = check(ast, table);
        mech_core::debug!("compat: {} incompatibilities", found.len());
        ctx.diagnostics.add_diagnostics(found);
        Ok(())
    }
}

fn diagnostic(message: String, span: Span) -> Diagnostic {
    unsupported_diagnostic(PassName::Compat, message, span)
}

fn named_block(name: &str, keyword: &str, span: Span) -> Diagnostic {
    diagnostic(
        format!("\"{name}\" {keyword} construct found at [{span}] is not handled"),
        span,
    )
}

fn unnamed_block(keyword: &str, span: Span) -> Diagnostic {
    diagnostic(format!("{keyword} construct found at [{span}] is not handled"), span)
}

fn names_of(ast: &Ast, ids: &[NodeId]) -> Vec<(String, Span)> {
    ids.iter()
        .filter_map(|&id| ast.cast::<Name>(id).map(|name| (name.name.clone(), ast.span(id))))
        .collect()
}

/// All incompatibilities of the unit, in source order.
pub fn check(ast: &Ast, table: &SymbolTable) -> Vec<Diagnostic> {
    let mut found = Vec::new();
    let mut bbcore_span = None;
    for id in AstLookupVisitor::lookup(ast, ast.root(), CHECKED) {
        let span = ast.span(id);
        match ast.kind(id) {
            NodeKind::SolveBlock(solve) => {
                if let Some(method) = &solve.method {
                    if !SUPPORTED_METHODS.contains(&method.as_str()) {
                        found.push(diagnostic(
                            format!(
                                "\"{method}\" solving method used at [{span}] not handled. \
                                 Supported methods are cnexp, euler, derivimplicit and sparse"
                            ),
                            span,
                        ));
                    }
                }
            }
            NodeKind::DiscreteBlock(block) => found.push(named_block(&block.name, "DISCRETE", span)),
            NodeKind::PartialBlock(block) => found.push(named_block(&block.name, "PARTIAL", span)),
            NodeKind::BeforeBlock(_) => found.push(unnamed_block("BEFORE", span)),
            NodeKind::AfterBlock(_) => found.push(unnamed_block("AFTER", span)),
            NodeKind::MatchBlock(_) => found.push(unnamed_block("MATCH", span)),
            NodeKind::ConstantBlock(_) => found.push(unnamed_block("CONSTANT", span)),
            NodeKind::ConstructorBlock(_) => found.push(unnamed_block("CONSTRUCTOR", span)),
            NodeKind::DestructorBlock(_) => found.push(unnamed_block("DESTRUCTOR", span)),
            NodeKind::IndependentBlock(_) => found.push(unnamed_block("INDEPENDENT", span)),
            NodeKind::FunctionTableBlock(_) => found.push(unnamed_block("FUNCTION_TABLE", span)),
            NodeKind::Global(global) => {
                for (name, at) in names_of(ast, &global.names) {
                    let written = table
                        .lookup_global(&name)
                        .is_some_and(|symbol| symbol.writes > 0);
                    if written {
                        found.push(diagnostic(
                            format!(
                                "\"{name}\" variable found at [{at}] should be defined as a \
                                 RANGE variable instead of GLOBAL to enable backend transformations"
                            ),
                            at,
                        ));
                    }
                }
            }
            NodeKind::Pointer(pointer) => {
                for (name, at) in names_of(ast, &pointer.names) {
                    found.push(diagnostic(
                        format!(
                            "\"{name}\" POINTER found at [{at}] should be defined as \
                             BBCOREPOINTER to use it in CoreNeuron"
                        ),
                        at,
                    ));
                }
            }
            NodeKind::BbcorePointer(_) => {
                bbcore_span.get_or_insert(span);
            }
            _ => {}
        }
    }

    if let Some(span) = bbcore_span {
        let tokens = verbatim_identifiers(ast);
        for function in ["bbcore_read", "bbcore_write"] {
            if !tokens.iter().any(|token| token == function) {
                found.push(diagnostic(
                    format!("\"{function}\" function not defined in any VERBATIM block"),
                    span,
                ));
            }
        }
    }
    found
}

/// C identifiers appearing in VERBATIM text.
fn verbatim_identifiers(ast: &Ast) -> Vec<String> {
    AstLookupVisitor::lookup(ast, ast.root(), &[NodeType::Verbatim])
        .into_iter()
        .filter_map(|id| ast.cast::<Verbatim>(id))
        .flat_map(|verbatim| {
            verbatim
                .text
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::symtab::SymtabVisitor;
    use pretty_assertions::assert_eq;

    fn messages(source: &str) -> Vec<String> {
        let ast = mech_lang::parse_source(source).value.expect("parses");
        let (table, _) = SymtabVisitor::build(&ast).expect("symtab");
        check(&ast, &table).into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn unknown_solve_method_is_reported() {
        let found = messages(
            "STATE { m }\nBREAKPOINT { SOLVE states METHOD runge }\nDERIVATIVE states { m' = -m }\n",
        );
        assert_eq!(
            found,
            vec!["\"runge\" solving method used at [2:14] not handled. Supported methods are \
                  cnexp, euler, derivimplicit and sparse"
                .to_string()]
        );
    }

    #[test]
    fn written_global_and_pointer_are_reported() {
        let found = messages(
            "NEURON { SUFFIX x GLOBAL g, h POINTER p }\nASSIGNED { g h p }\nINITIAL { g = 1 }\n",
        );
        assert_eq!(found.len(), 2);
        assert!(found[0].starts_with("\"g\" variable found at"));
        assert!(found[1].starts_with("\"p\" POINTER found at"));
    }

    #[test]
    fn bbcore_pointer_requires_read_and_write_functions() {
        let missing = messages("NEURON { SUFFIX x BBCOREPOINTER rng }\nASSIGNED { rng }\n");
        assert_eq!(
            missing,
            vec![
                "\"bbcore_read\" function not defined in any VERBATIM block".to_string(),
                "\"bbcore_write\" function not defined in any VERBATIM block".to_string(),
            ]
        );
        let present = messages(
            "NEURON { SUFFIX x BBCOREPOINTER rng }\nASSIGNED { rng }\n\
             VERBATIM\nstatic void bbcore_write(double* x) {}\nstatic void bbcore_read(double* x) {}\nENDVERBATIM\n",
        );
        assert!(present.is_empty());
    }
}
