//! LINEAR and NONLINEAR blocks: the `~ lhs = rhs` equations are replaced by
//! one solver block placed where the first equation was. Other statements
//! keep their order. The unknowns are the STATE variables the equations
//! mention, in order of first appearance.

use crate::error::semantic_diagnostic;
use crate::opt_bail;
use crate::pass::{OptimizePass, PassName};
use crate::passes::eigen::{self, LinearError, Residual, SolverNames};
use crate::symbolic::SymExpr;
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, NodeId, NodeKind};
use mech_core::diagnostics::Diagnostic;
use mech_core::symtab::SymbolProperties;
use mech_core::{CompilationContext, Result};

pub struct LinearPass;

impl OptimizePass for LinearPass {
    fn name(&self) -> PassName {
        PassName::Linear
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let states: Vec<String> = ctx
            .symtab(PassName::Linear.as_str())?
            .globals_with(SymbolProperties::STATE)
            .into_iter()
            .map(|symbol| symbol.name.clone())
            .collect();
        let mut diagnostics = Vec::new();
        for block in ast.top_level() {
            let system = match ast.kind(block) {
                NodeKind::LinearBlock(b) => Some((SystemKind::Linear, b.name.clone(), b.body)),
                NodeKind::NonLinearBlock(b) => Some((SystemKind::NonLinear, b.name.clone(), b.body)),
                _ => None,
            };
            if let Some((kind, name, body)) = system {
                lower_block(ast, ctx, &states, kind, &name, body, &mut diagnostics)?;
            }
        }
        ctx.diagnostics.add_diagnostics(diagnostics);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemKind {
    Linear,
    NonLinear,
}

impl SystemKind {
    fn keyword(self) -> &'static str {
        match self {
            SystemKind::Linear => "LINEAR",
            SystemKind::NonLinear => "NONLINEAR",
        }
    }
}

fn error(message: String, ast: &Ast, id: NodeId) -> Diagnostic {
    semantic_diagnostic(PassName::Linear, message, ast.span(id))
}

fn lower_block(
    ast: &mut Ast,
    ctx: &mut CompilationContext,
    states: &[String],
    kind: SystemKind,
    name: &str,
    body: NodeId,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    let Some(statements) = ast.cast::<StatementBlock>(body).map(|b| b.statements.clone()) else {
        opt_bail!(PassName::Linear, ast, body, "{} body is not a statement block", kind.keyword());
    };

    let mut first_equation = None;
    let mut kept = Vec::with_capacity(statements.len());
    let mut residuals = Vec::new();
    let mut failed = false;
    for statement in statements {
        let Some(equation) = ast.cast::<LinEquation>(statement) else {
            kept.push(statement);
            continue;
        };
        first_equation.get_or_insert(kept.len());
        let (lhs, rhs) = (equation.lhs, equation.rhs);
        match (SymExpr::from_ast(ast, lhs), SymExpr::from_ast(ast, rhs)) {
            (Ok(lhs), Ok(rhs)) => residuals.push(Residual {
                expr: lhs - rhs,
                span: ast.span(statement),
            }),
            (Err(bad), _) | (_, Err(bad)) => {
                diagnostics.push(error(
                    format!("expression `{}` cannot appear in an equation", ast.node_type(bad)),
                    ast,
                    bad,
                ));
                failed = true;
            }
        }
    }
    let Some(position) = first_equation else {
        return Ok(());
    };
    if failed {
        return Ok(());
    }

    let mut unknowns: Vec<String> = Vec::new();
    for residual in &residuals {
        for variable in residual.expr.variables() {
            if states.contains(&variable) && !unknowns.contains(&variable) {
                unknowns.push(variable);
            }
        }
    }
    if unknowns.is_empty() {
        diagnostics.push(error(
            format!("{} block `{name}` has no STATE unknowns", kind.keyword()),
            ast,
            body,
        ));
        return Ok(());
    }
    if unknowns.len() != residuals.len() {
        diagnostics.push(error(
            format!(
                "{} block `{name}` has {} equations for {} unknowns",
                kind.keyword(),
                residuals.len(),
                unknowns.len()
            ),
            ast,
            body,
        ));
        return Ok(());
    }

    let span = ast.span(body);
    let names = SolverNames::fresh(&mut ctx.names, &unknowns);
    let solver = match kind {
        SystemKind::Linear => {
            match eigen::linear_solver_block(ast, &names, &unknowns, &residuals, span) {
                Ok(solver) => solver,
                Err(LinearError::NotLinear(index)) => {
                    diagnostics.push(semantic_diagnostic(
                        PassName::Linear,
                        format!("equation in LINEAR block `{name}` is not linear"),
                        residuals[index].span,
                    ));
                    return Ok(());
                }
            }
        }
        SystemKind::NonLinear => {
            let in_slots: Vec<Residual> = residuals
                .iter()
                .map(|residual| Residual {
                    expr: names.to_slots(&unknowns, &residual.expr),
                    span: residual.span,
                })
                .collect();
            match eigen::newton_solver_block(ast, &mut ctx.names, &names, &unknowns, &in_slots, span) {
                Ok(solver) => solver,
                Err(index) => {
                    diagnostics.push(semantic_diagnostic(
                        PassName::Linear,
                        format!("equation in NONLINEAR block `{name}` calls a function that cannot be differentiated"),
                        residuals[index].span,
                    ));
                    return Ok(());
                }
            }
        }
    };
    mech_core::debug!("linear: {} `{name}` lowered with {} unknowns", kind.keyword(), unknowns.len());

    kept.insert(position, solver);
    match ast.cast_mut::<StatementBlock>(body) {
        Some(block) => block.statements = kept,
        None => opt_bail!(PassName::Linear, ast, body, "{} body is not a statement block", kind.keyword()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::symtab::SymtabPass;
    use mech_core::ast::NodeType;
    use mech_core::visitor::AstLookupVisitor;
    use pretty_assertions::assert_eq;

    fn lower(source: &str) -> (Ast, CompilationContext) {
        let mut ast = mech_lang::parse_source(source).value.expect("parses");
        let mut ctx = CompilationContext::new("lin.mod");
        SymtabPass.run(&mut ast, &mut ctx).expect("symtab");
        LinearPass.run(&mut ast, &mut ctx).expect("linear");
        (ast, ctx)
    }

    #[test]
    fn linear_block_becomes_one_solver_block() {
        let (ast, ctx) = lower(
            "STATE { x y }\nLINEAR sys {\n ~ x + y = 3\n ~ x - y = 1\n}\n",
        );
        assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics.get_diagnostics());
        let solvers = AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::EigenLinearSolverBlock]);
        assert_eq!(solvers.len(), 1);
        let solver = ast.cast::<EigenLinearSolverBlock>(solvers[0]).unwrap();
        assert_eq!(solver.unknowns, vec!["x".to_string(), "y".to_string()]);
        assert!(AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::LinEquation]).is_empty());
        assert!(ast.verify_tree().is_ok());
    }

    #[test]
    fn statements_around_equations_keep_their_place() {
        let (ast, _) = lower(
            "STATE { x }\nASSIGNED { a b }\nLINEAR sys {\n a = 2\n ~ a * x = 4\n b = 1\n}\n",
        );
        let body = ast.block_body(ast.find_solvable_block("sys").unwrap()).unwrap();
        let kinds: Vec<_> = ast
            .children(body)
            .into_iter()
            .map(|id| ast.node_type(id))
            .collect();
        assert_eq!(
            kinds,
            vec![NodeType::Assignment, NodeType::EigenLinearSolverBlock, NodeType::Assignment]
        );
    }

    #[test]
    fn equation_count_must_match_unknowns() {
        let (_, ctx) = lower("STATE { x y }\nLINEAR sys { ~ x + y = 3 }\n");
        let messages: Vec<_> = ctx.diagnostics.errors().map(|d| d.message.clone()).collect();
        assert_eq!(messages, vec!["LINEAR block `sys` has 1 equations for 2 unknowns".to_string()]);
    }

    #[test]
    fn nonlinear_equation_in_linear_block_is_rejected() {
        let (_, ctx) = lower("STATE { x y }\nLINEAR sys {\n ~ x * y = 3\n ~ x = 1\n}\n");
        assert!(ctx.has_errors());
    }

    #[test]
    fn nonlinear_block_gets_newton_solver() {
        let (ast, ctx) = lower("STATE { x y }\nNONLINEAR sys {\n ~ x * y = 3\n ~ x = y + 1\n}\n");
        assert!(!ctx.has_errors());
        let solvers = AstLookupVisitor::lookup(&ast, ast.root(), &[NodeType::EigenNewtonSolverBlock]);
        assert_eq!(solvers.len(), 1);
    }
}
