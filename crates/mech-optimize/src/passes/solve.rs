//! Lowers the ODEs of every SOLVEd DERIVATIVE block with the requested
//! method. A block is lowered once, by the first SOLVE naming it.
//!
//! - `cnexp`: exact step of `x' = a*x + b` with `a`, `b` independent of `x`.
//! - `euler`: forward step through one local per state.
//! - `derivimplicit` (also the default) and `sparse`: backward Euler, solved
//!   with a Newton iteration over all states of the block.
//!
//! `cnexp` and `euler` rewrite ODEs wherever they sit in the block, including
//! IF and loop bodies. The implicit methods only take top-level ODEs.

use crate::error::{semantic_diagnostic, unsupported_diagnostic};
use crate::opt_bail;
use crate::pass::{OptimizePass, PassName};
use crate::passes::compat::SUPPORTED_METHODS;
use crate::passes::eigen::{self, Residual, SolverNames};
use crate::symbolic::{num, var, SymExpr};
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, NodeId, NodeType};
use mech_core::diagnostics::Diagnostic;
use mech_core::span::Span;
use mech_core::visitor::AstLookupVisitor;
use mech_core::{CompilationContext, Result};
use std::collections::HashMap;

pub const DEFAULT_METHOD: &str = "derivimplicit";

pub struct SolvePass;

impl OptimizePass for SolvePass {
    fn name(&self) -> PassName {
        PassName::Solve
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let mut diagnostics = Vec::new();
        let mut lowered: HashMap<NodeId, String> = HashMap::new();

        for solve in AstLookupVisitor::lookup(ast, ast.root(), &[NodeType::SolveBlock]) {
            let Some(statement) = ast.cast::<SolveBlock>(solve).cloned() else {
                continue;
            };
            let Some(block) = ast.find_solvable_block(&statement.block_name) else {
                continue;
            };
            if ast.node_type(block) != NodeType::DerivativeBlock {
                continue;
            }
            let method = statement
                .method
                .clone()
                .unwrap_or_else(|| DEFAULT_METHOD.to_string());
            let span = ast.span(solve);
            if let Some(previous) = lowered.get(&block) {
                if *previous != method {
                    diagnostics.push(
                        Diagnostic::warning(format!(
                            "DERIVATIVE `{}` is already solved with METHOD {previous}; METHOD {method} ignored",
                            statement.block_name
                        ))
                        .with_span(span)
                        .with_source_context(PassName::Solve.as_str()),
                    );
                }
                continue;
            }
            if !SUPPORTED_METHODS.contains(&method.as_str()) {
                diagnostics.push(unsupported_diagnostic(
                    PassName::Solve,
                    format!("METHOD {method} is not supported"),
                    span,
                ));
                continue;
            }
            lower_derivative(ast, ctx, block, &method, &mut diagnostics)?;
            mech_core::debug!("solve: `{}` lowered with {method}", statement.block_name);
            lowered.insert(block, method);
        }

        for block in ast.top_level() {
            let Some(derivative) = ast.cast::<DerivativeBlock>(block) else {
                continue;
            };
            let has_odes =
                !AstLookupVisitor::lookup(ast, derivative.body, &[NodeType::DiffEquation]).is_empty();
            if !lowered.contains_key(&block) && has_odes {
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "DERIVATIVE `{}` is never SOLVEd and will not be generated",
                        derivative.name
                    ))
                    .with_span(ast.span(block))
                    .with_source_context(PassName::Solve.as_str()),
                );
            }
        }

        ctx.diagnostics.add_diagnostics(diagnostics);
        Ok(())
    }
}

/// `x' = f` at statement `id`.
struct Ode {
    id: NodeId,
    state: String,
    rhs: NodeId,
    f: SymExpr,
    span: Span,
}

fn error(message: String, span: Span) -> Diagnostic {
    semantic_diagnostic(PassName::Solve, message, span)
}

fn collect_odes(
    ast: &Ast,
    equations: &[NodeId],
    repeats: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<Ode>> {
    let mut odes: Vec<Ode> = Vec::new();
    let mut ok = true;
    for &id in equations {
        let Some(equation) = ast.cast::<DiffEquation>(id) else {
            continue;
        };
        let span = ast.span(id);
        let Some(prime) = ast.cast::<PrimeName>(equation.lhs) else {
            diagnostics.push(error("left-hand side of an ODE must be `x'`".into(), span));
            ok = false;
            continue;
        };
        if prime.order != 1 {
            diagnostics.push(error(
                format!("derivative of order {} of `{}` is not supported", prime.order, prime.name),
                span,
            ));
            ok = false;
            continue;
        }
        if !repeats && odes.iter().any(|ode| ode.state == prime.name) {
            diagnostics.push(error(format!("`{}` has more than one ODE", prime.name), span));
            ok = false;
            continue;
        }
        match SymExpr::from_ast(ast, equation.rhs) {
            Ok(f) => odes.push(Ode {
                id,
                state: prime.name.clone(),
                rhs: equation.rhs,
                f,
                span,
            }),
            Err(bad) => {
                diagnostics.push(error(
                    format!("expression `{}` cannot appear in an ODE", ast.node_type(bad)),
                    ast.span(bad),
                ));
                ok = false;
            }
        }
    }
    ok.then_some(odes)
}

fn lower_derivative(
    ast: &mut Ast,
    ctx: &mut CompilationContext,
    block: NodeId,
    method: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    let Some(body) = ast.block_body(block) else {
        opt_bail!(PassName::Solve, ast, block, "DERIVATIVE block without a body");
    };
    let Some(statements) = ast.cast::<StatementBlock>(body).map(|b| b.statements.clone()) else {
        opt_bail!(PassName::Solve, ast, body, "DERIVATIVE body is not a statement block");
    };
    // pre-order, so source order
    let equations = AstLookupVisitor::lookup(ast, body, &[NodeType::DiffEquation]);
    let explicit = matches!(method, "cnexp" | "euler");
    if !explicit {
        let nested: Vec<NodeId> = equations
            .iter()
            .copied()
            .filter(|id| !statements.contains(id))
            .collect();
        if !nested.is_empty() {
            for id in nested {
                diagnostics.push(unsupported_diagnostic(
                    PassName::Solve,
                    format!("METHOD {method} needs every ODE at the top level of the DERIVATIVE block"),
                    ast.span(id),
                ));
            }
            return Ok(());
        }
    }
    let Some(odes) = collect_odes(ast, &equations, explicit, diagnostics) else {
        return Ok(());
    };
    if odes.is_empty() {
        return Ok(());
    }

    let span = ast.span(body);
    let lowered = match method {
        "cnexp" => cnexp(ast, &odes, diagnostics),
        "euler" => Some(euler(ast, ctx, &statements, &odes)),
        _ => implicit(ast, ctx, &statements, &odes, span, diagnostics),
    };
    if let Some(statements) = lowered {
        match ast.cast_mut::<StatementBlock>(body) {
            Some(block) => block.statements = statements,
            None => opt_bail!(PassName::Solve, ast, body, "DERIVATIVE body is not a statement block"),
        }
    }
    Ok(())
}

/// Rewrites the ODEs in place; the statement list is unchanged.
fn cnexp(ast: &mut Ast, odes: &[Ode], diagnostics: &mut Vec<Diagnostic>) -> Option<Vec<NodeId>> {
    let mut updates = Vec::with_capacity(odes.len());
    for ode in odes {
        let x = ode.state.as_str();
        let Some(a) = ode.f.derivative(x).filter(|a| !a.depends_on(x)) else {
            diagnostics.push(error(
                format!("ODE of `{x}` is not linear in `{x}`; METHOD cnexp needs x' = a*x + b"),
                ode.span,
            ));
            return None;
        };
        let b = ode.f.substitute(x, &num(0.0)).simplify();
        updates.push((ode, a, b));
    }
    for (ode, a, b) in updates {
        let x = var(ode.state.clone());
        let dt = var("dt");
        let step = if a.is_zero() {
            x.clone() + dt * b
        } else {
            let decay = num(1.0) - SymExpr::Call("exp".into(), vec![dt * a.clone()]);
            x.clone() + decay * (-b / a - x)
        };
        let rhs = step.to_ast(ast, ode.span);
        let lhs = ast.name(ode.state.clone(), ode.span);
        ast.replace_node(ode.id, Assignment { lhs, rhs });
    }
    None
}

/// One local derivative per state, shared by all ODEs of that state. A state
/// whose ODE sits under control flow starts from a zero derivative.
fn euler(ast: &mut Ast, ctx: &mut CompilationContext, statements: &[NodeId], odes: &[Ode]) -> Vec<NodeId> {
    let mut derivatives: Vec<(String, String, Span)> = Vec::new();
    for ode in odes {
        let derivative = match derivatives.iter().find(|(state, _, _)| *state == ode.state) {
            Some((_, derivative, _)) => derivative.clone(),
            None => {
                let derivative = ctx.names.fresh(&format!("D{}", ode.state));
                derivatives.push((ode.state.clone(), derivative.clone(), ode.span));
                derivative
            }
        };
        let lhs = ast.name(derivative, ode.span);
        ast.replace_node(ode.id, Assignment { lhs, rhs: ode.rhs });
    }

    let mut zeroed = Vec::new();
    let mut updates = Vec::with_capacity(derivatives.len());
    for (state, derivative, span) in &derivatives {
        let nested = odes
            .iter()
            .any(|ode| ode.state == *state && !statements.contains(&ode.id));
        if nested {
            let zero = ast.double(0.0, *span);
            zeroed.push(ast.assign_to(derivative.clone(), zero, *span));
        }
        let step = var(state.clone()) + var("dt") * var(derivative.clone());
        let rhs = step.to_ast(ast, *span);
        updates.push(ast.assign_to(state.clone(), rhs, *span));
    }
    let span = odes.first().map(|ode| ode.span).unwrap_or_default();
    let locals: Vec<(String, Option<u32>)> = derivatives
        .into_iter()
        .map(|(_, derivative, _)| (derivative, None))
        .collect();
    let declaration = ast.local_list(locals, span);
    std::iter::once(declaration)
        .chain(zeroed)
        .chain(statements.iter().copied())
        .chain(updates)
        .collect()
}

fn implicit(
    ast: &mut Ast,
    ctx: &mut CompilationContext,
    statements: &[NodeId],
    odes: &[Ode],
    span: Span,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<NodeId>> {
    let unknowns: Vec<String> = odes.iter().map(|ode| ode.state.clone()).collect();
    let names = SolverNames::fresh(&mut ctx.names, &unknowns);
    // s - x - dt * f(s) = 0
    let residuals: Vec<Residual> = odes
        .iter()
        .zip(&names.slots)
        .map(|(ode, slot)| Residual {
            expr: var(slot.clone()) - var(ode.state.clone()) - var("dt") * names.to_slots(&unknowns, &ode.f),
            span: ode.span,
        })
        .collect();
    let solver = match eigen::newton_solver_block(ast, &mut ctx.names, &names, &unknowns, &residuals, span) {
        Ok(solver) => solver,
        Err(index) => {
            diagnostics.push(error(
                format!("ODE of `{}` calls a function that cannot be differentiated", unknowns[index]),
                residuals[index].span,
            ));
            return None;
        }
    };

    let first = odes[0].id;
    let mut lowered = Vec::with_capacity(statements.len());
    for &statement in statements {
        if statement == first {
            lowered.push(solver);
        }
        if !odes.iter().any(|ode| ode.id == statement) {
            lowered.push(statement);
        }
    }
    Some(lowered)
}
