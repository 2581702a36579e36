//! Builders for the lowered solver blocks shared by the LINEAR, NONLINEAR and
//! implicit derivative lowerings.

use crate::symbolic::{num, var, SymExpr};
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, BinaryOp, NodeId};
use mech_core::context::UniqueNameGenerator;
use mech_core::span::Span;

pub const SOLVER_FUNCTION: &str = "solve_linear_system";
pub const NEWTON_MAX_ITERATIONS: i64 = 50;
pub const NEWTON_TOLERANCE: &str = "1e-10";

/// Fresh local names of one solver block.
#[derive(Debug, Clone)]
pub struct SolverNames {
    pub slots: Vec<String>,
    pub jacobian: String,
    pub function: String,
}

impl SolverNames {
    pub fn fresh(names: &mut UniqueNameGenerator, unknowns: &[String]) -> Self {
        SolverNames {
            slots: unknowns.iter().map(|unknown| names.fresh(unknown)).collect(),
            jacobian: names.fresh("J"),
            function: names.fresh("F"),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// `unknown -> slot` renaming for residuals written in terms of the unknowns.
    pub fn to_slots(&self, unknowns: &[String], expr: &SymExpr) -> SymExpr {
        expr.map_vars(&|name| {
            unknowns
                .iter()
                .position(|unknown| unknown == name)
                .map(|i| var(self.slots[i].clone()))
        })
    }
}

/// One residual `r(u) = 0` with the span of the equation it came from.
#[derive(Debug, Clone)]
pub struct Residual {
    pub expr: SymExpr,
    pub span: Span,
}

/// `J[i*n+j] = dr_i/du_j` for every entry, or the index of the first
/// residual that cannot be differentiated.
fn jacobian(residuals: &[Residual], unknowns: &[String]) -> Result<Vec<Vec<SymExpr>>, usize> {
    residuals
        .iter()
        .enumerate()
        .map(|(i, residual)| {
            unknowns
                .iter()
                .map(|unknown| residual.expr.derivative(unknown).ok_or(i))
                .collect()
        })
        .collect()
}

fn assign_indexed(ast: &mut Ast, array: &str, index: usize, value: &SymExpr, span: Span) -> NodeId {
    let lhs = ast.indexed_name(array, index as i64, span);
    let rhs = value.to_ast(ast, span);
    ast.assignment(lhs, rhs, span)
}

fn assign_expr(ast: &mut Ast, target: &str, value: &SymExpr, span: Span) -> NodeId {
    let rhs = value.to_ast(ast, span);
    ast.assign_to(target, rhs, span)
}

fn solver_call(ast: &mut Ast, names: &SolverNames, span: Span) -> NodeId {
    let size = ast.integer(names.size() as i64, span);
    let jacobian = ast.name(names.jacobian.clone(), span);
    let function = ast.name(names.function.clone(), span);
    let call = ast.call(SOLVER_FUNCTION, vec![size, jacobian, function], span);
    ast.expression_statement(call, span)
}

fn system_locals(names: &SolverNames, extra: &[String]) -> Vec<(String, Option<u32>)> {
    let n = names.size() as u32;
    names
        .slots
        .iter()
        .map(|slot| (slot.clone(), None))
        .chain([
            (names.jacobian.clone(), Some(n * n)),
            (names.function.clone(), Some(n)),
        ])
        .chain(extra.iter().map(|name| (name.clone(), None)))
        .collect()
}

fn jacobian_statements(
    ast: &mut Ast,
    names: &SolverNames,
    matrix: &[Vec<SymExpr>],
    residuals: &[Residual],
) -> Vec<NodeId> {
    let n = names.size();
    let mut statements = Vec::with_capacity(n * n);
    for (i, row) in matrix.iter().enumerate() {
        for (j, entry) in row.iter().enumerate() {
            statements.push(assign_indexed(ast, &names.jacobian, i * n + j, entry, residuals[i].span));
        }
    }
    statements
}

/// Error of a linear lowering.
#[derive(Debug, Clone, PartialEq)]
pub enum LinearError {
    /// Residual at this index is not linear in the unknowns.
    NotLinear(usize),
}

/// Lower `residuals(unknowns) = 0`, linear in the unknowns, into one dense
/// solve. Returns the `EigenLinearSolverBlock`.
pub fn linear_solver_block(
    ast: &mut Ast,
    names: &SolverNames,
    unknowns: &[String],
    residuals: &[Residual],
    span: Span,
) -> Result<NodeId, LinearError> {
    let matrix = jacobian(residuals, unknowns).map_err(LinearError::NotLinear)?;
    for (i, row) in matrix.iter().enumerate() {
        if row.iter().any(|entry| entry.depends_on_any(unknowns)) {
            return Err(LinearError::NotLinear(i));
        }
    }

    let locals = ast.local_list(system_locals(names, &[]), span);
    let variable_block = ast.statement_block(vec![locals], span);

    let mut initialize = jacobian_statements(ast, names, &matrix, residuals);
    for (i, residual) in residuals.iter().enumerate() {
        let at_zero = unknowns
            .iter()
            .fold(residual.expr.clone(), |expr, unknown| expr.substitute(unknown, &num(0.0)));
        let rhs = (-at_zero).simplify();
        initialize.push(assign_indexed(ast, &names.function, i, &rhs, residual.span));
    }
    let initialize_block = ast.statement_block(initialize, span);

    let mut solve = vec![solver_call(ast, names, span)];
    for (i, slot) in names.slots.iter().enumerate() {
        let value = ast.indexed_name(names.function.clone(), i as i64, span);
        solve.push(ast.assign_to(slot.clone(), value, span));
    }
    let solve_block = ast.statement_block(solve, span);

    let update_states_block = update_block(ast, names, unknowns, span);

    Ok(ast.alloc(
        EigenLinearSolverBlock {
            unknowns: unknowns.to_vec(),
            variable_block,
            initialize_block,
            solve_block,
            update_states_block,
        },
        span,
    ))
}

fn update_block(ast: &mut Ast, names: &SolverNames, unknowns: &[String], span: Span) -> NodeId {
    let updates = unknowns
        .iter()
        .zip(&names.slots)
        .map(|(unknown, slot)| {
            let value = ast.name(slot.clone(), span);
            ast.assign_to(unknown.clone(), value, span)
        })
        .collect();
    ast.statement_block(updates, span)
}

/// Lower `residuals(slots) = 0` into a Newton iteration. The residuals are
/// already written in terms of the slots; the slots start at the unknowns'
/// current values. Returns the `EigenNewtonSolverBlock`, or the index of a
/// residual that cannot be differentiated.
pub fn newton_solver_block(
    ast: &mut Ast,
    generator: &mut UniqueNameGenerator,
    names: &SolverNames,
    unknowns: &[String],
    residuals: &[Residual],
    span: Span,
) -> Result<NodeId, usize> {
    let matrix = jacobian(residuals, &names.slots)?;
    let iteration = generator.fresh("iter");
    let error = generator.fresh("err");

    let locals = ast.local_list(system_locals(names, &[iteration.clone(), error.clone()]), span);
    let variable_block = ast.statement_block(vec![locals], span);

    let mut initialize: Vec<NodeId> = unknowns
        .iter()
        .zip(&names.slots)
        .map(|(unknown, slot)| {
            let value = ast.name(unknown.clone(), span);
            ast.assign_to(slot.clone(), value, span)
        })
        .collect();
    initialize.push(assign_expr(ast, &iteration, &num(0.0), span));
    initialize.push(assign_expr(ast, &error, &num(1.0), span));
    let initialize_block = ast.statement_block(initialize, span);

    let mut body = Vec::new();
    for (i, residual) in residuals.iter().enumerate() {
        body.push(assign_indexed(ast, &names.function, i, &residual.expr.simplify(), residual.span));
    }
    body.extend(jacobian_statements(ast, names, &matrix, residuals));
    body.push(solver_call(ast, names, span));
    for (i, slot) in names.slots.iter().enumerate() {
        let step = var(slot.clone()) - SymExpr::Indexed(names.function.clone(), Box::new(num(i as f64)));
        body.push(assign_expr(ast, slot, &step, span));
    }
    let norm = (0..names.size())
        .map(|i| {
            SymExpr::Call(
                "fabs".into(),
                vec![SymExpr::Indexed(names.function.clone(), Box::new(num(i as f64)))],
            )
        })
        .reduce(|acc, term| acc + term)
        .unwrap_or_else(|| num(0.0));
    body.push(assign_expr(ast, &error, &norm, span));
    body.push(assign_expr(ast, &iteration, &(var(iteration.clone()) + num(1.0)), span));
    let body = ast.statement_block(body, span);

    let condition = {
        let counter = ast.name(iteration.clone(), span);
        let limit = ast.integer(NEWTON_MAX_ITERATIONS, span);
        let below_limit = ast.binary(BinaryOp::Lt, counter, limit, span);
        let norm = ast.name(error.clone(), span);
        let tolerance = ast.alloc(
            Double {
                value: NEWTON_TOLERANCE.to_string(),
            },
            span,
        );
        let not_converged = ast.binary(BinaryOp::Gt, norm, tolerance, span);
        ast.binary(BinaryOp::And, below_limit, not_converged, span)
    };
    let loop_statement = ast.alloc(
        While {
            condition,
            block: body,
        },
        span,
    );
    let iteration_block = ast.statement_block(vec![loop_statement], span);

    let update_states_block = update_block(ast, names, unknowns, span);

    Ok(ast.alloc(
        EigenNewtonSolverBlock {
            unknowns: unknowns.to_vec(),
            variable_block,
            initialize_block,
            iteration_block,
            update_states_block,
        },
        span,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_core::visitor::ModPrinter;
    use pretty_assertions::assert_eq;

    fn unknowns() -> Vec<String> {
        vec!["x".into(), "y".into()]
    }

    #[test]
    fn linear_block_solves_once_and_updates_in_order() {
        let mut ast = Ast::new();
        let mut generator = UniqueNameGenerator::new(3);
        let names = SolverNames::fresh(&mut generator, &unknowns());
        let s = Span::synthetic();
        // x + y - 3 = 0, x - y - 1 = 0
        let residuals = vec![
            Residual { expr: var("x") + var("y") - num(3.0), span: s },
            Residual { expr: var("x") - var("y") - num(1.0), span: s },
        ];
        let block = linear_solver_block(&mut ast, &names, &unknowns(), &residuals, s).unwrap();
        let text = ModPrinter::print(&ast, block);
        assert_eq!(text.matches(SOLVER_FUNCTION).count(), 1);
        let first = text.find(&names.slots[0]).unwrap();
        let second = text.find(&names.slots[1]).unwrap();
        assert!(first < second);
        assert!(text.contains(&format!("{}[3] = -1.0", names.jacobian)));
        assert!(text.contains(&format!("{}[0] = 3.0", names.function)));
    }

    #[test]
    fn product_of_unknowns_is_not_linear() {
        let mut ast = Ast::new();
        let mut generator = UniqueNameGenerator::new(3);
        let names = SolverNames::fresh(&mut generator, &unknowns());
        let s = Span::synthetic();
        let residuals = vec![
            Residual { expr: var("x") * var("y"), span: s },
            Residual { expr: var("x") - var("y"), span: s },
        ];
        let err = linear_solver_block(&mut ast, &names, &unknowns(), &residuals, s).unwrap_err();
        assert_eq!(err, LinearError::NotLinear(0));
    }

    #[test]
    fn newton_block_iterates_with_one_solver_call() {
        let mut ast = Ast::new();
        let mut generator = UniqueNameGenerator::new(3);
        let names = SolverNames::fresh(&mut generator, &unknowns());
        let s = Span::synthetic();
        let residuals: Vec<_> = [var("x") * var("x") - var("y"), var("x") + var("y") - num(2.0)]
            .iter()
            .map(|expr| Residual { expr: names.to_slots(&unknowns(), expr), span: s })
            .collect();
        let block =
            newton_solver_block(&mut ast, &mut generator, &names, &unknowns(), &residuals, s).unwrap();
        let text = ModPrinter::print(&ast, block);
        assert_eq!(text.matches(SOLVER_FUNCTION).count(), 1);
        assert!(text.contains("WHILE"));
        assert!(text.contains(&format!("x = {}", names.slots[0])));
        assert_eq!(ast.cast::<EigenNewtonSolverBlock>(block).map(|b| b.unknowns.len()), Some(2));
    }
}
