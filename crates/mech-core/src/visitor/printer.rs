//! Renders a subtree back to mechanism source text.

use super::AstVisitor;
use crate::ast::nodes::*;
use crate::ast::ops::UNARY_PRECEDENCE;
use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::Result;
use itertools::Itertools;

const ATOM_PRECEDENCE: u8 = 8;

#[derive(Default)]
pub struct ModPrinter {
    out: String,
    indent: usize,
    at_line_start: bool,
}

impl ModPrinter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
            at_line_start: true,
        }
    }

    /// Source text of the subtree rooted at `id`.
    pub fn print(ast: &Ast, id: NodeId) -> String {
        let mut printer = ModPrinter::new();
        // printing never fails; handlers only append text
        let _ = printer.visit_node(ast, id);
        printer.finish()
    }

    pub fn finish(self) -> String {
        self.out.trim_end().to_string()
    }

    fn write(&mut self, text: &str) {
        if self.at_line_start {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    fn open_block(&mut self) {
        self.write("{");
        self.newline();
        self.indent += 1;
    }

    fn close_block(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.write("}");
    }

    fn lines(&mut self, ast: &Ast, ids: &[NodeId]) -> Result<()> {
        for id in ids {
            self.visit_node(ast, *id)?;
            self.newline();
        }
        Ok(())
    }

    fn braced(&mut self, ast: &Ast, ids: &[NodeId]) -> Result<()> {
        self.open_block();
        self.lines(ast, ids)?;
        self.close_block();
        Ok(())
    }

    fn name_list(&mut self, ast: &Ast, ids: &[NodeId]) -> Result<()> {
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.visit_node(ast, *id)?;
        }
        Ok(())
    }

    fn keyword_list(&mut self, ast: &Ast, keyword: &str, ids: &[NodeId]) -> Result<()> {
        self.write(keyword);
        if !ids.is_empty() {
            self.write(" ");
            self.name_list(ast, ids)?;
        }
        Ok(())
    }

    fn unit(&mut self, unit: &Option<String>) {
        if let Some(unit) = unit {
            self.write(&format!(" ({unit})"));
        }
    }

    fn arguments(&mut self, ast: &Ast, ids: &[NodeId]) -> Result<()> {
        self.write("(");
        self.name_list(ast, ids)?;
        self.write(")");
        Ok(())
    }

    fn named_block(&mut self, ast: &Ast, header: &str, body: NodeId) -> Result<()> {
        self.write(header);
        self.write(" ");
        self.visit_node(ast, body)
    }

    fn raw_block(&mut self, header: &str, text: &str) {
        self.write(header);
        self.write(" {");
        self.out.push_str(text);
        self.write("}");
    }

    /// Print `id` as an operand of an operator with precedence `parent`.
    fn operand(&mut self, ast: &Ast, id: NodeId, parent: u8, needs_strict: bool) -> Result<()> {
        let own = precedence(ast, id);
        let wrap = own < parent || (needs_strict && own == parent);
        if wrap {
            self.write("(");
        }
        self.visit_node(ast, id)?;
        if wrap {
            self.write(")");
        }
        Ok(())
    }
}

/// Binding strength of the expression at `id`.
pub fn precedence(ast: &Ast, id: NodeId) -> u8 {
    match ast.kind(id) {
        NodeKind::BinaryExpression(binary) => binary.op.precedence(),
        NodeKind::UnaryExpression(_) => UNARY_PRECEDENCE,
        NodeKind::Integer(integer) if integer.value < 0 => UNARY_PRECEDENCE,
        NodeKind::Double(double) if double.value.starts_with('-') => UNARY_PRECEDENCE,
        _ => ATOM_PRECEDENCE,
    }
}

impl AstVisitor for ModPrinter {
    fn visit_program(&mut self, ast: &Ast, _id: NodeId, node: &Program) -> Result<()> {
        for (i, block) in node.blocks.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.visit_node(ast, *block)?;
            self.newline();
        }
        Ok(())
    }

    fn visit_model_title(&mut self, _ast: &Ast, _id: NodeId, node: &ModelTitle) -> Result<()> {
        self.write(&format!("TITLE {}", node.title));
        Ok(())
    }

    fn visit_neuron_block(&mut self, ast: &Ast, _id: NodeId, node: &NeuronBlock) -> Result<()> {
        self.write("NEURON ");
        self.braced(ast, &node.statements)
    }

    fn visit_suffix(&mut self, _ast: &Ast, _id: NodeId, node: &Suffix) -> Result<()> {
        let keyword = match node.kind {
            SuffixKind::Suffix => "SUFFIX",
            SuffixKind::PointProcess => "POINT_PROCESS",
        };
        self.write(&format!("{keyword} {}", node.name));
        Ok(())
    }

    fn visit_range(&mut self, ast: &Ast, _id: NodeId, node: &Range) -> Result<()> {
        self.keyword_list(ast, "RANGE", &node.names)
    }

    fn visit_global(&mut self, ast: &Ast, _id: NodeId, node: &Global) -> Result<()> {
        self.keyword_list(ast, "GLOBAL", &node.names)
    }

    fn visit_useion(&mut self, ast: &Ast, _id: NodeId, node: &Useion) -> Result<()> {
        self.write(&format!("USEION {}", node.ion));
        if !node.reads.is_empty() {
            self.write(" ");
            self.keyword_list(ast, "READ", &node.reads)?;
        }
        if !node.writes.is_empty() {
            self.write(" ");
            self.keyword_list(ast, "WRITE", &node.writes)?;
        }
        if let Some(valence) = node.valence {
            self.write(" VALENCE ");
            self.visit_node(ast, valence)?;
        }
        Ok(())
    }

    fn visit_nonspecific(&mut self, ast: &Ast, _id: NodeId, node: &Nonspecific) -> Result<()> {
        self.keyword_list(ast, "NONSPECIFIC_CURRENT", &node.currents)
    }

    fn visit_electrode_current(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ElectrodeCurrent,
    ) -> Result<()> {
        self.keyword_list(ast, "ELECTRODE_CURRENT", &node.currents)
    }

    fn visit_pointer(&mut self, ast: &Ast, _id: NodeId, node: &Pointer) -> Result<()> {
        self.keyword_list(ast, "POINTER", &node.names)
    }

    fn visit_bbcore_pointer(&mut self, ast: &Ast, _id: NodeId, node: &BbcorePointer) -> Result<()> {
        self.keyword_list(ast, "BBCOREPOINTER", &node.names)
    }

    fn visit_thread_safe(&mut self, ast: &Ast, _id: NodeId, node: &ThreadSafe) -> Result<()> {
        self.keyword_list(ast, "THREADSAFE", &node.names)
    }

    fn visit_param_block(&mut self, ast: &Ast, _id: NodeId, node: &ParamBlock) -> Result<()> {
        self.write("PARAMETER ");
        self.braced(ast, &node.statements)
    }

    fn visit_param_assign(&mut self, ast: &Ast, _id: NodeId, node: &ParamAssign) -> Result<()> {
        self.write(&node.name);
        if let Some(value) = node.value {
            self.write(" = ");
            self.visit_node(ast, value)?;
        }
        self.unit(&node.unit);
        if let Some(limits) = &node.limits {
            self.write(&format!(" <{}, {}>", limits.lo, limits.hi));
        }
        Ok(())
    }

    fn visit_state_block(&mut self, ast: &Ast, _id: NodeId, node: &StateBlock) -> Result<()> {
        self.write("STATE ");
        self.braced(ast, &node.statements)
    }

    fn visit_state_var(&mut self, _ast: &Ast, _id: NodeId, node: &StateVar) -> Result<()> {
        self.write(&node.name);
        self.unit(&node.unit);
        Ok(())
    }

    fn visit_assigned_block(&mut self, ast: &Ast, _id: NodeId, node: &AssignedBlock) -> Result<()> {
        self.write("ASSIGNED ");
        self.braced(ast, &node.definitions)
    }

    fn visit_assigned_definition(
        &mut self,
        _ast: &Ast,
        _id: NodeId,
        node: &AssignedDefinition,
    ) -> Result<()> {
        self.write(&node.name);
        if let Some(length) = node.length {
            self.write(&format!("[{length}]"));
        }
        self.unit(&node.unit);
        Ok(())
    }

    fn visit_constant_block(&mut self, ast: &Ast, _id: NodeId, node: &ConstantBlock) -> Result<()> {
        self.write("CONSTANT ");
        self.braced(ast, &node.statements)
    }

    fn visit_constant_statement(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ConstantStatement,
    ) -> Result<()> {
        self.write(&format!("{} = ", node.name));
        self.visit_node(ast, node.value)?;
        self.unit(&node.unit);
        Ok(())
    }

    fn visit_unit_block(&mut self, ast: &Ast, _id: NodeId, node: &UnitBlock) -> Result<()> {
        self.write("UNITS ");
        self.braced(ast, &node.definitions)
    }

    fn visit_unit_def(&mut self, _ast: &Ast, _id: NodeId, node: &UnitDef) -> Result<()> {
        match &node.name {
            Some(name) => self.write(&format!("{name} = ({}) ({})", node.from, node.to)),
            None => self.write(&format!("({}) = ({})", node.from, node.to)),
        }
        Ok(())
    }

    fn visit_independent_block(
        &mut self,
        _ast: &Ast,
        _id: NodeId,
        node: &IndependentBlock,
    ) -> Result<()> {
        self.raw_block("INDEPENDENT", &node.text);
        Ok(())
    }

    fn visit_argument(&mut self, _ast: &Ast, _id: NodeId, node: &Argument) -> Result<()> {
        self.write(&node.name);
        self.unit(&node.unit);
        Ok(())
    }

    fn visit_local_list(&mut self, ast: &Ast, _id: NodeId, node: &LocalList) -> Result<()> {
        self.write("LOCAL ");
        self.name_list(ast, &node.variables)
    }

    fn visit_local_var(&mut self, _ast: &Ast, _id: NodeId, node: &LocalVar) -> Result<()> {
        self.write(&node.name);
        if let Some(length) = node.length {
            self.write(&format!("[{length}]"));
        }
        Ok(())
    }

    fn visit_initial_block(&mut self, ast: &Ast, _id: NodeId, node: &InitialBlock) -> Result<()> {
        self.named_block(ast, "INITIAL", node.body)
    }

    fn visit_breakpoint_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &BreakpointBlock,
    ) -> Result<()> {
        self.named_block(ast, "BREAKPOINT", node.body)
    }

    fn visit_derivative_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &DerivativeBlock,
    ) -> Result<()> {
        self.named_block(ast, &format!("DERIVATIVE {}", node.name), node.body)
    }

    fn visit_kinetic_block(&mut self, ast: &Ast, _id: NodeId, node: &KineticBlock) -> Result<()> {
        self.named_block(ast, &format!("KINETIC {}", node.name), node.body)
    }

    fn visit_linear_block(&mut self, ast: &Ast, _id: NodeId, node: &LinearBlock) -> Result<()> {
        self.named_block(ast, &format!("LINEAR {}", node.name), node.body)
    }

    fn visit_non_linear_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &NonLinearBlock,
    ) -> Result<()> {
        self.named_block(ast, &format!("NONLINEAR {}", node.name), node.body)
    }

    fn visit_procedure_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ProcedureBlock,
    ) -> Result<()> {
        self.write(&format!("PROCEDURE {}", node.name));
        self.arguments(ast, &node.arguments)?;
        self.unit(&node.unit);
        self.write(" ");
        self.visit_node(ast, node.body)
    }

    fn visit_function_block(&mut self, ast: &Ast, _id: NodeId, node: &FunctionBlock) -> Result<()> {
        self.write(&format!("FUNCTION {}", node.name));
        self.arguments(ast, &node.arguments)?;
        self.unit(&node.unit);
        self.write(" ");
        self.visit_node(ast, node.body)
    }

    fn visit_net_receive_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &NetReceiveBlock,
    ) -> Result<()> {
        self.write("NET_RECEIVE");
        self.arguments(ast, &node.arguments)?;
        self.write(" ");
        self.visit_node(ast, node.body)
    }

    fn visit_constructor_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ConstructorBlock,
    ) -> Result<()> {
        self.named_block(ast, "CONSTRUCTOR", node.body)
    }

    fn visit_destructor_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &DestructorBlock,
    ) -> Result<()> {
        self.named_block(ast, "DESTRUCTOR", node.body)
    }

    fn visit_before_block(&mut self, ast: &Ast, _id: NodeId, node: &BeforeBlock) -> Result<()> {
        self.named_block(ast, &format!("BEFORE {}", node.target), node.body)
    }

    fn visit_after_block(&mut self, ast: &Ast, _id: NodeId, node: &AfterBlock) -> Result<()> {
        self.named_block(ast, &format!("AFTER {}", node.target), node.body)
    }

    fn visit_discrete_block(&mut self, ast: &Ast, _id: NodeId, node: &DiscreteBlock) -> Result<()> {
        self.named_block(ast, &format!("DISCRETE {}", node.name), node.body)
    }

    fn visit_partial_block(&mut self, _ast: &Ast, _id: NodeId, node: &PartialBlock) -> Result<()> {
        self.raw_block(&format!("PARTIAL {}", node.name), &node.text);
        Ok(())
    }

    fn visit_match_block(&mut self, _ast: &Ast, _id: NodeId, node: &MatchBlock) -> Result<()> {
        self.raw_block("MATCH", &node.text);
        Ok(())
    }

    fn visit_function_table_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &FunctionTableBlock,
    ) -> Result<()> {
        self.write(&format!("FUNCTION_TABLE {}", node.name));
        self.arguments(ast, &node.arguments)?;
        self.unit(&node.unit);
        Ok(())
    }

    fn visit_eigen_linear_solver_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &EigenLinearSolverBlock,
    ) -> Result<()> {
        self.open_block();
        for block in [
            node.variable_block,
            node.initialize_block,
            node.solve_block,
            node.update_states_block,
        ] {
            if let Some(statements) = ast.cast::<StatementBlock>(block) {
                self.lines(ast, &statements.statements)?;
            }
        }
        self.close_block();
        Ok(())
    }

    fn visit_eigen_newton_solver_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &EigenNewtonSolverBlock,
    ) -> Result<()> {
        self.open_block();
        for block in [
            node.variable_block,
            node.initialize_block,
            node.iteration_block,
            node.update_states_block,
        ] {
            if let Some(statements) = ast.cast::<StatementBlock>(block) {
                self.lines(ast, &statements.statements)?;
            }
        }
        self.close_block();
        Ok(())
    }

    fn visit_statement_block(&mut self, ast: &Ast, _id: NodeId, node: &StatementBlock) -> Result<()> {
        self.braced(ast, &node.statements)
    }

    fn visit_assignment(&mut self, ast: &Ast, _id: NodeId, node: &Assignment) -> Result<()> {
        self.visit_node(ast, node.lhs)?;
        self.write(" = ");
        self.visit_node(ast, node.rhs)
    }

    fn visit_diff_equation(&mut self, ast: &Ast, _id: NodeId, node: &DiffEquation) -> Result<()> {
        self.visit_node(ast, node.lhs)?;
        self.write(" = ");
        self.visit_node(ast, node.rhs)
    }

    fn visit_lin_equation(&mut self, ast: &Ast, _id: NodeId, node: &LinEquation) -> Result<()> {
        self.write("~ ");
        self.visit_node(ast, node.lhs)?;
        self.write(" = ");
        self.visit_node(ast, node.rhs)
    }

    fn visit_if(&mut self, ast: &Ast, _id: NodeId, node: &If) -> Result<()> {
        self.write("IF (");
        self.visit_node(ast, node.condition)?;
        self.write(") ");
        self.visit_node(ast, node.then_block)?;
        for else_if in &node.else_ifs {
            self.visit_node(ast, *else_if)?;
        }
        if let Some(else_block) = node.else_block {
            self.write(" ELSE ");
            self.visit_node(ast, else_block)?;
        }
        Ok(())
    }

    fn visit_else_if(&mut self, ast: &Ast, _id: NodeId, node: &ElseIf) -> Result<()> {
        self.write(" ELSE IF (");
        self.visit_node(ast, node.condition)?;
        self.write(") ");
        self.visit_node(ast, node.block)
    }

    fn visit_while(&mut self, ast: &Ast, _id: NodeId, node: &While) -> Result<()> {
        self.write("WHILE (");
        self.visit_node(ast, node.condition)?;
        self.write(") ");
        self.visit_node(ast, node.block)
    }

    fn visit_from_statement(&mut self, ast: &Ast, _id: NodeId, node: &FromStatement) -> Result<()> {
        self.write(&format!("FROM {} = ", node.variable));
        self.visit_node(ast, node.from)?;
        self.write(" TO ");
        self.visit_node(ast, node.to)?;
        if let Some(by) = node.by {
            self.write(" BY ");
            self.visit_node(ast, by)?;
        }
        self.write(" ");
        self.visit_node(ast, node.block)
    }

    fn visit_solve_block(&mut self, _ast: &Ast, _id: NodeId, node: &SolveBlock) -> Result<()> {
        self.write(&format!("SOLVE {}", node.block_name));
        if let Some(method) = &node.method {
            self.write(&format!(" METHOD {method}"));
        }
        if let Some(steadystate) = &node.steadystate {
            self.write(&format!(" STEADYSTATE {steadystate}"));
        }
        Ok(())
    }

    fn visit_reaction_statement(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ReactionStatement,
    ) -> Result<()> {
        self.write("~ ");
        for (i, react) in node.lhs.iter().enumerate() {
            if i > 0 {
                self.write(" + ");
            }
            self.visit_node(ast, *react)?;
        }
        self.write(&format!(" {} ", node.op));
        for (i, react) in node.rhs.iter().enumerate() {
            if i > 0 {
                self.write(" + ");
            }
            self.visit_node(ast, *react)?;
        }
        if !node.rhs.is_empty() {
            self.write(" ");
        }
        self.write("(");
        self.visit_node(ast, node.forward_rate)?;
        if let Some(backward) = node.backward_rate {
            self.write(", ");
            self.visit_node(ast, backward)?;
        }
        self.write(")");
        Ok(())
    }

    fn visit_react_var_name(&mut self, _ast: &Ast, _id: NodeId, node: &ReactVarName) -> Result<()> {
        match node.coefficient {
            Some(coefficient) => self.write(&format!("{coefficient} {}", node.name)),
            None => self.write(&node.name),
        }
        Ok(())
    }

    fn visit_conserve(&mut self, ast: &Ast, _id: NodeId, node: &Conserve) -> Result<()> {
        self.write("CONSERVE ");
        for (i, react) in node.react.iter().enumerate() {
            if i > 0 {
                self.write(" + ");
            }
            self.visit_node(ast, *react)?;
        }
        self.write(" = ");
        self.visit_node(ast, node.expr)
    }

    fn visit_compartment(&mut self, ast: &Ast, _id: NodeId, node: &Compartment) -> Result<()> {
        self.write("COMPARTMENT ");
        self.visit_node(ast, node.volume)?;
        self.write(" {");
        for (i, name) in node.names.iter().enumerate() {
            if i > 0 {
                self.write(" ");
            }
            self.visit_node(ast, *name)?;
        }
        self.write("}");
        Ok(())
    }

    fn visit_lag_statement(&mut self, _ast: &Ast, _id: NodeId, node: &LagStatement) -> Result<()> {
        self.write(&format!("LAG {} BY {}", node.name, node.by));
        Ok(())
    }

    fn visit_mutex_lock(&mut self, _ast: &Ast, _id: NodeId, _node: &MutexLock) -> Result<()> {
        self.write("MUTEXLOCK");
        Ok(())
    }

    fn visit_mutex_unlock(&mut self, _ast: &Ast, _id: NodeId, _node: &MutexUnlock) -> Result<()> {
        self.write("MUTEXUNLOCK");
        Ok(())
    }

    fn visit_plot_directive(&mut self, ast: &Ast, _id: NodeId, node: &PlotDirective) -> Result<()> {
        self.write("PLOT ");
        self.name_list(ast, &node.variables)?;
        self.write(" VS ");
        self.visit_node(ast, node.against)
    }

    fn visit_plot_var(&mut self, ast: &Ast, _id: NodeId, node: &PlotVar) -> Result<()> {
        self.write(&node.name);
        if let Some(index) = node.index {
            self.write("[");
            self.visit_node(ast, index)?;
            self.write("]");
        }
        Ok(())
    }

    fn visit_ontology_statement(
        &mut self,
        _ast: &Ast,
        _id: NodeId,
        node: &OntologyStatement,
    ) -> Result<()> {
        self.write(&format!("REPRESENTS \"{}\"", node.term));
        Ok(())
    }

    fn visit_verbatim(&mut self, _ast: &Ast, _id: NodeId, node: &Verbatim) -> Result<()> {
        self.write("VERBATIM");
        self.out.push_str(&node.text);
        self.out.push_str("ENDVERBATIM");
        Ok(())
    }

    fn visit_integer(&mut self, _ast: &Ast, _id: NodeId, node: &Integer) -> Result<()> {
        self.write(&node.value.to_string());
        Ok(())
    }

    fn visit_double(&mut self, _ast: &Ast, _id: NodeId, node: &Double) -> Result<()> {
        self.write(&node.value);
        Ok(())
    }

    fn visit_string_lit(&mut self, _ast: &Ast, _id: NodeId, node: &StringLit) -> Result<()> {
        self.write(&format!("\"{}\"", node.value));
        Ok(())
    }

    fn visit_name(&mut self, _ast: &Ast, _id: NodeId, node: &Name) -> Result<()> {
        self.write(&node.name);
        Ok(())
    }

    fn visit_prime_name(&mut self, _ast: &Ast, _id: NodeId, node: &PrimeName) -> Result<()> {
        let primes = "'".repeat(node.order as usize);
        self.write(&format!("{}{}", node.name, primes));
        Ok(())
    }

    fn visit_indexed_name(&mut self, ast: &Ast, _id: NodeId, node: &IndexedName) -> Result<()> {
        self.write(&format!("{}[", node.name));
        self.visit_node(ast, node.index)?;
        self.write("]");
        Ok(())
    }

    fn visit_binary_expression(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &BinaryExpression,
    ) -> Result<()> {
        let prec = node.op.precedence();
        let right_assoc = node.op.is_right_assoc();
        self.operand(ast, node.lhs, prec, right_assoc)?;
        self.write(&format!(" {} ", node.op));
        self.operand(ast, node.rhs, prec, !right_assoc)
    }

    fn visit_unary_expression(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &UnaryExpression,
    ) -> Result<()> {
        self.write(node.op.as_str());
        self.operand(ast, node.operand, UNARY_PRECEDENCE, false)
    }

    fn visit_paren_expression(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ParenExpression,
    ) -> Result<()> {
        self.write("(");
        self.visit_node(ast, node.expr)?;
        self.write(")");
        Ok(())
    }

    fn visit_function_call(&mut self, ast: &Ast, _id: NodeId, node: &FunctionCall) -> Result<()> {
        self.write(&node.name);
        self.arguments(ast, &node.arguments)
    }
}

/// Comma separated source text of several expressions.
pub fn print_list(ast: &Ast, ids: &[NodeId]) -> String {
    ids.iter().map(|id| ModPrinter::print(ast, *id)).join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};
    use crate::span::Span;

    #[test]
    fn synthesized_expressions_get_parentheses() {
        let mut ast = Ast::new();
        let s = Span::synthetic();
        let a = ast.name("a", s);
        let b = ast.name("b", s);
        let c = ast.name("c", s);
        let sum = ast.binary(BinaryOp::Add, a, b, s);
        let product = ast.binary(BinaryOp::Mul, sum, c, s);
        assert_eq!(ModPrinter::print(&ast, product), "(a + b) * c");
    }

    #[test]
    fn right_operand_of_subtraction_keeps_grouping() {
        let mut ast = Ast::new();
        let s = Span::synthetic();
        let a = ast.name("a", s);
        let b = ast.name("b", s);
        let c = ast.name("c", s);
        let inner = ast.binary(BinaryOp::Sub, b, c, s);
        let outer = ast.binary(BinaryOp::Sub, a, inner, s);
        assert_eq!(ModPrinter::print(&ast, outer), "a - (b - c)");
    }

    #[test]
    fn negated_base_of_power_is_wrapped() {
        let mut ast = Ast::new();
        let s = Span::synthetic();
        let x = ast.name("x", s);
        let neg = ast.unary(UnaryOp::Neg, x, s);
        let two = ast.integer(2, s);
        let pow = ast.binary(BinaryOp::Pow, neg, two, s);
        assert_eq!(ModPrinter::print(&ast, pow), "(-x) ^ 2");
    }
}
