//! Symbol table construction.
//!
//! Program-level names (NEURON statements, variable blocks, named code
//! blocks, functions and procedures) are declared before any use is visited,
//! so a FUNCTION may be called above its definition. Uses then resolve
//! through the scope chain; every distinct unresolved name is reported once,
//! at its first use.

use crate::error::semantic_diagnostic;
use crate::pass::{OptimizePass, PassName};
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, NodeId, NodeKind};
use mech_core::diagnostics::Diagnostic;
use mech_core::span::Span;
use mech_core::symtab::{Declared, ScopeId, Symbol, SymbolProperties, SymbolTable};
use mech_core::visitor::AstVisitor;
use mech_core::{CompilationContext, Result};
use std::collections::BTreeSet;

/// Variables every mechanism can read without declaring them.
pub const BUILTIN_VARIABLES: &[&str] = &[
    "t", "dt", "v", "celsius", "area", "diam", "PI", "FARADAY", "R",
];

/// Functions provided by the C math library or the runtime.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "exp",
    "expm1",
    "log",
    "log10",
    "sqrt",
    "fabs",
    "pow",
    "sin",
    "cos",
    "tan",
    "asin",
    "acos",
    "atan",
    "atan2",
    "sinh",
    "cosh",
    "tanh",
    "floor",
    "ceil",
    "fmin",
    "fmax",
    "exprelr",
    "net_send",
    "net_event",
    "net_move",
    "at_time",
    "printf",
    "solve_linear_system",
];

pub fn is_builtin_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name)
}

pub struct SymtabPass;

impl OptimizePass for SymtabPass {
    fn name(&self) -> PassName {
        PassName::Symtab
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let (table, diagnostics) = SymtabVisitor::build(ast)?;
        ctx.names.reserve_all(
            table
                .scopes()
                .iter()
                .flat_map(|scope| scope.symbols().iter().map(|symbol| symbol.name.clone())),
        );
        mech_core::debug!(
            "symtab: {} scopes, {} symbols",
            table.scopes().len(),
            table.symbol_count()
        );
        ctx.symtab = Some(table);
        ctx.diagnostics.add_diagnostics(diagnostics);
        Ok(())
    }
}

#[derive(Default)]
pub struct SymtabVisitor {
    table: SymbolTable,
    scopes: Vec<ScopeId>,
    diagnostics: Vec<Diagnostic>,
    unresolved: BTreeSet<String>,
}

impl SymtabVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh table for the whole tree.
    pub fn build(ast: &Ast) -> Result<(SymbolTable, Vec<Diagnostic>)> {
        let mut visitor = SymtabVisitor::new();
        visitor.visit_node(ast, ast.root())?;
        Ok((visitor.table, visitor.diagnostics))
    }

    fn current(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or(ScopeId(0))
    }

    fn open_scope(&mut self, ast: &Ast, id: NodeId) -> ScopeId {
        let parent = self.scopes.last().copied();
        let scope = self.table.push_scope(parent, Some(id), ast.node_type(id));
        self.scopes.push(scope);
        scope
    }

    fn close_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, scope: ScopeId, symbol: Symbol) {
        let name = symbol.name.clone();
        let span = symbol.span;
        if let Declared::Duplicate(first) = self.table.declare(scope, symbol) {
            self.diagnostics.push(semantic_diagnostic(
                PassName::Symtab,
                format!("`{name}` is already declared at {first}"),
                span,
            ));
        }
    }

    fn declare_builtins(&mut self, scope: ScopeId) {
        for name in BUILTIN_VARIABLES.iter().chain(BUILTIN_FUNCTIONS) {
            self.table.declare(
                scope,
                Symbol::new(*name, SymbolProperties::BUILTIN, scope, Span::synthetic()),
            );
        }
    }

    fn declare_names(&mut self, ast: &Ast, names: &[NodeId], properties: SymbolProperties) {
        let scope = self.current();
        for &id in names {
            if let Some(name) = ast.cast::<Name>(id) {
                let symbol = global_symbol(&name.name, properties, id, ast.span(id));
                self.declare(scope, symbol);
            }
        }
    }

    /// Everything declared at program level, in source order.
    fn declare_globals(&mut self, ast: &Ast) {
        let scope = self.current();
        for block in ast.top_level() {
            let span = ast.span(block);
            match ast.kind(block) {
                NodeKind::NeuronBlock(neuron) => {
                    for &statement in &neuron.statements {
                        self.declare_neuron_statement(ast, statement);
                    }
                }
                NodeKind::ParamBlock(params) => {
                    for &id in &params.statements {
                        if let Some(param) = ast.cast::<ParamAssign>(id) {
                            let symbol = global_symbol(&param.name, SymbolProperties::PARAMETER, id, ast.span(id))
                                .with_unit(param.unit.clone())
                                .with_value(param.value.and_then(|value| literal_text(ast, value)));
                            self.declare(scope, symbol);
                        }
                    }
                }
                NodeKind::StateBlock(states) => {
                    for &id in &states.statements {
                        if let Some(state) = ast.cast::<StateVar>(id) {
                            let symbol = global_symbol(&state.name, SymbolProperties::STATE, id, ast.span(id))
                                .with_unit(state.unit.clone());
                            self.declare(scope, symbol);
                        }
                    }
                }
                NodeKind::AssignedBlock(assigned) => {
                    for &id in &assigned.definitions {
                        if let Some(def) = ast.cast::<AssignedDefinition>(id) {
                            let symbol = global_symbol(&def.name, SymbolProperties::ASSIGNED, id, ast.span(id))
                                .with_length(def.length)
                                .with_unit(def.unit.clone());
                            self.declare(scope, symbol);
                        }
                    }
                }
                NodeKind::ConstantBlock(constants) => {
                    for &id in &constants.statements {
                        if let Some(constant) = ast.cast::<ConstantStatement>(id) {
                            let symbol = global_symbol(&constant.name, SymbolProperties::CONSTANT, id, ast.span(id))
                                .with_unit(constant.unit.clone())
                                .with_value(literal_text(ast, constant.value));
                            self.declare(scope, symbol);
                        }
                    }
                }
                NodeKind::UnitBlock(units) => {
                    for &id in &units.definitions {
                        if let Some(UnitDef { name: Some(name), to, .. }) = ast.cast::<UnitDef>(id) {
                            let symbol = global_symbol(name, SymbolProperties::UNIT_FACTOR, id, ast.span(id))
                                .with_unit(Some(to.clone()));
                            self.declare(scope, symbol);
                        }
                    }
                }
                NodeKind::DerivativeBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::DERIVATIVE_BLOCK, block, span);
                    self.declare(scope, symbol);
                }
                NodeKind::KineticBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::KINETIC_BLOCK, block, span);
                    self.declare(scope, symbol);
                }
                NodeKind::LinearBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::LINEAR_BLOCK, block, span);
                    self.declare(scope, symbol);
                }
                NodeKind::NonLinearBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::NON_LINEAR_BLOCK, block, span);
                    self.declare(scope, symbol);
                }
                NodeKind::ProcedureBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::PROCEDURE, block, span)
                        .with_unit(b.unit.clone());
                    self.declare(scope, symbol);
                }
                NodeKind::FunctionBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::FUNCTION, block, span)
                        .with_unit(b.unit.clone());
                    self.declare(scope, symbol);
                }
                NodeKind::FunctionTableBlock(b) => {
                    let symbol = global_symbol(&b.name, SymbolProperties::FUNCTION_TABLE, block, span)
                        .with_unit(b.unit.clone());
                    self.declare(scope, symbol);
                }
                _ => {}
            }
        }
    }

    fn declare_neuron_statement(&mut self, ast: &Ast, id: NodeId) {
        match ast.kind(id) {
            NodeKind::Range(range) => self.declare_names(ast, &range.names, SymbolProperties::RANGE),
            NodeKind::Global(global) => {
                self.declare_names(ast, &global.names, SymbolProperties::GLOBAL)
            }
            NodeKind::Pointer(pointer) => {
                self.declare_names(ast, &pointer.names, SymbolProperties::POINTER)
            }
            NodeKind::BbcorePointer(pointer) => {
                self.declare_names(ast, &pointer.names, SymbolProperties::BBCORE_POINTER)
            }
            NodeKind::Nonspecific(currents) => self.declare_names(
                ast,
                &currents.currents,
                SymbolProperties::NONSPECIFIC_CURRENT,
            ),
            NodeKind::ElectrodeCurrent(currents) => self.declare_names(
                ast,
                &currents.currents,
                SymbolProperties::ELECTRODE_CURRENT,
            ),
            NodeKind::Useion(useion) => {
                self.declare_names(ast, &useion.reads, SymbolProperties::ION_READ);
                self.declare_names(ast, &useion.writes, SymbolProperties::ION_WRITE);
            }
            _ => {}
        }
    }

    /// A read or write of `name` from the current scope.
    fn use_name(&mut self, name: &str, span: Span, write: bool) -> bool {
        let scope = self.current();
        let found = if write {
            self.table.record_write(scope, name)
        } else {
            self.table.record_read(scope, name)
        };
        if !found && self.unresolved.insert(name.to_string()) {
            self.diagnostics
                .push(Diagnostic::unresolved(name, span).with_source_context(PassName::Symtab.as_str()));
        }
        found
    }

    fn write_target(&mut self, ast: &Ast, target: NodeId) -> Result<()> {
        match ast.kind(target) {
            NodeKind::Name(name) => {
                let span = ast.span(target);
                if self.use_name(&name.name, span, true) {
                    self.check_assignable(&name.name, span);
                }
                Ok(())
            }
            NodeKind::IndexedName(indexed) => {
                let span = ast.span(target);
                if self.use_name(&indexed.name, span, true) {
                    self.check_assignable(&indexed.name, span);
                }
                self.visit_node(ast, indexed.index)
            }
            _ => self.visit_node(ast, target),
        }
    }

    fn check_assignable(&mut self, name: &str, span: Span) {
        let constant = self
            .table
            .lookup(self.current(), name)
            .map(|symbol| symbol.has(SymbolProperties::CONSTANT))
            .unwrap_or(false);
        if constant {
            self.diagnostics.push(semantic_diagnostic(
                PassName::Symtab,
                format!("cannot assign to CONSTANT `{name}`"),
                span,
            ));
        }
    }

    fn visit_flattened(&mut self, ast: &Ast, blocks: &[NodeId]) -> Result<()> {
        for &block in blocks {
            for statement in ast.children(block) {
                self.visit_node(ast, statement)?;
            }
        }
        Ok(())
    }

    fn visit_callable(&mut self, ast: &Ast, id: NodeId, arguments: &[NodeId], body: Option<NodeId>) -> Result<()> {
        let scope = self.open_scope(ast, id);
        for &argument in arguments {
            if let Some(arg) = ast.cast::<Argument>(argument) {
                let symbol = Symbol::new(&arg.name, SymbolProperties::ARGUMENT, scope, ast.span(argument))
                    .with_node(argument)
                    .with_unit(arg.unit.clone());
                self.declare(scope, symbol);
            }
        }
        if let Some(body) = body {
            self.visit_node(ast, body)?;
        }
        self.close_scope();
        Ok(())
    }
}

/// Program-level symbol; the owning scope is filled in by `declare`.
fn global_symbol(name: &str, properties: SymbolProperties, node: NodeId, span: Span) -> Symbol {
    Symbol::new(name, properties, ScopeId(0), span).with_node(node)
}

/// Source spelling of a numeric literal, if `id` is one.
pub(crate) fn literal_text(ast: &Ast, id: NodeId) -> Option<String> {
    match ast.kind(id) {
        NodeKind::Integer(value) => Some(value.value.to_string()),
        NodeKind::Double(value) => Some(value.value.clone()),
        NodeKind::UnaryExpression(UnaryExpression { operand, .. }) => {
            literal_text(ast, *operand).map(|text| format!("-{text}"))
        }
        _ => None,
    }
}

impl AstVisitor for SymtabVisitor {
    fn visit_program(&mut self, ast: &Ast, id: NodeId, _node: &Program) -> Result<()> {
        let scope = self.open_scope(ast, id);
        self.declare_builtins(scope);
        self.declare_globals(ast);
        self.visit_children(ast, id)?;
        self.close_scope();
        Ok(())
    }

    fn visit_neuron_block(&mut self, _ast: &Ast, _id: NodeId, _node: &NeuronBlock) -> Result<()> {
        Ok(())
    }

    fn visit_param_block(&mut self, _ast: &Ast, _id: NodeId, _node: &ParamBlock) -> Result<()> {
        Ok(())
    }

    fn visit_state_block(&mut self, _ast: &Ast, _id: NodeId, _node: &StateBlock) -> Result<()> {
        Ok(())
    }

    fn visit_assigned_block(&mut self, _ast: &Ast, _id: NodeId, _node: &AssignedBlock) -> Result<()> {
        Ok(())
    }

    fn visit_constant_block(&mut self, _ast: &Ast, _id: NodeId, _node: &ConstantBlock) -> Result<()> {
        Ok(())
    }

    fn visit_unit_block(&mut self, _ast: &Ast, _id: NodeId, _node: &UnitBlock) -> Result<()> {
        Ok(())
    }

    fn visit_procedure_block(&mut self, ast: &Ast, id: NodeId, node: &ProcedureBlock) -> Result<()> {
        self.visit_callable(ast, id, &node.arguments, Some(node.body))
    }

    fn visit_function_block(&mut self, ast: &Ast, id: NodeId, node: &FunctionBlock) -> Result<()> {
        self.visit_callable(ast, id, &node.arguments, Some(node.body))
    }

    fn visit_net_receive_block(&mut self, ast: &Ast, id: NodeId, node: &NetReceiveBlock) -> Result<()> {
        self.visit_callable(ast, id, &node.arguments, Some(node.body))
    }

    fn visit_function_table_block(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &FunctionTableBlock,
    ) -> Result<()> {
        self.visit_callable(ast, id, &node.arguments, None)
    }

    fn visit_statement_block(&mut self, ast: &Ast, id: NodeId, _node: &StatementBlock) -> Result<()> {
        self.open_scope(ast, id);
        self.visit_children(ast, id)?;
        self.close_scope();
        Ok(())
    }

    fn visit_eigen_linear_solver_block(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &EigenLinearSolverBlock,
    ) -> Result<()> {
        self.open_scope(ast, id);
        self.visit_flattened(
            ast,
            &[
                node.variable_block,
                node.initialize_block,
                node.solve_block,
                node.update_states_block,
            ],
        )?;
        self.close_scope();
        Ok(())
    }

    fn visit_eigen_newton_solver_block(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &EigenNewtonSolverBlock,
    ) -> Result<()> {
        self.open_scope(ast, id);
        self.visit_flattened(
            ast,
            &[
                node.variable_block,
                node.initialize_block,
                node.iteration_block,
                node.update_states_block,
            ],
        )?;
        self.close_scope();
        Ok(())
    }

    fn visit_local_list(&mut self, ast: &Ast, _id: NodeId, node: &LocalList) -> Result<()> {
        let scope = self.current();
        for &variable in &node.variables {
            if let Some(local) = ast.cast::<LocalVar>(variable) {
                let symbol = Symbol::new(&local.name, SymbolProperties::LOCAL, scope, ast.span(variable))
                    .with_node(variable)
                    .with_length(local.length);
                self.declare(scope, symbol);
            }
        }
        Ok(())
    }

    // left-hand side first, in source order
    fn visit_assignment(&mut self, ast: &Ast, _id: NodeId, node: &Assignment) -> Result<()> {
        self.write_target(ast, node.lhs)?;
        self.visit_node(ast, node.rhs)
    }

    fn visit_diff_equation(&mut self, ast: &Ast, _id: NodeId, node: &DiffEquation) -> Result<()> {
        match ast.cast::<PrimeName>(node.lhs) {
            Some(prime) => {
                let span = ast.span(node.lhs);
                if self.use_name(&prime.name, span, true) {
                    let is_state = self
                        .table
                        .lookup(self.current(), &prime.name)
                        .map(|symbol| symbol.has(SymbolProperties::STATE))
                        .unwrap_or(false);
                    if !is_state {
                        self.diagnostics.push(semantic_diagnostic(
                            PassName::Symtab,
                            format!("`{}` is not a STATE variable", prime.name),
                            span,
                        ));
                    }
                }
            }
            None => self.visit_node(ast, node.lhs)?,
        }
        self.visit_node(ast, node.rhs)
    }

    fn visit_from_statement(&mut self, ast: &Ast, id: NodeId, node: &FromStatement) -> Result<()> {
        let span = ast.span(id);
        let scope = self.current();
        if self.table.resolve(scope, &node.variable).is_none() {
            let symbol = Symbol::new(&node.variable, SymbolProperties::LOOP_VARIABLE, scope, span);
            self.declare(scope, symbol);
        }
        self.table.record_write(scope, &node.variable);
        self.visit_node(ast, node.from)?;
        self.visit_node(ast, node.to)?;
        if let Some(by) = node.by {
            self.visit_node(ast, by)?;
        }
        self.visit_node(ast, node.block)
    }

    fn visit_solve_block(&mut self, ast: &Ast, id: NodeId, node: &SolveBlock) -> Result<()> {
        let solvable = self
            .table
            .lookup_global(&node.block_name)
            .map(|symbol| symbol.has(SymbolProperties::SOLVABLE))
            .unwrap_or(false);
        if !solvable {
            self.diagnostics.push(semantic_diagnostic(
                PassName::Symtab,
                format!(
                    "SOLVE target `{}` is not a DERIVATIVE, KINETIC, LINEAR or NONLINEAR block",
                    node.block_name
                ),
                ast.span(id),
            ));
        }
        Ok(())
    }

    fn visit_function_call(&mut self, ast: &Ast, id: NodeId, node: &FunctionCall) -> Result<()> {
        let span = ast.span(id);
        if self.use_name(&node.name, span, false) {
            let callable = self
                .table
                .lookup(self.current(), &node.name)
                .map(|symbol| symbol.has(SymbolProperties::CALLABLE))
                .unwrap_or(false);
            if !callable && !is_builtin_function(&node.name) {
                self.diagnostics.push(semantic_diagnostic(
                    PassName::Symtab,
                    format!("`{}` is not a FUNCTION or PROCEDURE", node.name),
                    span,
                ));
            }
        }
        self.visit_children(ast, id)
    }

    fn visit_name(&mut self, ast: &Ast, id: NodeId, node: &Name) -> Result<()> {
        self.use_name(&node.name, ast.span(id), false);
        Ok(())
    }

    fn visit_prime_name(&mut self, ast: &Ast, id: NodeId, node: &PrimeName) -> Result<()> {
        self.use_name(&node.name, ast.span(id), false);
        Ok(())
    }

    fn visit_indexed_name(&mut self, ast: &Ast, id: NodeId, node: &IndexedName) -> Result<()> {
        self.use_name(&node.name, ast.span(id), false);
        self.visit_children(ast, id)
    }

    fn visit_react_var_name(&mut self, ast: &Ast, id: NodeId, node: &ReactVarName) -> Result<()> {
        self.use_name(&node.name, ast.span(id), false);
        Ok(())
    }

    fn visit_lag_statement(&mut self, ast: &Ast, id: NodeId, node: &LagStatement) -> Result<()> {
        let span = ast.span(id);
        self.use_name(&node.name, span, false);
        self.use_name(&node.by, span, false);
        Ok(())
    }

    fn visit_plot_var(&mut self, ast: &Ast, id: NodeId, node: &PlotVar) -> Result<()> {
        self.use_name(&node.name, ast.span(id), false);
        self.visit_children(ast, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_core::diagnostics::DiagnosticKind;
    use mech_lang::parse_source;
    use pretty_assertions::assert_eq;

    fn build(source: &str) -> (SymbolTable, Vec<Diagnostic>) {
        let ast = parse_source(source).value.expect("parses");
        SymtabVisitor::build(&ast).expect("builds")
    }

    #[test]
    fn neuron_declarations_merge_with_variable_blocks() {
        let (table, diagnostics) = build(
            "NEURON { SUFFIX hh USEION na READ ena WRITE ina RANGE gnabar }\n\
             PARAMETER { gnabar = 0.12 (S/cm2) }\n\
             ASSIGNED { ena (mV) ina (mA/cm2) }\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let gnabar = table.lookup_global("gnabar").expect("declared");
        assert!(gnabar.has(SymbolProperties::RANGE));
        assert!(gnabar.has(SymbolProperties::PARAMETER));
        assert_eq!(gnabar.value.as_deref(), Some("0.12"));
        let ina = table.lookup_global("ina").expect("declared");
        assert!(ina.has(SymbolProperties::ION_WRITE));
        assert!(ina.has(SymbolProperties::ASSIGNED));
    }

    #[test]
    fn functions_resolve_before_their_definition() {
        let (_, diagnostics) = build(
            "ASSIGNED { x }\n\
             BREAKPOINT { x = twice(2) }\n\
             FUNCTION twice(a) { twice = 2 * a }\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn unresolved_names_are_reported_once_each() {
        let (_, diagnostics) = build("ASSIGNED { x }\nBREAKPOINT { x = y + y + z }\n");
        let names: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnresolvedSymbol)
            .map(|d| d.message.clone())
            .collect();
        assert_eq!(
            names,
            vec!["unresolved symbol `y`".to_string(), "unresolved symbol `z`".to_string()]
        );
    }

    #[test]
    fn unresolved_target_is_reported_at_the_left_hand_side() {
        let (_, diagnostics) = build("ASSIGNED { x }\nINITIAL {\n    y = y + 1\n}\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unresolved symbol `y`");
        let span = diagnostics[0].span.expect("located");
        assert_eq!((span.line, span.column), (3, 5));
    }

    #[test]
    fn locals_are_scoped_to_their_block() {
        let (table, diagnostics) = build(
            "ASSIGNED { x }\n\
             BREAKPOINT {\n LOCAL a\n a = 1\n x = a\n}\n\
             INITIAL { x = a }\n",
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unresolved symbol `a`");
        assert!(table.lookup_global("a").is_none());
    }

    #[test]
    fn duplicate_definitions_are_semantic_errors() {
        let (_, diagnostics) = build("STATE { m }\nASSIGNED { m }\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Semantic);
        assert!(diagnostics[0].message.contains("already declared"));
    }

    #[test]
    fn solve_must_target_a_solvable_block() {
        let (_, diagnostics) = build(
            "BREAKPOINT { SOLVE rates METHOD cnexp }\nPROCEDURE rates() { }\n",
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.starts_with("SOLVE target `rates`"));
    }

    #[test]
    fn reads_and_writes_are_counted() {
        let (table, _) = build("STATE { m }\nASSIGNED { a }\nDERIVATIVE s { m' = -m * a }\n");
        let m = table.lookup_global("m").expect("state");
        assert_eq!((m.reads, m.writes), (1, 1));
        assert_eq!(table.lookup_global("a").map(|s| s.reads), Some(1));
    }
}
