//! C translation unit for one fully lowered mechanism.
//!
//! Output order: header comment, includes, helper prototypes, the global
//! store, the instance layout, FUNCTIONs and PROCEDUREs, then the init,
//! current, state and net-receive kernels. Which of these appear, and how
//! storage is spelled, is decided by the [`CodegenBackend`].

use crate::backend::{CodegenBackend, Kernel, Routine};
use crate::layout::{Access, FieldKind, Layout};
use crate::printer::CodePrinter;
use itertools::Itertools;
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, BinaryOp, NodeId, NodeKind, NodeType, UnaryOp};
use mech_core::codegen_info::{CodegenInfo, PerfStat};
use mech_core::symtab::{ScopeCursor, ScopeId, SymbolProperties, SymbolTable};
use mech_core::visitor::{walk_node, AstLookupVisitor, AstVisitor};
use mech_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PASS: &str = "codegen";

/// Finite-difference step of the conductance `dI/dv`.
const VOLTAGE_STEP: &str = "0.001";

/// Runtime event functions: name, return type, trailing parameters.
const EVENT_FUNCTIONS: &[(&str, &str, &str)] = &[
    ("net_send", "void", "double delay, double flag"),
    ("net_event", "void", "double time"),
    ("net_move", "void", "double time"),
    ("at_time", "int", "double time"),
];

/// Names the context parameters take in every generated function.
const CONTEXT_NAMES: &[&str] = &["inst", "nt", "id", "v"];

/// Spelling of an argument, renamed when it would shadow a context parameter.
fn argument_name(name: &str) -> String {
    if CONTEXT_NAMES.contains(&name) {
        format!("_l{name}")
    } else {
        name.to_string()
    }
}

const UNARY_PRECEDENCE: u8 = 7;
const ATOM_PRECEDENCE: u8 = 9;

fn c_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq | BinaryOp::Ne => 3,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
        BinaryOp::Add | BinaryOp::Sub => 5,
        BinaryOp::Mul | BinaryOp::Div => 6,
        BinaryOp::Pow => 8,
    }
}

fn expression_precedence(ast: &Ast, id: NodeId) -> u8 {
    match ast.kind(id) {
        NodeKind::BinaryExpression(binary) => c_precedence(binary.op),
        NodeKind::UnaryExpression(_) => UNARY_PRECEDENCE,
        NodeKind::Integer(integer) if integer.value < 0 => UNARY_PRECEDENCE,
        NodeKind::Double(double) if double.value.starts_with('-') => UNARY_PRECEDENCE,
        _ => ATOM_PRECEDENCE,
    }
}

/// `na-chan` becomes `na_chan`.
pub fn c_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

fn perf_summary(stat: &PerfStat) -> String {
    format!(
        "perf: {} arithmetic, {} calls, {} global reads, {} global writes, {} local reads, {} local writes",
        stat.arithmetic(),
        stat.calls(),
        stat.global_reads,
        stat.global_writes,
        stat.local_reads,
        stat.local_writes
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// C type of every floating value.
    pub float_type: String,
    /// Operation counts as a comment above every generated block.
    pub emit_perf_comments: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            float_type: "double".into(),
            emit_perf_comments: false,
        }
    }
}

pub struct CodegenCVisitor<'a> {
    ast: &'a Ast,
    table: &'a SymbolTable,
    info: &'a CodegenInfo,
    backend: &'a dyn CodegenBackend,
    options: &'a CodegenOptions,
    layout: Layout,
    mechanism: String,
    source_name: String,
    called: BTreeSet<String>,
    printer: CodePrinter,
    cursor: ScopeCursor,
    /// FUNCTION whose name currently denotes its return value.
    current_function: Option<String>,
    /// Whether a SOLVE statement expands to the solved block.
    expand_solves: bool,
}

impl<'a> CodegenCVisitor<'a> {
    pub fn new(
        ast: &'a Ast,
        table: &'a SymbolTable,
        info: &'a CodegenInfo,
        backend: &'a dyn CodegenBackend,
        options: &'a CodegenOptions,
    ) -> Self {
        let called = AstLookupVisitor::lookup(ast, ast.root(), &[NodeType::FunctionCall])
            .into_iter()
            .filter_map(|id| ast.cast::<FunctionCall>(id))
            .map(|call| call.name.clone())
            .collect();
        Self {
            ast,
            table,
            info,
            backend,
            options,
            layout: Layout::new(table, info),
            mechanism: c_identifier(&info.mechanism_name),
            source_name: format!("{}.mod", info.mechanism_name),
            called,
            printer: CodePrinter::new(),
            cursor: ScopeCursor::new(),
            current_function: None,
            expand_solves: false,
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn generate(mut self) -> Result<String> {
        self.check_lowered()?;
        self.print_header();
        for routine in self.backend.routines() {
            match routine {
                Routine::GlobalStore => {
                    self.backend.print_global_store(
                        &mut self.printer,
                        &self.layout,
                        &self.mechanism,
                        &self.options.float_type,
                    );
                }
                Routine::InstanceLayout => {
                    self.backend.print_instance_layout(
                        &mut self.printer,
                        &self.layout,
                        &self.mechanism,
                        &self.options.float_type,
                    );
                }
                Routine::Functions => self.print_functions()?,
                Routine::Init => self.print_init()?,
                Routine::Current => self.print_current()?,
                Routine::State => self.print_state()?,
                Routine::NetReceive => self.print_net_receive()?,
            }
            self.printer.push_blank_line();
        }
        Ok(self.printer.finish())
    }

    fn float(&self) -> &str {
        &self.options.float_type
    }

    fn internal(&self, id: NodeId, message: impl Into<String>) -> Error {
        Error::internal(PASS, self.ast.node_type(id).as_str(), self.ast.span(id), message)
    }

    fn unsupported(&self, id: NodeId, construct: &str) -> Error {
        Error::unsupported(
            construct,
            self.ast.span(id),
            format!("{construct} is not supported by the {} backend", self.backend.name()),
        )
    }

    fn find_block(&self, node_type: NodeType) -> Option<NodeId> {
        self.ast
            .top_level()
            .into_iter()
            .find(|&id| self.ast.node_type(id) == node_type)
    }

    /// Everything a front end or pass should have removed.
    fn check_lowered(&self) -> Result<()> {
        let ast = self.ast;
        for block in ast.top_level() {
            let construct = match ast.kind(block) {
                NodeKind::KineticBlock(kinetic) => {
                    return Err(self.internal(block, format!("KINETIC block `{}` was not lowered", kinetic.name)));
                }
                // unsolved DERIVATIVE blocks are not generated
                NodeKind::DerivativeBlock(_) => continue,
                NodeKind::DiscreteBlock(_) => "DISCRETE",
                NodeKind::PartialBlock(_) => "PARTIAL",
                NodeKind::MatchBlock(_) => "MATCH",
                NodeKind::BeforeBlock(_) => "BEFORE",
                NodeKind::AfterBlock(_) => "AFTER",
                NodeKind::ConstructorBlock(_) => "CONSTRUCTOR",
                NodeKind::DestructorBlock(_) => "DESTRUCTOR",
                NodeKind::FunctionTableBlock(_) => "FUNCTION_TABLE",
                _ => {
                    let leftover = AstLookupVisitor::lookup(
                        ast,
                        block,
                        &[
                            NodeType::DiffEquation,
                            NodeType::LinEquation,
                            NodeType::ReactionStatement,
                            NodeType::Conserve,
                            NodeType::Compartment,
                            NodeType::PrimeName,
                        ],
                    );
                    if let Some(&id) = leftover.first() {
                        return Err(self.internal(
                            id,
                            format!("{} must be lowered before code generation", ast.node_type(id)),
                        ));
                    }
                    continue;
                }
            };
            return Err(self.unsupported(block, construct));
        }
        for id in AstLookupVisitor::lookup(ast, ast.root(), &[NodeType::BinaryExpression]) {
            if matches!(ast.cast::<BinaryExpression>(id), Some(b) if b.op == BinaryOp::Pow) {
                return Err(self.internal(id, "power operator must be rewritten before code generation"));
            }
        }
        if let Some(name) = self.layout.unknown_factors.first() {
            return Err(Error::unsupported(
                "UNITS",
                mech_core::span::Span::synthetic(),
                format!("unit factor `{name}` has no known value"),
            ));
        }
        Ok(())
    }

    fn print_header(&mut self) {
        let float = self.float().to_string();
        self.printer.push_line("/*********************************************************");
        self.printer
            .push_line(&format!(" * Generated by mechc from {}", self.source_name));
        self.printer.push_line(&format!(" * Backend: {}", self.backend.name()));
        self.printer.push_line(" *********************************************************/");
        if self.options.emit_perf_comments {
            self.printer.push_comment(&perf_summary(&self.info.perf.total));
        }
        self.printer.push_blank_line();

        for include in self.backend.includes() {
            self.printer.push_line(&format!("#include {include}"));
        }
        if self.called.contains("printf") {
            self.printer.push_line("#include <stdio.h>");
        }
        self.printer.push_blank_line();

        for (name, value) in &self.layout.defines {
            self.printer.push_line(&format!("#define {name} {value}"));
        }
        for name in &self.layout.runtime {
            self.printer
                .push_line(&format!("{}{float} {name};", self.backend.extern_keyword()));
        }
        for constant in &self.layout.constants {
            let value = constant.value.as_deref().unwrap_or("0.0");
            self.printer
                .push_line(&format!("static const {float} {} = {value};", constant.name));
        }
        self.printer.push_blank_line();

        if self.info.uses_solver() {
            self.printer.push_line(&format!(
                "int solve_linear_system(int n, {float}* J, {float}* F);"
            ));
        }
        for (name, ret, params) in EVENT_FUNCTIONS {
            if self.called.contains(*name) {
                self.printer.push_line(&format!(
                    "{ret} {name}({}, {params});",
                    self.backend.runtime_params()
                ));
            }
        }
        if self.called.contains("exprelr") {
            self.printer.push_blank_line();
            self.printer
                .start_block(&format!("static inline {float} exprelr({float} x)"));
            self.printer.start_block("if (1.0 + x == 1.0)");
            self.printer.push_line("return 1.0;");
            self.printer.end_block();
            self.printer.push_line("return x / expm1(x);");
            self.printer.end_block();
        }
        self.printer.push_blank_line();
    }

    fn print_perf(&mut self, block: NodeId) {
        if !self.options.emit_perf_comments {
            return;
        }
        if let Some(stat) = self.info.perf.get(block) {
            let summary = perf_summary(stat);
            self.printer.push_comment(&summary);
        }
    }

    /// `static inline double f(<context>, double a)` for FUNCTIONs and
    /// PROCEDUREs, with the body if it is one.
    fn callable_signature(&self, id: NodeId) -> Option<(String, NodeId, bool)> {
        let (name, arguments, body, is_function) = match self.ast.kind(id) {
            NodeKind::FunctionBlock(block) => (&block.name, &block.arguments, block.body, true),
            NodeKind::ProcedureBlock(block) => (&block.name, &block.arguments, block.body, false),
            _ => return None,
        };
        let float = self.float();
        let ret = if is_function { float } else { "int" };
        let context = self.backend.context_params(&self.mechanism, float);
        let params = std::iter::once(context)
            .chain(
                arguments
                    .iter()
                    .filter_map(|&arg| self.ast.cast::<Argument>(arg))
                    .map(|arg| format!("{float} {}", argument_name(&arg.name))),
            )
            .join(", ");
        Some((format!("static inline {ret} {name}({params})"), body, is_function))
    }

    fn print_functions(&mut self) -> Result<()> {
        let callables: Vec<NodeId> = self
            .ast
            .top_level()
            .into_iter()
            .filter(|&id| self.callable_signature(id).is_some())
            .collect();
        if callables.is_empty() {
            return Ok(());
        }
        for &id in &callables {
            if let Some((signature, _, _)) = self.callable_signature(id) {
                self.printer.push_line(&format!("{signature};"));
            }
        }
        for &id in &callables {
            self.printer.push_blank_line();
            self.print_callable(id)?;
        }
        Ok(())
    }

    fn print_callable(&mut self, id: NodeId) -> Result<()> {
        let Some((signature, body, is_function)) = self.callable_signature(id) else {
            return Err(self.internal(id, "not a FUNCTION or PROCEDURE"));
        };
        let name = self.ast.block_name(id).unwrap_or_default().to_string();
        self.print_perf(id);
        self.printer.start_block(&signature);
        if is_function {
            let float = self.float().to_string();
            self.printer.push_line(&format!("{float} ret_{name} = 0.0;"));
            self.current_function = Some(name.clone());
        }
        let entered = self.cursor.enter(self.table, id);
        self.expand_solves = false;
        let result = self.visit_node(self.ast, body);
        if entered {
            self.cursor.leave(id);
        }
        self.current_function = None;
        result?;
        if is_function {
            self.printer.push_line(&format!("return ret_{name};"));
        } else {
            self.printer.push_line("return 0;");
        }
        self.printer.end_block();
        Ok(())
    }

    fn print_kernel_begin(&mut self, kernel: Kernel) {
        self.backend
            .print_kernel_begin(&mut self.printer, kernel, &self.mechanism, &self.options.float_type);
    }

    fn print_init(&mut self) -> Result<()> {
        self.print_kernel_begin(Kernel::Init);
        if let Some(initial) = self.find_block(NodeType::InitialBlock) {
            if let Some(body) = self.ast.block_body(initial) {
                self.print_perf(initial);
                self.expand_solves = true;
                self.visit_node(self.ast, body)?;
            }
        }
        self.backend.print_kernel_end(&mut self.printer);
        Ok(())
    }

    fn print_current(&mut self) -> Result<()> {
        if !self.info.has_breakpoint || self.info.currents.is_empty() {
            return Ok(());
        }
        let Some(breakpoint) = self.find_block(NodeType::BreakpointBlock) else {
            return Ok(());
        };
        let Some(body) = self.ast.block_body(breakpoint) else {
            return Err(self.internal(breakpoint, "BREAKPOINT without a body"));
        };
        let float = self.float().to_string();
        let function = format!("nrn_current_{}", self.mechanism);
        let context = self.backend.context_params(&self.mechanism, &float);

        self.print_perf(breakpoint);
        self.printer
            .start_block(&format!("static inline {float} {function}({context})"));
        self.printer.push_line(&format!("{float} current = 0.0;"));
        self.expand_solves = false;
        self.visit_node(self.ast, body)?;
        for current in &self.info.currents {
            let variable = self.variable(breakpoint, current, None)?;
            self.printer.push_line(&format!("current += {variable};"));
        }
        self.printer.push_line("return current;");
        self.printer.end_block();
        self.printer.push_blank_line();

        self.print_kernel_begin(Kernel::Current);
        let shifted = self.backend.context_args(&format!("v + {VOLTAGE_STEP}"));
        let at_v = self.backend.context_args("v");
        self.printer
            .push_line(&format!("{float} g = {function}({shifted});"));
        self.printer
            .push_line(&format!("{float} rhs = {function}({at_v});"));
        self.printer
            .push_line(&format!("g = (g - rhs) / {VOLTAGE_STEP};"));
        if self.info.is_point_process() {
            let area = self.backend.instance_variable("node_area", "id");
            self.printer
                .push_line(&format!("{float} mfactor = 1.e2 / {area};"));
            self.printer.push_line("g = g * mfactor;");
            self.printer.push_line("rhs = rhs * mfactor;");
        }
        self.backend.print_matrix_update(&mut self.printer);
        self.backend.print_kernel_end(&mut self.printer);
        Ok(())
    }

    fn print_state(&mut self) -> Result<()> {
        let breakpoint = self.find_block(NodeType::BreakpointBlock);
        let breakpoint_in_state = breakpoint.is_some() && self.info.currents.is_empty();
        if !self.info.nrn_state_required() && !breakpoint_in_state {
            return Ok(());
        }
        self.print_kernel_begin(Kernel::State);
        if let Some(body) = breakpoint.and_then(|id| self.ast.block_body(id)) {
            if breakpoint_in_state {
                self.expand_solves = true;
                self.visit_node(self.ast, body)?;
            } else {
                for solve in AstLookupVisitor::lookup(self.ast, body, &[NodeType::SolveBlock]) {
                    self.print_solve(solve)?;
                }
            }
        }
        self.backend.print_kernel_end(&mut self.printer);
        Ok(())
    }

    /// The lowered body of the block a SOLVE names, in its own scope.
    fn print_solve(&mut self, solve: NodeId) -> Result<()> {
        let Some(statement) = self.ast.cast::<SolveBlock>(solve) else {
            return Err(self.internal(solve, "expected a SOLVE statement"));
        };
        let Some(block) = self.ast.find_solvable_block(&statement.block_name) else {
            return Err(self.internal(
                solve,
                format!("SOLVE target `{}` does not exist", statement.block_name),
            ));
        };
        match self.ast.node_type(block) {
            NodeType::DerivativeBlock | NodeType::LinearBlock | NodeType::NonLinearBlock => {}
            other => {
                return Err(self.internal(block, format!("cannot expand SOLVE of a {other}")));
            }
        }
        let Some(body) = self.ast.block_body(block) else {
            return Err(self.internal(block, "solved block without a body"));
        };
        let header = match &statement.method {
            Some(method) => format!("SOLVE {} METHOD {method}", statement.block_name),
            None => format!("SOLVE {}", statement.block_name),
        };
        self.printer.push_comment(&header);
        self.print_perf(block);
        self.printer.start_block("");
        let expand = std::mem::replace(&mut self.expand_solves, false);
        let result = self.visit_node(self.ast, body);
        self.expand_solves = expand;
        result?;
        self.printer.end_block();
        Ok(())
    }

    fn print_net_receive(&mut self) -> Result<()> {
        let ast = self.ast;
        let Some(block) = self.find_block(NodeType::NetReceiveBlock) else {
            return Ok(());
        };
        let Some(net_receive) = ast.cast::<NetReceiveBlock>(block) else {
            return Ok(());
        };
        let float = self.float().to_string();
        let params = std::iter::once(self.backend.context_params(&self.mechanism, &float))
            .chain(
                net_receive
                    .arguments
                    .iter()
                    .filter_map(|&arg| ast.cast::<Argument>(arg))
                    .map(|arg| format!("{float} {}", argument_name(&arg.name))),
            )
            .join(", ");
        self.print_perf(block);
        self.printer.start_block(&format!(
            "static inline void net_receive_{}({params})",
            self.mechanism
        ));
        let entered = self.cursor.enter(self.table, block);
        self.expand_solves = false;
        let result = self.visit_node(ast, net_receive.body);
        if entered {
            self.cursor.leave(block);
        }
        result?;
        self.printer.end_block();
        Ok(())
    }

    fn scope(&self) -> ScopeId {
        self.cursor.current().unwrap_or(ScopeId(0))
    }

    /// Spelling of a variable use at `id`.
    fn variable(&self, id: NodeId, name: &str, index: Option<String>) -> Result<String> {
        let Some(symbol) = self.table.lookup(self.scope(), name) else {
            return Err(self.internal(id, format!("unresolved name `{name}` reached code generation")));
        };
        let indexed = |base: String| match &index {
            Some(index) => format!("{base}[{index}]"),
            None => base,
        };
        if symbol.scope != ScopeId(0) {
            if symbol.has(SymbolProperties::ARGUMENT) {
                return Ok(indexed(argument_name(name)));
            }
            return Ok(indexed(name.to_string()));
        }
        if symbol.has(SymbolProperties::FUNCTION) && self.current_function.as_deref() == Some(name) {
            return Ok(format!("ret_{name}"));
        }
        match self.layout.access(name) {
            Some(Access::Instance { field, length, kind }) => {
                let slot = match (length, &index) {
                    (Some(length), Some(index)) => format!("id * {length} + {index}"),
                    _ => "id".to_string(),
                };
                let access = self.backend.instance_variable(field, &slot);
                Ok(match kind {
                    FieldKind::Pointer => format!("(*{access})"),
                    _ => access,
                })
            }
            Some(Access::Global { .. }) => {
                Ok(indexed(self.backend.global_variable(&self.mechanism, name)))
            }
            Some(Access::Thread) => Ok(self.backend.thread_variable(name)),
            Some(Access::Plain) => Ok(indexed(name.to_string())),
            None => Err(self.internal(id, format!("`{name}` has no storage in generated code"))),
        }
    }

    fn call(&self, ast: &Ast, id: NodeId, call: &FunctionCall) -> Result<String> {
        let arguments: Vec<String> = call
            .arguments
            .iter()
            .map(|&argument| self.expression(ast, argument))
            .collect::<Result<_>>()?;
        let symbol = self.table.lookup(self.scope(), &call.name);
        if symbol.is_some_and(|symbol| symbol.has(SymbolProperties::FUNCTION_TABLE)) {
            return Err(self.unsupported(id, "FUNCTION_TABLE"));
        }
        let user = symbol.is_some_and(|symbol| {
            symbol.has(SymbolProperties::FUNCTION | SymbolProperties::PROCEDURE)
        });
        let prefix = if user {
            Some(self.backend.context_args("v"))
        } else if EVENT_FUNCTIONS.iter().any(|(name, _, _)| *name == call.name) {
            Some(self.backend.runtime_args().to_string())
        } else {
            None
        };
        let arguments = prefix.into_iter().chain(arguments).join(", ");
        Ok(format!("{}({arguments})", call.name))
    }

    fn operand(&self, ast: &Ast, id: NodeId, parent: u8, right: bool, integral: bool) -> Result<String> {
        let text = self.render(ast, id, integral)?;
        let own = expression_precedence(ast, id);
        if own < parent || (right && own == parent && own < UNARY_PRECEDENCE) {
            Ok(format!("({text})"))
        } else {
            Ok(text)
        }
    }

    /// Floating point context: integer literals print as `1.0` so that `1/2`
    /// stays a floating division.
    pub fn expression(&self, ast: &Ast, id: NodeId) -> Result<String> {
        self.render(ast, id, false)
    }

    /// Array subscripts and loop bounds, where integer literals stay C ints.
    fn index_expression(&self, ast: &Ast, id: NodeId) -> Result<String> {
        self.render(ast, id, true)
    }

    fn render(&self, ast: &Ast, id: NodeId, integral: bool) -> Result<String> {
        Ok(match ast.kind(id) {
            NodeKind::Integer(integer) if integral => integer.value.to_string(),
            NodeKind::Integer(integer) => format!("{}.0", integer.value),
            NodeKind::Double(double) => double.value.clone(),
            NodeKind::StringLit(string) => format!("\"{}\"", string.value),
            NodeKind::Name(name) => self.variable(id, &name.name, None)?,
            NodeKind::IndexedName(indexed) => {
                let index = self.index_expression(ast, indexed.index)?;
                self.variable(id, &indexed.name, Some(index))?
            }
            NodeKind::BinaryExpression(binary) => {
                if binary.op == BinaryOp::Pow {
                    return Err(self.internal(id, "power operator must be rewritten before code generation"));
                }
                let precedence = c_precedence(binary.op);
                let lhs = self.operand(ast, binary.lhs, precedence, false, integral)?;
                let rhs = self.operand(ast, binary.rhs, precedence, true, integral)?;
                format!("{lhs} {} {rhs}", binary.op.as_str())
            }
            NodeKind::UnaryExpression(unary) => {
                let operand = self.operand(ast, unary.operand, UNARY_PRECEDENCE, false, integral)?;
                if unary.op == UnaryOp::Neg && operand.starts_with('-') {
                    format!("-({operand})")
                } else {
                    format!("{}{operand}", unary.op.as_str())
                }
            }
            NodeKind::ParenExpression(paren) => format!("({})", self.render(ast, paren.expr, integral)?),
            NodeKind::FunctionCall(call) => self.call(ast, id, call)?,
            _ => return Err(self.internal(id, "expected an expression")),
        })
    }

    fn print_eigen_block(&mut self, ast: &Ast, comment: String, blocks: [NodeId; 4]) -> Result<()> {
        self.printer.start_block("");
        self.printer.push_comment(&comment);
        for block in blocks {
            self.visit_node(ast, block)?;
        }
        self.printer.end_block();
        Ok(())
    }
}

impl AstVisitor for CodegenCVisitor<'_> {
    fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
        let entered = self.cursor.enter(self.table, id);
        let result = walk_node(self, ast, id);
        if entered {
            self.cursor.leave(id);
        }
        result
    }

    fn visit_local_list(&mut self, ast: &Ast, _id: NodeId, node: &LocalList) -> Result<()> {
        let variables = node
            .variables
            .iter()
            .filter_map(|&variable| ast.cast::<LocalVar>(variable))
            .map(|local| match local.length {
                Some(length) => format!("{}[{length}]", local.name),
                None => local.name.clone(),
            })
            .join(", ");
        if !variables.is_empty() {
            let float = self.float().to_string();
            self.printer.push_line(&format!("{float} {variables};"));
        }
        Ok(())
    }

    fn visit_expression_statement(&mut self, ast: &Ast, _id: NodeId, node: &ExpressionStatement) -> Result<()> {
        let expression = self.expression(ast, node.expression)?;
        self.printer.push_line(&format!("{expression};"));
        Ok(())
    }

    fn visit_assignment(&mut self, ast: &Ast, _id: NodeId, node: &Assignment) -> Result<()> {
        let lhs = self.expression(ast, node.lhs)?;
        let rhs = self.expression(ast, node.rhs)?;
        self.printer.push_line(&format!("{lhs} = {rhs};"));
        Ok(())
    }

    fn visit_if(&mut self, ast: &Ast, _id: NodeId, node: &If) -> Result<()> {
        let condition = self.expression(ast, node.condition)?;
        self.printer.start_block(&format!("if ({condition})"));
        self.visit_node(ast, node.then_block)?;
        for &else_if in &node.else_ifs {
            let Some(branch) = ast.cast::<ElseIf>(else_if) else {
                return Err(self.internal(else_if, "expected an ELSE IF branch"));
            };
            let condition = self.expression(ast, branch.condition)?;
            self.printer.chain_block(&format!("else if ({condition})"));
            self.visit_node(ast, branch.block)?;
        }
        if let Some(else_block) = node.else_block {
            self.printer.chain_block("else");
            self.visit_node(ast, else_block)?;
        }
        self.printer.end_block();
        Ok(())
    }

    fn visit_while(&mut self, ast: &Ast, _id: NodeId, node: &While) -> Result<()> {
        let condition = self.expression(ast, node.condition)?;
        self.printer.start_block(&format!("while ({condition})"));
        self.visit_node(ast, node.block)?;
        self.printer.end_block();
        Ok(())
    }

    fn visit_from_statement(&mut self, ast: &Ast, id: NodeId, node: &FromStatement) -> Result<()> {
        let declared_here = self
            .table
            .lookup(self.scope(), &node.variable)
            .is_some_and(|symbol| symbol.has(SymbolProperties::LOOP_VARIABLE));
        let variable = self.variable(id, &node.variable, None)?;
        let from = self.index_expression(ast, node.from)?;
        let to = self.index_expression(ast, node.to)?;
        let step = match node.by {
            Some(by) => format!("{variable} += {}", self.index_expression(ast, by)?),
            None => format!("{variable}++"),
        };
        let declaration = if declared_here { "int " } else { "" };
        self.printer.start_block(&format!(
            "for ({declaration}{variable} = {from}; {variable} <= {to}; {step})"
        ));
        self.visit_node(ast, node.block)?;
        self.printer.end_block();
        Ok(())
    }

    fn visit_solve_block(&mut self, _ast: &Ast, id: NodeId, _node: &SolveBlock) -> Result<()> {
        if self.expand_solves {
            self.print_solve(id)?;
        }
        Ok(())
    }

    fn visit_verbatim(&mut self, _ast: &Ast, _id: NodeId, node: &Verbatim) -> Result<()> {
        for line in node.text.trim_matches('\n').lines() {
            self.printer.push_line(line.trim_end());
        }
        Ok(())
    }

    fn visit_mutex_lock(&mut self, _ast: &Ast, _id: NodeId, _node: &MutexLock) -> Result<()> {
        self.printer.push_comment("MUTEXLOCK");
        Ok(())
    }

    fn visit_mutex_unlock(&mut self, _ast: &Ast, _id: NodeId, _node: &MutexUnlock) -> Result<()> {
        self.printer.push_comment("MUTEXUNLOCK");
        Ok(())
    }

    fn visit_ontology_statement(&mut self, _ast: &Ast, _id: NodeId, node: &OntologyStatement) -> Result<()> {
        self.printer.push_comment(&format!("ontology: {}", node.term));
        Ok(())
    }

    fn visit_eigen_linear_solver_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &EigenLinearSolverBlock,
    ) -> Result<()> {
        let comment = format!("linear system in {}", node.unknowns.join(", "));
        self.print_eigen_block(
            ast,
            comment,
            [
                node.variable_block,
                node.initialize_block,
                node.solve_block,
                node.update_states_block,
            ],
        )
    }

    fn visit_eigen_newton_solver_block(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &EigenNewtonSolverBlock,
    ) -> Result<()> {
        let comment = format!("newton iteration in {}", node.unknowns.join(", "));
        self.print_eigen_block(
            ast,
            comment,
            [
                node.variable_block,
                node.initialize_block,
                node.iteration_block,
                node.update_states_block,
            ],
        )
    }

    fn visit_diff_equation(&mut self, _ast: &Ast, id: NodeId, _node: &DiffEquation) -> Result<()> {
        Err(self.internal(id, "ODE must be lowered by a solve method before code generation"))
    }

    fn visit_lin_equation(&mut self, _ast: &Ast, id: NodeId, _node: &LinEquation) -> Result<()> {
        Err(self.internal(id, "equation must be lowered to a solver block before code generation"))
    }

    fn visit_reaction_statement(&mut self, _ast: &Ast, id: NodeId, _node: &ReactionStatement) -> Result<()> {
        Err(self.internal(id, "reaction must be lowered to ODEs before code generation"))
    }

    fn visit_conserve(&mut self, _ast: &Ast, id: NodeId, _node: &Conserve) -> Result<()> {
        Err(self.internal(id, "CONSERVE must be removed before code generation"))
    }

    fn visit_compartment(&mut self, _ast: &Ast, id: NodeId, _node: &Compartment) -> Result<()> {
        Err(self.internal(id, "COMPARTMENT must be removed before code generation"))
    }

    fn visit_lag_statement(&mut self, _ast: &Ast, id: NodeId, _node: &LagStatement) -> Result<()> {
        Err(self.unsupported(id, "LAG"))
    }

    fn visit_plot_directive(&mut self, _ast: &Ast, id: NodeId, _node: &PlotDirective) -> Result<()> {
        Err(self.unsupported(id, "PLOT"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CBackend;
    use mech_core::CompilationContext;
    use mech_optimize::PassPipeline;

    fn generate(source: &str) -> Result<String> {
        let mut ast = mech_lang::parse_source(source).value.expect("parses");
        let mut ctx = CompilationContext::new("test.mod");
        let status = PassPipeline::standard().run(&mut ast, &mut ctx)?;
        assert!(status.is_completed(), "{:?}", ctx.diagnostics.get_diagnostics());
        let table = ctx.symtab(PASS)?;
        let info = ctx.codegen_info(PASS)?;
        CodegenCVisitor::new(&ast, table, info, &CBackend, &CodegenOptions::default())
            .with_source_name("test.mod")
            .generate()
    }

    fn has_line(code: &str, line: &str) -> bool {
        code.lines().any(|candidate| candidate.trim() == line)
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(c_identifier("na-chan"), "na_chan");
        assert_eq!(c_identifier("3d"), "_3d");
        assert_eq!(c_identifier("hh"), "hh");
    }

    #[test]
    fn leak_current_reads_instance_storage() {
        let code = generate(
            r#"
NEURON {
    SUFFIX leak
    NONSPECIFIC_CURRENT i
    RANGE g, e
}
PARAMETER { g = 0.001 e = -70 }
ASSIGNED { v i }
BREAKPOINT { i = g * (v - e) }
"#,
        )
        .expect("generates");
        assert!(has_line(&code, "inst->i[id] = inst->g[id] * (v - inst->e[id]);"), "{code}");
        assert!(has_line(&code, "current += inst->i[id];"), "{code}");
        assert!(has_line(&code, "double g = nrn_current_leak(inst, nt, id, v + 0.001);"), "{code}");
        assert!(has_line(&code, "void nrn_cur_leak(NrnThread* nt, Memb_list* ml, int type) {"), "{code}");
        assert!(!code.contains("nrn_state_leak"), "{code}");
    }

    #[test]
    fn functions_return_through_their_name() {
        let code = generate(
            r#"
NEURON { SUFFIX fn RANGE x }
ASSIGNED { x }
FUNCTION twice(a) { twice = 2 * a }
INITIAL { x = twice(3) }
"#,
        )
        .expect("generates");
        assert!(
            has_line(&code, "static inline double twice(fn_Instance* inst, NrnThread* nt, int id, double v, double a);"),
            "{code}"
        );
        assert!(has_line(&code, "ret_twice = 2.0 * a;"), "{code}");
        assert!(has_line(&code, "return ret_twice;"), "{code}");
        assert!(has_line(&code, "inst->x[id] = twice(inst, nt, id, v, 3.0);"), "{code}");
    }

    #[test]
    fn left_associative_chains_keep_their_grouping() {
        let code = generate(
            r#"
NEURON { SUFFIX chain RANGE x, a, b, c }
ASSIGNED { x a b c }
INITIAL {
    x = a - b - c
    x = -a * b
    x = a / (b * c)
}
"#,
        )
        .expect("generates");
        assert!(has_line(&code, "inst->x[id] = inst->a[id] - inst->b[id] - inst->c[id];"), "{code}");
        assert!(has_line(&code, "inst->x[id] = -inst->a[id] * inst->b[id];"), "{code}");
        assert!(has_line(&code, "inst->x[id] = inst->a[id] / (inst->b[id] * inst->c[id]);"), "{code}");
    }

    #[test]
    fn loops_declare_their_counter() {
        let code = generate(
            r#"
NEURON { SUFFIX loop RANGE x }
ASSIGNED { x }
INITIAL {
    FROM i = 0 TO 3 {
        x = x + i
    }
}
"#,
        )
        .expect("generates");
        assert!(has_line(&code, "for (int i = 0; i <= 3; i++) {"), "{code}");
        assert!(has_line(&code, "inst->x[id] = inst->x[id] + i;"), "{code}");
    }

    #[test]
    fn integer_literals_divide_as_floats() {
        let code = generate(
            r#"
NEURON { SUFFIX half RANGE x }
ASSIGNED { x }
INITIAL {
    LOCAL w[4]
    x = 1/2
    w[2] = -3
    x = w[1 + 1]
}
"#,
        )
        .expect("generates");
        assert!(has_line(&code, "inst->x[id] = 1.0 / 2.0;"), "{code}");
        assert!(has_line(&code, "w[2] = -3.0;"), "{code}");
        assert!(has_line(&code, "inst->x[id] = w[1 + 1];"), "{code}");
    }
}
