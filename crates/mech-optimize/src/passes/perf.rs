//! Operation and memory-access counts per top-level code block.

use crate::pass::{OptimizePass, PassName};
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp};
use mech_core::codegen_info::{BlockPerf, PerfReport, PerfStat};
use mech_core::symtab::{ScopeCursor, SymbolProperties, SymbolTable};
use mech_core::visitor::{walk_node, AstVisitor};
use mech_core::{CompilationContext, Result};
use std::collections::BTreeSet;

pub struct PerfPass;

impl OptimizePass for PerfPass {
    fn name(&self) -> PassName {
        PassName::Perf
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let report = PerfVisitor::report(ast, ctx.symtab(PassName::Perf.as_str())?)?;
        mech_core::debug!(
            "perf: {} block(s), {} arithmetic op(s) in total",
            report.blocks.len(),
            report.total.arithmetic()
        );
        ctx.perf = Some(report);
        Ok(())
    }
}

/// `DERIVATIVE states`, `BREAKPOINT`, ... for a top-level code block.
pub fn block_label(ast: &Ast, id: NodeId) -> Option<String> {
    let keyword = match ast.kind(id) {
        NodeKind::InitialBlock(_) => "INITIAL",
        NodeKind::BreakpointBlock(_) => "BREAKPOINT",
        NodeKind::DerivativeBlock(_) => "DERIVATIVE",
        NodeKind::KineticBlock(_) => "KINETIC",
        NodeKind::LinearBlock(_) => "LINEAR",
        NodeKind::NonLinearBlock(_) => "NONLINEAR",
        NodeKind::ProcedureBlock(_) => "PROCEDURE",
        NodeKind::FunctionBlock(_) => "FUNCTION",
        NodeKind::NetReceiveBlock(_) => "NET_RECEIVE",
        NodeKind::ConstructorBlock(_) => "CONSTRUCTOR",
        NodeKind::DestructorBlock(_) => "DESTRUCTOR",
        NodeKind::BeforeBlock(_) => "BEFORE",
        NodeKind::AfterBlock(_) => "AFTER",
        NodeKind::DiscreteBlock(_) => "DISCRETE",
        _ => return None,
    };
    Some(match ast.block_name(id) {
        Some(name) => format!("{keyword} {name}"),
        None => keyword.to_string(),
    })
}

#[derive(Default)]
struct Accesses {
    global_reads: BTreeSet<String>,
    global_writes: BTreeSet<String>,
    local_reads: BTreeSet<String>,
    local_writes: BTreeSet<String>,
}

enum Storage {
    Local,
    Global,
    Constant,
}

pub struct PerfVisitor<'t> {
    table: &'t SymbolTable,
    cursor: ScopeCursor,
    stat: PerfStat,
    accesses: Accesses,
    blocks: Vec<BlockPerf>,
}

impl<'t> PerfVisitor<'t> {
    pub fn new(table: &'t SymbolTable) -> Self {
        PerfVisitor {
            table,
            cursor: ScopeCursor::new(),
            stat: PerfStat::default(),
            accesses: Accesses::default(),
            blocks: Vec::new(),
        }
    }

    pub fn report(ast: &Ast, table: &'t SymbolTable) -> Result<PerfReport> {
        let mut visitor = PerfVisitor::new(table);
        visitor.visit_node(ast, ast.root())?;
        let mut total = PerfStat::default();
        for block in &visitor.blocks {
            total += block.stat;
        }
        Ok(PerfReport {
            blocks: visitor.blocks,
            total,
        })
    }

    fn storage(&self, name: &str) -> Storage {
        let symbol = self
            .cursor
            .current()
            .and_then(|scope| self.table.lookup(scope, name));
        match symbol {
            Some(symbol) if symbol.has(SymbolProperties::CONSTANT) => Storage::Constant,
            Some(symbol)
                if symbol.has(
                    SymbolProperties::LOCAL
                        | SymbolProperties::ARGUMENT
                        | SymbolProperties::LOOP_VARIABLE,
                ) =>
            {
                Storage::Local
            }
            _ => Storage::Global,
        }
    }

    fn read(&mut self, name: &str) {
        match self.storage(name) {
            Storage::Constant => self.stat.constant_reads += 1,
            Storage::Local => {
                self.stat.local_reads += 1;
                self.accesses.local_reads.insert(name.to_string());
            }
            Storage::Global => {
                self.stat.global_reads += 1;
                self.accesses.global_reads.insert(name.to_string());
            }
        }
    }

    fn write(&mut self, name: &str) {
        match self.storage(name) {
            Storage::Local => {
                self.stat.local_writes += 1;
                self.accesses.local_writes.insert(name.to_string());
            }
            Storage::Global | Storage::Constant => {
                self.stat.global_writes += 1;
                self.accesses.global_writes.insert(name.to_string());
            }
        }
    }

    fn write_target(&mut self, ast: &Ast, target: NodeId) -> Result<()> {
        match ast.kind(target) {
            NodeKind::Name(name) => {
                self.write(&name.name);
                Ok(())
            }
            NodeKind::IndexedName(indexed) => {
                self.write(&indexed.name);
                self.visit_node(ast, indexed.index)
            }
            _ => self.visit_node(ast, target),
        }
    }

    fn measure_block(&mut self, ast: &Ast, id: NodeId, label: String) -> Result<()> {
        self.stat = PerfStat::default();
        self.accesses = Accesses::default();
        self.visit_node(ast, id)?;
        let accesses = std::mem::take(&mut self.accesses);
        let mut stat = std::mem::take(&mut self.stat);
        stat.unique_global_reads = accesses.global_reads.len() as u32;
        stat.unique_global_writes = accesses.global_writes.len() as u32;
        stat.unique_local_reads = accesses.local_reads.len() as u32;
        stat.unique_local_writes = accesses.local_writes.len() as u32;
        self.blocks.push(BlockPerf {
            node: id,
            label,
            stat,
        });
        Ok(())
    }
}

impl AstVisitor for PerfVisitor<'_> {
    fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
        let entered = self.cursor.enter(self.table, id);
        walk_node(self, ast, id)?;
        if entered {
            self.cursor.leave(id);
        }
        Ok(())
    }

    fn visit_program(&mut self, ast: &Ast, _id: NodeId, _node: &Program) -> Result<()> {
        for block in ast.top_level() {
            if ast.block_body(block).is_none() {
                continue;
            }
            if let Some(label) = block_label(ast, block) {
                self.measure_block(ast, block, label)?;
            }
        }
        Ok(())
    }

    fn visit_local_list(&mut self, _ast: &Ast, _id: NodeId, _node: &LocalList) -> Result<()> {
        Ok(())
    }

    fn visit_binary_expression(&mut self, ast: &Ast, id: NodeId, node: &BinaryExpression) -> Result<()> {
        match node.op {
            BinaryOp::Add => self.stat.add += 1,
            BinaryOp::Sub => self.stat.sub += 1,
            BinaryOp::Mul => self.stat.mul += 1,
            BinaryOp::Div => self.stat.div += 1,
            BinaryOp::Pow => self.stat.pow += 1,
            BinaryOp::And | BinaryOp::Or => self.stat.logical_ops += 1,
            _ => self.stat.comparisons += 1,
        }
        self.visit_children(ast, id)
    }

    fn visit_unary_expression(&mut self, ast: &Ast, id: NodeId, node: &UnaryExpression) -> Result<()> {
        match node.op {
            UnaryOp::Neg => self.stat.negations += 1,
            UnaryOp::Not => self.stat.logical_ops += 1,
        }
        self.visit_children(ast, id)
    }

    fn visit_function_call(&mut self, ast: &Ast, id: NodeId, node: &FunctionCall) -> Result<()> {
        match node.name.as_str() {
            "exp" => self.stat.exp += 1,
            "log" | "log10" => self.stat.log += 1,
            "pow" => self.stat.pow += 1,
            name => {
                let internal = self
                    .cursor
                    .current()
                    .and_then(|scope| self.table.lookup(scope, name))
                    .is_some_and(|symbol| symbol.has(SymbolProperties::CALLABLE));
                if internal {
                    self.stat.internal_calls += 1;
                } else {
                    self.stat.external_calls += 1;
                }
            }
        }
        self.visit_children(ast, id)
    }

    fn visit_assignment(&mut self, ast: &Ast, _id: NodeId, node: &Assignment) -> Result<()> {
        self.visit_node(ast, node.rhs)?;
        self.write_target(ast, node.lhs)
    }

    fn visit_diff_equation(&mut self, ast: &Ast, _id: NodeId, node: &DiffEquation) -> Result<()> {
        self.visit_node(ast, node.rhs)?;
        match ast.cast::<PrimeName>(node.lhs) {
            Some(prime) => {
                self.write(&prime.name);
                Ok(())
            }
            None => self.write_target(ast, node.lhs),
        }
    }

    fn visit_from_statement(&mut self, ast: &Ast, id: NodeId, node: &FromStatement) -> Result<()> {
        self.write(&node.variable);
        self.visit_children(ast, id)
    }

    fn visit_name(&mut self, _ast: &Ast, _id: NodeId, node: &Name) -> Result<()> {
        self.read(&node.name);
        Ok(())
    }

    fn visit_prime_name(&mut self, _ast: &Ast, _id: NodeId, node: &PrimeName) -> Result<()> {
        self.read(&node.name);
        Ok(())
    }

    fn visit_indexed_name(&mut self, ast: &Ast, id: NodeId, node: &IndexedName) -> Result<()> {
        self.read(&node.name);
        self.visit_children(ast, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::symtab::SymtabPass;
    use pretty_assertions::assert_eq;

    fn report(source: &str) -> PerfReport {
        let mut ast = mech_lang::parse_source(source).value.expect("parses");
        let mut ctx = CompilationContext::new("perf.mod");
        SymtabPass.run(&mut ast, &mut ctx).unwrap();
        PerfPass.run(&mut ast, &mut ctx).unwrap();
        ctx.perf.expect("report")
    }

    #[test]
    fn counts_operations_and_accesses_per_block() {
        let report = report(
            "PARAMETER { g }\nASSIGNED { i v2 }\n\
             BREAKPOINT {\n LOCAL x\n x = g * v + exp(-v)\n i = x * x / 2\n}\n\
             FUNCTION twice(a) { twice = 2 * a }\n",
        );
        let labels: Vec<_> = report.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["BREAKPOINT", "FUNCTION twice"]);

        let breakpoint = report.blocks[0].stat;
        assert_eq!(breakpoint.mul, 2);
        assert_eq!(breakpoint.div, 1);
        assert_eq!(breakpoint.add, 1);
        assert_eq!(breakpoint.exp, 1);
        assert_eq!(breakpoint.negations, 1);
        assert_eq!(breakpoint.global_reads, 3);
        assert_eq!(breakpoint.unique_global_reads, 2);
        assert_eq!(breakpoint.global_writes, 1);
        assert_eq!(breakpoint.local_reads, 2);
        assert_eq!(breakpoint.local_writes, 1);
        assert_eq!(breakpoint.unique_local_reads, 1);

        assert_eq!(report.total.mul, 3);
    }

    #[test]
    fn calls_are_split_between_user_and_library_functions() {
        let report = report(
            "ASSIGNED { y }\nINITIAL { y = f(1) + fabs(-2) + pow(y, 2) }\nFUNCTION f(a) { f = a }\n",
        );
        let initial = report.blocks[0].stat;
        assert_eq!(initial.internal_calls, 1);
        assert_eq!(initial.external_calls, 1);
        assert_eq!(initial.pow, 1);
    }
}
