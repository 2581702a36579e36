//! Collects the facts the code generators need into one [`CodegenInfo`].

use crate::pass::{OptimizePass, PassName};
use crate::passes::symtab::literal_text;
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, NodeKind, NodeType};
use mech_core::codegen_info::{CodegenInfo, Ion, MechanismKind, SolveInfo};
use mech_core::symtab::{Symbol, SymbolProperties, SymbolTable};
use mech_core::visitor::AstLookupVisitor;
use mech_core::{CompilationContext, Result};
use std::path::Path;

pub struct CodegenInfoPass;

impl OptimizePass for CodegenInfoPass {
    fn name(&self) -> PassName {
        PassName::CodegenInfo
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let pass = PassName::CodegenInfo.as_str();
        let table = ctx.symtab(pass)?;
        let mut info = collect(ast, table, &ctx.file_name);
        info.perf = ctx.perf.clone().unwrap_or_default();
        mech_core::debug!(
            "codegen_info: `{}` with {} range, {} global, {} state variable(s)",
            info.mechanism_name,
            info.range_variables.len(),
            info.global_variables.len(),
            info.state_variables.len()
        );
        ctx.info = Some(info);
        Ok(())
    }
}

fn names_with(table: &SymbolTable, properties: SymbolProperties) -> Vec<String> {
    table
        .globals_with(properties)
        .into_iter()
        .map(|symbol| symbol.name.clone())
        .collect()
}

fn name_list(ast: &Ast, ids: &[mech_core::NodeId]) -> Vec<String> {
    ids.iter()
        .filter_map(|&id| ast.cast::<Name>(id).map(|name| name.name.clone()))
        .collect()
}

/// Everything except the performance report, which comes from the context.
pub fn collect(ast: &Ast, table: &SymbolTable, file_name: &str) -> CodegenInfo {
    let mut info = CodegenInfo {
        mechanism_name: Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ..Default::default()
    };

    for block in ast.top_level() {
        match ast.kind(block) {
            NodeKind::NeuronBlock(neuron) => {
                for &statement in &neuron.statements {
                    neuron_statement(ast, statement, &mut info);
                }
            }
            NodeKind::InitialBlock(_) => info.has_initial = true,
            NodeKind::BreakpointBlock(_) => info.has_breakpoint = true,
            NodeKind::NetReceiveBlock(_) => info.has_net_receive = true,
            _ => {}
        }
    }

    let ion_variable = |symbol: &Symbol| {
        symbol.has(SymbolProperties::ION_READ | SymbolProperties::ION_WRITE)
    };
    let excluded = SymbolProperties::BUILTIN
        | SymbolProperties::POINTER
        | SymbolProperties::BBCORE_POINTER;
    if let Some(root) = table.root() {
        for symbol in root.symbols() {
            if symbol.has(excluded) || ion_variable(symbol) {
                continue;
            }
            let range = symbol.has(SymbolProperties::RANGE)
                || (symbol.has(SymbolProperties::STATE | SymbolProperties::ASSIGNED)
                    && !symbol.has(SymbolProperties::GLOBAL));
            let global = symbol.has(SymbolProperties::GLOBAL)
                || (symbol.has(SymbolProperties::PARAMETER) && !symbol.has(SymbolProperties::RANGE));
            if range {
                info.range_variables.push(symbol.name.clone());
            } else if global {
                info.global_variables.push(symbol.name.clone());
            }
        }
    }
    info.parameters = names_with(table, SymbolProperties::PARAMETER);
    info.state_variables = names_with(table, SymbolProperties::STATE);
    info.assigned_variables = names_with(table, SymbolProperties::ASSIGNED);
    info.constant_variables = names_with(table, SymbolProperties::CONSTANT);
    info.pointer_variables = names_with(table, SymbolProperties::POINTER);
    info.bbcore_pointer_variables = names_with(table, SymbolProperties::BBCORE_POINTER);
    info.functions = names_with(table, SymbolProperties::FUNCTION);
    info.procedures = names_with(table, SymbolProperties::PROCEDURE);

    let root = ast.root();
    info.has_verbatim = !AstLookupVisitor::lookup(ast, root, &[NodeType::Verbatim]).is_empty();
    info.solves = AstLookupVisitor::lookup(ast, root, &[NodeType::SolveBlock])
        .into_iter()
        .filter_map(|id| ast.cast::<SolveBlock>(id))
        .map(|solve| SolveInfo {
            block: solve.block_name.clone(),
            method: solve.method.clone(),
        })
        .collect();
    for id in AstLookupVisitor::lookup(
        ast,
        root,
        &[NodeType::EigenLinearSolverBlock, NodeType::EigenNewtonSolverBlock],
    ) {
        let size = match ast.kind(id) {
            NodeKind::EigenLinearSolverBlock(block) => {
                info.eigen_linear_blocks += 1;
                block.unknowns.len()
            }
            NodeKind::EigenNewtonSolverBlock(block) => {
                info.eigen_newton_blocks += 1;
                block.unknowns.len()
            }
            _ => 0,
        };
        info.max_system_size = info.max_system_size.max(size);
    }
    info
}

fn neuron_statement(ast: &Ast, id: mech_core::NodeId, info: &mut CodegenInfo) {
    match ast.kind(id) {
        NodeKind::Suffix(suffix) => {
            info.mechanism_name = suffix.name.clone();
            info.kind = match suffix.kind {
                SuffixKind::Suffix => MechanismKind::Density,
                SuffixKind::PointProcess => MechanismKind::PointProcess,
            };
        }
        NodeKind::ThreadSafe(_) => info.thread_safe = true,
        NodeKind::Useion(useion) => {
            let ion = Ion {
                name: useion.ion.clone(),
                reads: name_list(ast, &useion.reads),
                writes: name_list(ast, &useion.writes),
                valence: useion.valence.and_then(|valence| literal_text(ast, valence)),
            };
            info.currents.extend(
                ion.writes
                    .iter()
                    .filter(|variable| ion.is_ionic_current(variable))
                    .cloned(),
            );
            info.ions.push(ion);
        }
        NodeKind::Nonspecific(currents) => {
            info.currents.extend(name_list(ast, &currents.currents))
        }
        NodeKind::ElectrodeCurrent(currents) => {
            info.currents.extend(name_list(ast, &currents.currents))
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::symtab::SymtabVisitor;
    use pretty_assertions::assert_eq;

    const HH: &str = "NEURON {\n SUFFIX hh\n USEION na READ ena WRITE ina\n \
                      NONSPECIFIC_CURRENT il\n RANGE gnabar\n GLOBAL minf\n THREADSAFE\n}\n\
                      PARAMETER { gnabar = 0.12 el = -54.3 }\n\
                      STATE { m }\n\
                      ASSIGNED { v ena ina il minf }\n\
                      BREAKPOINT { SOLVE states METHOD cnexp\n ina = gnabar * m * (v - ena)\n il = v - el }\n\
                      DERIVATIVE states { m' = (minf - m) }\n";

    fn collect_from(source: &str, file: &str) -> CodegenInfo {
        let ast = mech_lang::parse_source(source).value.expect("parses");
        let (table, _) = SymtabVisitor::build(&ast).unwrap();
        collect(&ast, &table, file)
    }

    #[test]
    fn variables_are_classified_by_declaration() {
        let info = collect_from(HH, "hh.mod");
        assert_eq!(info.mechanism_name, "hh");
        assert!(info.thread_safe);
        assert_eq!(info.range_variables, vec!["il", "gnabar", "m"]);
        assert_eq!(info.global_variables, vec!["minf", "el"]);
        assert_eq!(info.state_variables, vec!["m"]);
        assert_eq!(info.currents, vec!["ina", "il"]);
        assert_eq!(info.ions.len(), 1);
        assert_eq!(info.ions[0].reads, vec!["ena"]);
        assert_eq!(
            info.solves,
            vec![SolveInfo {
                block: "states".into(),
                method: Some("cnexp".into())
            }]
        );
        assert!(info.has_breakpoint && !info.has_initial);
    }

    #[test]
    fn point_process_without_suffix_name_falls_back_to_file() {
        let info = collect_from("ASSIGNED { x }\n", "dir/expsyn.mod");
        assert_eq!(info.mechanism_name, "expsyn");
        assert!(!info.is_point_process());
        let info = collect_from("NEURON { POINT_PROCESS ExpSyn }\n", "x.mod");
        assert!(info.is_point_process());
        assert_eq!(info.mechanism_name, "ExpSyn");
    }
}
