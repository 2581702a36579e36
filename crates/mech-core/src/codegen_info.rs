//! Per-unit metadata consumed by the code generators.

use crate::ast::NodeId;
use std::ops::AddAssign;

common_enum! {
    #[derive(Copy, Default)]
    pub enum MechanismKind {
        #[default]
        Density,
        PointProcess,
    }
}

common_struct! {
    #[derive(Default)]
    pub struct Ion {
        pub name: String,
        pub reads: Vec<String>,
        pub writes: Vec<String>,
        /// Valence in source spelling.
        pub valence: Option<String>,
    }
}

impl Ion {
    pub fn new(name: impl Into<String>) -> Self {
        Ion {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_read(&self, variable: &str) -> bool {
        self.reads.iter().any(|name| name == variable)
    }

    pub fn is_written(&self, variable: &str) -> bool {
        self.writes.iter().any(|name| name == variable)
    }

    /// `ina` for ion `na`.
    pub fn is_ionic_current(&self, variable: &str) -> bool {
        variable.strip_prefix('i') == Some(self.name.as_str())
    }

    /// `nai` for ion `na`.
    pub fn is_intra_concentration(&self, variable: &str) -> bool {
        variable.strip_suffix('i') == Some(self.name.as_str())
    }

    /// `nao` for ion `na`.
    pub fn is_extra_concentration(&self, variable: &str) -> bool {
        variable.strip_suffix('o') == Some(self.name.as_str())
    }
}

/// Operation counts for one block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct PerfStat {
    pub add: u32,
    pub sub: u32,
    pub mul: u32,
    pub div: u32,
    pub pow: u32,
    pub exp: u32,
    pub log: u32,
    pub internal_calls: u32,
    pub external_calls: u32,
    pub comparisons: u32,
    pub logical_ops: u32,
    pub negations: u32,
    pub global_reads: u32,
    pub global_writes: u32,
    pub unique_global_reads: u32,
    pub unique_global_writes: u32,
    pub local_reads: u32,
    pub local_writes: u32,
    pub unique_local_reads: u32,
    pub unique_local_writes: u32,
    pub constant_reads: u32,
}

impl PerfStat {
    pub fn arithmetic(&self) -> u32 {
        self.add + self.sub + self.mul + self.div + self.pow
    }

    pub fn calls(&self) -> u32 {
        self.internal_calls + self.external_calls + self.exp + self.log
    }

    pub fn memory_accesses(&self) -> u32 {
        self.global_reads + self.global_writes + self.local_reads + self.local_writes
    }
}

impl AddAssign for PerfStat {
    fn add_assign(&mut self, rhs: PerfStat) {
        self.add += rhs.add;
        self.sub += rhs.sub;
        self.mul += rhs.mul;
        self.div += rhs.div;
        self.pow += rhs.pow;
        self.exp += rhs.exp;
        self.log += rhs.log;
        self.internal_calls += rhs.internal_calls;
        self.external_calls += rhs.external_calls;
        self.comparisons += rhs.comparisons;
        self.logical_ops += rhs.logical_ops;
        self.negations += rhs.negations;
        self.global_reads += rhs.global_reads;
        self.global_writes += rhs.global_writes;
        self.unique_global_reads += rhs.unique_global_reads;
        self.unique_global_writes += rhs.unique_global_writes;
        self.local_reads += rhs.local_reads;
        self.local_writes += rhs.local_writes;
        self.unique_local_reads += rhs.unique_local_reads;
        self.unique_local_writes += rhs.unique_local_writes;
        self.constant_reads += rhs.constant_reads;
    }
}

common_struct! {
    pub struct BlockPerf {
        pub node: NodeId,
        /// `DERIVATIVE states`, `BREAKPOINT`, ...
        pub label: String,
        pub stat: PerfStat,
    }
}

common_struct! {
    #[derive(Default)]
    pub struct PerfReport {
        pub blocks: Vec<BlockPerf>,
        pub total: PerfStat,
    }
}

impl PerfReport {
    pub fn get(&self, node: NodeId) -> Option<&PerfStat> {
        self.blocks
            .iter()
            .find(|block| block.node == node)
            .map(|block| &block.stat)
    }
}

common_struct! {
    pub struct SolveInfo {
        pub block: String,
        pub method: Option<String>,
    }
}

common_struct! {
    #[derive(Default)]
    pub struct CodegenInfo {
        pub mechanism_name: String,
        pub kind: MechanismKind,
        pub thread_safe: bool,
        pub range_variables: Vec<String>,
        pub global_variables: Vec<String>,
        pub parameters: Vec<String>,
        pub state_variables: Vec<String>,
        pub assigned_variables: Vec<String>,
        pub constant_variables: Vec<String>,
        pub pointer_variables: Vec<String>,
        pub bbcore_pointer_variables: Vec<String>,
        pub ions: Vec<Ion>,
        pub currents: Vec<String>,
        pub functions: Vec<String>,
        pub procedures: Vec<String>,
        pub has_initial: bool,
        pub has_breakpoint: bool,
        pub has_net_receive: bool,
        pub has_verbatim: bool,
        pub solves: Vec<SolveInfo>,
        pub eigen_linear_blocks: usize,
        pub eigen_newton_blocks: usize,
        /// Largest number of unknowns of any lowered solver block.
        pub max_system_size: usize,
        pub perf: PerfReport,
    }
}

impl CodegenInfo {
    pub fn is_point_process(&self) -> bool {
        self.kind == MechanismKind::PointProcess
    }

    pub fn ion(&self, name: &str) -> Option<&Ion> {
        self.ions.iter().find(|ion| ion.name == name)
    }

    /// Ion that reads or writes `variable`.
    pub fn ion_for_variable(&self, variable: &str) -> Option<&Ion> {
        self.ions
            .iter()
            .find(|ion| ion.is_read(variable) || ion.is_written(variable))
    }

    pub fn ion_has_write_variable(&self) -> bool {
        self.ions.iter().any(|ion| !ion.writes.is_empty())
    }

    pub fn is_ion_write_variable(&self, variable: &str) -> bool {
        self.ions.iter().any(|ion| ion.is_written(variable))
    }

    pub fn is_ion_read_variable(&self, variable: &str) -> bool {
        self.ions.iter().any(|ion| ion.is_read(variable))
    }

    pub fn is_ion_variable(&self, variable: &str) -> bool {
        self.is_ion_read_variable(variable) || self.is_ion_write_variable(variable)
    }

    pub fn is_current(&self, variable: &str) -> bool {
        self.currents.iter().any(|current| current == variable)
    }

    pub fn is_state(&self, variable: &str) -> bool {
        self.state_variables.iter().any(|state| state == variable)
    }

    /// Whether a state update kernel has to be emitted.
    pub fn nrn_state_required(&self) -> bool {
        !self.solves.is_empty() || self.ion_has_write_variable()
    }

    pub fn uses_solver(&self) -> bool {
        self.eigen_linear_blocks + self.eigen_newton_blocks > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sodium() -> Ion {
        Ion {
            name: "na".into(),
            reads: vec!["ena".into()],
            writes: vec!["ina".into()],
            valence: None,
        }
    }

    #[test]
    fn ion_queries() {
        let info = CodegenInfo {
            ions: vec![sodium()],
            currents: vec!["ina".into()],
            ..Default::default()
        };
        assert!(info.ion_has_write_variable());
        assert!(info.is_ion_write_variable("ina"));
        assert!(info.is_ion_read_variable("ena"));
        assert!(info.is_ion_variable("ena"));
        assert!(!info.is_ion_variable("gna"));
        assert!(info.is_current("ina"));
        assert!(info.nrn_state_required());
        assert!(sodium().is_ionic_current("ina"));
        assert!(sodium().is_intra_concentration("nai"));
    }

    #[test]
    fn state_kernel_not_needed_without_solves_or_ion_writes() {
        let info = CodegenInfo::default();
        assert!(!info.nrn_state_required());
        assert!(!info.uses_solver());
    }

    #[test]
    fn perf_stats_accumulate() {
        let mut total = PerfStat::default();
        total += PerfStat { add: 2, mul: 1, ..Default::default() };
        total += PerfStat { add: 1, exp: 3, ..Default::default() };
        assert_eq!(total.arithmetic(), 4);
        assert_eq!(total.calls(), 3);
    }
}
