//! Payloads of every node kind. Child references are [`NodeId`]s into the
//! owning [`Ast`](super::Ast); plain data (names, units, operators) is stored
//! inline.

use super::ops::{BinaryOp, ReactionOp, UnaryOp};
use super::NodeId;

/// Deterministic enumeration and in-place rewriting of child slots.
pub trait Children {
    fn for_each_child(&self, f: &mut dyn FnMut(NodeId));
    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut NodeId));
}

macro_rules! child_slot {
    (one, $slot:expr, $f:ident) => {
        $f($slot)
    };
    (opt, $slot:expr, $f:ident) => {
        if let Some(id) = $slot {
            $f(id)
        }
    };
    (many, $slot:expr, $f:ident) => {
        for id in $slot.iter() {
            $f(*id)
        }
    };
}

macro_rules! child_slot_mut {
    (one, $slot:expr, $f:ident) => {
        $f(&mut $slot)
    };
    (opt, $slot:expr, $f:ident) => {
        if let Some(id) = $slot.as_mut() {
            $f(id)
        }
    };
    (many, $slot:expr, $f:ident) => {
        for id in $slot.iter_mut() {
            $f(id)
        }
    };
}

macro_rules! impl_children {
    ($($ty:ident { $($field:ident : $shape:ident),* $(,)? })*) => {
        $(
            impl Children for $ty {
                #[allow(unused_variables)]
                fn for_each_child(&self, f: &mut dyn FnMut(NodeId)) {
                    $( child_slot!($shape, self.$field, f); )*
                }

                #[allow(unused_variables)]
                fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut NodeId)) {
                    $( child_slot_mut!($shape, self.$field, f); )*
                }
            }
        )*
    };
}

// ---------------------------------------------------------------- program

common_struct! {
    pub struct Program {
        pub blocks: Vec<NodeId>,
    }
}

common_struct! {
    pub struct ModelTitle {
        pub title: String,
    }
}

// ---------------------------------------------------------------- NEURON

common_struct! {
    pub struct NeuronBlock {
        pub statements: Vec<NodeId>,
    }
}

common_enum! {
    #[derive(Copy)]
    pub enum SuffixKind {
        Suffix,
        PointProcess,
    }
}

common_struct! {
    pub struct Suffix {
        pub kind: SuffixKind,
        pub name: String,
    }
}

common_struct! {
    pub struct Range {
        pub names: Vec<NodeId>,
    }
}

common_struct! {
    pub struct Global {
        pub names: Vec<NodeId>,
    }
}

common_struct! {
    pub struct Useion {
        pub ion: String,
        pub reads: Vec<NodeId>,
        pub writes: Vec<NodeId>,
        pub valence: Option<NodeId>,
    }
}

common_struct! {
    pub struct Nonspecific {
        pub currents: Vec<NodeId>,
    }
}

common_struct! {
    pub struct ElectrodeCurrent {
        pub currents: Vec<NodeId>,
    }
}

common_struct! {
    pub struct Pointer {
        pub names: Vec<NodeId>,
    }
}

common_struct! {
    pub struct BbcorePointer {
        pub names: Vec<NodeId>,
    }
}

common_struct! {
    pub struct ThreadSafe {
        pub names: Vec<NodeId>,
    }
}

// ---------------------------------------------------------------- declarations

common_struct! {
    pub struct Limits {
        pub lo: String,
        pub hi: String,
    }
}

common_struct! {
    pub struct ParamBlock {
        pub statements: Vec<NodeId>,
    }
}

common_struct! {
    pub struct ParamAssign {
        pub name: String,
        pub value: Option<NodeId>,
        pub unit: Option<String>,
        pub limits: Option<Limits>,
    }
}

common_struct! {
    pub struct StateBlock {
        pub statements: Vec<NodeId>,
    }
}

common_struct! {
    pub struct StateVar {
        pub name: String,
        pub unit: Option<String>,
    }
}

common_struct! {
    pub struct AssignedBlock {
        pub definitions: Vec<NodeId>,
    }
}

common_struct! {
    pub struct AssignedDefinition {
        pub name: String,
        pub length: Option<u32>,
        pub unit: Option<String>,
    }
}

common_struct! {
    pub struct ConstantBlock {
        pub statements: Vec<NodeId>,
    }
}

common_struct! {
    pub struct ConstantStatement {
        pub name: String,
        pub value: NodeId,
        pub unit: Option<String>,
    }
}

common_struct! {
    pub struct UnitBlock {
        pub definitions: Vec<NodeId>,
    }
}

common_struct! {
    /// `(mV) = (millivolt)` or the named factor form `FARADAY = (faraday) (coulomb)`.
    pub struct UnitDef {
        pub name: Option<String>,
        pub from: String,
        pub to: String,
    }
}

common_struct! {
    pub struct IndependentBlock {
        pub text: String,
    }
}

common_struct! {
    pub struct Argument {
        pub name: String,
        pub unit: Option<String>,
    }
}

common_struct! {
    pub struct LocalList {
        pub variables: Vec<NodeId>,
    }
}

common_struct! {
    pub struct LocalVar {
        pub name: String,
        pub length: Option<u32>,
    }
}

// ---------------------------------------------------------------- code blocks

common_struct! {
    pub struct InitialBlock {
        pub body: NodeId,
    }
}

common_struct! {
    pub struct BreakpointBlock {
        pub body: NodeId,
    }
}

common_struct! {
    pub struct DerivativeBlock {
        pub name: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct KineticBlock {
        pub name: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct LinearBlock {
        pub name: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct NonLinearBlock {
        pub name: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct ProcedureBlock {
        pub name: String,
        pub arguments: Vec<NodeId>,
        pub unit: Option<String>,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct FunctionBlock {
        pub name: String,
        pub arguments: Vec<NodeId>,
        pub unit: Option<String>,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct NetReceiveBlock {
        pub arguments: Vec<NodeId>,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct ConstructorBlock {
        pub body: NodeId,
    }
}

common_struct! {
    pub struct DestructorBlock {
        pub body: NodeId,
    }
}

common_struct! {
    pub struct BeforeBlock {
        pub target: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct AfterBlock {
        pub target: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct DiscreteBlock {
        pub name: String,
        pub body: NodeId,
    }
}

common_struct! {
    pub struct PartialBlock {
        pub name: String,
        pub text: String,
    }
}

common_struct! {
    pub struct MatchBlock {
        pub text: String,
    }
}

common_struct! {
    pub struct FunctionTableBlock {
        pub name: String,
        pub arguments: Vec<NodeId>,
        pub unit: Option<String>,
    }
}

common_struct! {
    /// Lowered form of a LINEAR block: a dense `n x n` system solved once.
    pub struct EigenLinearSolverBlock {
        pub unknowns: Vec<String>,
        pub variable_block: NodeId,
        pub initialize_block: NodeId,
        pub solve_block: NodeId,
        pub update_states_block: NodeId,
    }
}

common_struct! {
    /// Lowered form of a NONLINEAR block or an implicit derivative solve.
    pub struct EigenNewtonSolverBlock {
        pub unknowns: Vec<String>,
        pub variable_block: NodeId,
        pub initialize_block: NodeId,
        pub iteration_block: NodeId,
        pub update_states_block: NodeId,
    }
}

// ---------------------------------------------------------------- statements

common_struct! {
    pub struct StatementBlock {
        pub statements: Vec<NodeId>,
    }
}

common_struct! {
    pub struct ExpressionStatement {
        pub expression: NodeId,
    }
}

common_struct! {
    pub struct Assignment {
        pub lhs: NodeId,
        pub rhs: NodeId,
    }
}

common_struct! {
    pub struct DiffEquation {
        pub lhs: NodeId,
        pub rhs: NodeId,
    }
}

common_struct! {
    /// `~ lhs = rhs` inside LINEAR and NONLINEAR blocks.
    pub struct LinEquation {
        pub lhs: NodeId,
        pub rhs: NodeId,
    }
}

common_struct! {
    pub struct If {
        pub condition: NodeId,
        pub then_block: NodeId,
        pub else_ifs: Vec<NodeId>,
        pub else_block: Option<NodeId>,
    }
}

common_struct! {
    pub struct ElseIf {
        pub condition: NodeId,
        pub block: NodeId,
    }
}

common_struct! {
    pub struct While {
        pub condition: NodeId,
        pub block: NodeId,
    }
}

common_struct! {
    pub struct FromStatement {
        pub variable: String,
        pub from: NodeId,
        pub to: NodeId,
        pub by: Option<NodeId>,
        pub block: NodeId,
    }
}

common_struct! {
    pub struct SolveBlock {
        pub block_name: String,
        pub method: Option<String>,
        pub steadystate: Option<String>,
    }
}

common_struct! {
    pub struct ReactionStatement {
        pub op: ReactionOp,
        pub lhs: Vec<NodeId>,
        pub rhs: Vec<NodeId>,
        pub forward_rate: NodeId,
        pub backward_rate: Option<NodeId>,
    }
}

common_struct! {
    pub struct ReactVarName {
        pub name: String,
        pub coefficient: Option<u32>,
    }
}

common_struct! {
    pub struct Conserve {
        pub react: Vec<NodeId>,
        pub expr: NodeId,
    }
}

common_struct! {
    pub struct Compartment {
        pub volume: NodeId,
        pub names: Vec<NodeId>,
    }
}

common_struct! {
    pub struct LagStatement {
        pub name: String,
        pub by: String,
    }
}

common_struct! {
    pub struct MutexLock {}
}

common_struct! {
    pub struct MutexUnlock {}
}

common_struct! {
    pub struct PlotDirective {
        pub variables: Vec<NodeId>,
        pub against: NodeId,
    }
}

common_struct! {
    pub struct PlotVar {
        pub name: String,
        pub index: Option<NodeId>,
    }
}

common_struct! {
    pub struct OntologyStatement {
        pub term: String,
    }
}

common_struct! {
    pub struct Verbatim {
        pub text: String,
    }
}

// ---------------------------------------------------------------- expressions

common_struct! {
    pub struct Integer {
        pub value: i64,
    }
}

common_struct! {
    /// Floating literal kept in its source spelling so output is stable.
    pub struct Double {
        pub value: String,
    }
}

common_struct! {
    pub struct StringLit {
        pub value: String,
    }
}

common_struct! {
    pub struct Name {
        pub name: String,
    }
}

common_struct! {
    /// `x'` (order 1) or `x''` (order 2).
    pub struct PrimeName {
        pub name: String,
        pub order: u8,
    }
}

common_struct! {
    pub struct IndexedName {
        pub name: String,
        pub index: NodeId,
    }
}

common_struct! {
    pub struct BinaryExpression {
        pub op: BinaryOp,
        pub lhs: NodeId,
        pub rhs: NodeId,
    }
}

common_struct! {
    pub struct UnaryExpression {
        pub op: UnaryOp,
        pub operand: NodeId,
    }
}

common_struct! {
    pub struct ParenExpression {
        pub expr: NodeId,
    }
}

common_struct! {
    pub struct FunctionCall {
        pub name: String,
        pub arguments: Vec<NodeId>,
    }
}

impl Double {
    pub fn from_f64(value: f64) -> Self {
        Double {
            value: render_float(value),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.parse().ok()
    }
}

/// Spelling of a float literal that always reads back as a float.
pub fn render_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl_children! {
    Program { blocks: many }
    ModelTitle {}
    NeuronBlock { statements: many }
    Suffix {}
    Range { names: many }
    Global { names: many }
    Useion { reads: many, writes: many, valence: opt }
    Nonspecific { currents: many }
    ElectrodeCurrent { currents: many }
    Pointer { names: many }
    BbcorePointer { names: many }
    ThreadSafe { names: many }
    ParamBlock { statements: many }
    ParamAssign { value: opt }
    StateBlock { statements: many }
    StateVar {}
    AssignedBlock { definitions: many }
    AssignedDefinition {}
    ConstantBlock { statements: many }
    ConstantStatement { value: one }
    UnitBlock { definitions: many }
    UnitDef {}
    IndependentBlock {}
    Argument {}
    LocalList { variables: many }
    LocalVar {}
    InitialBlock { body: one }
    BreakpointBlock { body: one }
    DerivativeBlock { body: one }
    KineticBlock { body: one }
    LinearBlock { body: one }
    NonLinearBlock { body: one }
    ProcedureBlock { arguments: many, body: one }
    FunctionBlock { arguments: many, body: one }
    NetReceiveBlock { arguments: many, body: one }
    ConstructorBlock { body: one }
    DestructorBlock { body: one }
    BeforeBlock { body: one }
    AfterBlock { body: one }
    DiscreteBlock { body: one }
    PartialBlock {}
    MatchBlock {}
    FunctionTableBlock { arguments: many }
    EigenLinearSolverBlock {
        variable_block: one,
        initialize_block: one,
        solve_block: one,
        update_states_block: one,
    }
    EigenNewtonSolverBlock {
        variable_block: one,
        initialize_block: one,
        iteration_block: one,
        update_states_block: one,
    }
    StatementBlock { statements: many }
    ExpressionStatement { expression: one }
    Assignment { lhs: one, rhs: one }
    DiffEquation { lhs: one, rhs: one }
    LinEquation { lhs: one, rhs: one }
    If { condition: one, then_block: one, else_ifs: many, else_block: opt }
    ElseIf { condition: one, block: one }
    While { condition: one, block: one }
    FromStatement { from: one, to: one, by: opt, block: one }
    SolveBlock {}
    ReactionStatement { lhs: many, rhs: many, forward_rate: one, backward_rate: opt }
    ReactVarName {}
    Conserve { react: many, expr: one }
    Compartment { volume: one, names: many }
    LagStatement {}
    MutexLock {}
    MutexUnlock {}
    PlotDirective { variables: many, against: one }
    PlotVar { index: opt }
    OntologyStatement {}
    Verbatim {}
    Integer {}
    Double {}
    StringLit {}
    Name {}
    PrimeName {}
    IndexedName { index: one }
    BinaryExpression { lhs: one, rhs: one }
    UnaryExpression { operand: one }
    ParenExpression { expr: one }
    FunctionCall { arguments: many }
}
