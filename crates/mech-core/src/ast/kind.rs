use super::nodes::*;
use super::NodeId;

/// Invokes `$callback!` with the full list of node kinds as
/// `Variant => visit_method, transform_method;` entries.
#[doc(hidden)]
#[macro_export]
macro_rules! for_each_node_kind {
    ($callback:ident) => {
        $callback! {
            Program => visit_program, transform_program;
            ModelTitle => visit_model_title, transform_model_title;
            NeuronBlock => visit_neuron_block, transform_neuron_block;
            Suffix => visit_suffix, transform_suffix;
            Range => visit_range, transform_range;
            Global => visit_global, transform_global;
            Useion => visit_useion, transform_useion;
            Nonspecific => visit_nonspecific, transform_nonspecific;
            ElectrodeCurrent => visit_electrode_current, transform_electrode_current;
            Pointer => visit_pointer, transform_pointer;
            BbcorePointer => visit_bbcore_pointer, transform_bbcore_pointer;
            ThreadSafe => visit_thread_safe, transform_thread_safe;
            ParamBlock => visit_param_block, transform_param_block;
            ParamAssign => visit_param_assign, transform_param_assign;
            StateBlock => visit_state_block, transform_state_block;
            StateVar => visit_state_var, transform_state_var;
            AssignedBlock => visit_assigned_block, transform_assigned_block;
            AssignedDefinition => visit_assigned_definition, transform_assigned_definition;
            ConstantBlock => visit_constant_block, transform_constant_block;
            ConstantStatement => visit_constant_statement, transform_constant_statement;
            UnitBlock => visit_unit_block, transform_unit_block;
            UnitDef => visit_unit_def, transform_unit_def;
            IndependentBlock => visit_independent_block, transform_independent_block;
            Argument => visit_argument, transform_argument;
            LocalList => visit_local_list, transform_local_list;
            LocalVar => visit_local_var, transform_local_var;
            InitialBlock => visit_initial_block, transform_initial_block;
            BreakpointBlock => visit_breakpoint_block, transform_breakpoint_block;
            DerivativeBlock => visit_derivative_block, transform_derivative_block;
            KineticBlock => visit_kinetic_block, transform_kinetic_block;
            LinearBlock => visit_linear_block, transform_linear_block;
            NonLinearBlock => visit_non_linear_block, transform_non_linear_block;
            ProcedureBlock => visit_procedure_block, transform_procedure_block;
            FunctionBlock => visit_function_block, transform_function_block;
            NetReceiveBlock => visit_net_receive_block, transform_net_receive_block;
            ConstructorBlock => visit_constructor_block, transform_constructor_block;
            DestructorBlock => visit_destructor_block, transform_destructor_block;
            BeforeBlock => visit_before_block, transform_before_block;
            AfterBlock => visit_after_block, transform_after_block;
            DiscreteBlock => visit_discrete_block, transform_discrete_block;
            PartialBlock => visit_partial_block, transform_partial_block;
            MatchBlock => visit_match_block, transform_match_block;
            FunctionTableBlock => visit_function_table_block, transform_function_table_block;
            EigenLinearSolverBlock => visit_eigen_linear_solver_block, transform_eigen_linear_solver_block;
            EigenNewtonSolverBlock => visit_eigen_newton_solver_block, transform_eigen_newton_solver_block;
            StatementBlock => visit_statement_block, transform_statement_block;
            ExpressionStatement => visit_expression_statement, transform_expression_statement;
            Assignment => visit_assignment, transform_assignment;
            DiffEquation => visit_diff_equation, transform_diff_equation;
            LinEquation => visit_lin_equation, transform_lin_equation;
            If => visit_if, transform_if;
            ElseIf => visit_else_if, transform_else_if;
            While => visit_while, transform_while;
            FromStatement => visit_from_statement, transform_from_statement;
            SolveBlock => visit_solve_block, transform_solve_block;
            ReactionStatement => visit_reaction_statement, transform_reaction_statement;
            ReactVarName => visit_react_var_name, transform_react_var_name;
            Conserve => visit_conserve, transform_conserve;
            Compartment => visit_compartment, transform_compartment;
            LagStatement => visit_lag_statement, transform_lag_statement;
            MutexLock => visit_mutex_lock, transform_mutex_lock;
            MutexUnlock => visit_mutex_unlock, transform_mutex_unlock;
            PlotDirective => visit_plot_directive, transform_plot_directive;
            PlotVar => visit_plot_var, transform_plot_var;
            OntologyStatement => visit_ontology_statement, transform_ontology_statement;
            Verbatim => visit_verbatim, transform_verbatim;
            Integer => visit_integer, transform_integer;
            Double => visit_double, transform_double;
            StringLit => visit_string_lit, transform_string_lit;
            Name => visit_name, transform_name;
            PrimeName => visit_prime_name, transform_prime_name;
            IndexedName => visit_indexed_name, transform_indexed_name;
            BinaryExpression => visit_binary_expression, transform_binary_expression;
            UnaryExpression => visit_unary_expression, transform_unary_expression;
            ParenExpression => visit_paren_expression, transform_paren_expression;
            FunctionCall => visit_function_call, transform_function_call;
        }
    };
}

/// Typed access to one payload variant of [`NodeKind`].
pub trait NodeCast: Sized {
    fn cast(kind: &NodeKind) -> Option<&Self>;
    fn cast_mut(kind: &mut NodeKind) -> Option<&mut Self>;
}

macro_rules! define_node_kinds {
    ($($variant:ident => $visit:ident, $transform:ident;)*) => {
        /// Closed set of node kinds.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum NodeKind {
            $($variant($variant),)*
        }

        /// Payload-free tag of a [`NodeKind`].
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum NodeType {
            $($variant,)*
        }

        impl NodeKind {
            pub fn node_type(&self) -> NodeType {
                match self {
                    $(NodeKind::$variant(_) => NodeType::$variant,)*
                }
            }

            pub fn for_each_child(&self, f: &mut dyn FnMut(NodeId)) {
                match self {
                    $(NodeKind::$variant(node) => node.for_each_child(f),)*
                }
            }

            pub fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut NodeId)) {
                match self {
                    $(NodeKind::$variant(node) => node.for_each_child_mut(f),)*
                }
            }
        }

        impl NodeType {
            pub const ALL: &'static [NodeType] = &[$(NodeType::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(NodeType::$variant => stringify!($variant),)*
                }
            }

            pub fn from_name(name: &str) -> Option<NodeType> {
                match name {
                    $(stringify!($variant) => Some(NodeType::$variant),)*
                    _ => None,
                }
            }
        }

        $(
            impl From<$variant> for NodeKind {
                fn from(node: $variant) -> Self {
                    NodeKind::$variant(node)
                }
            }

            impl NodeCast for $variant {
                fn cast(kind: &NodeKind) -> Option<&Self> {
                    match kind {
                        NodeKind::$variant(node) => Some(node),
                        _ => None,
                    }
                }

                fn cast_mut(kind: &mut NodeKind) -> Option<&mut Self> {
                    match kind {
                        NodeKind::$variant(node) => Some(node),
                        _ => None,
                    }
                }
            }
        )*
    };
}

for_each_node_kind!(define_node_kinds);

impl NodeKind {
    pub fn kind_name(&self) -> &'static str {
        self.node_type().as_str()
    }

    pub fn children(&self) -> Vec<NodeId> {
        let mut children = Vec::new();
        self.for_each_child(&mut |id| children.push(id));
        children
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeType {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeType::Integer
                | NodeType::Double
                | NodeType::StringLit
                | NodeType::Name
                | NodeType::PrimeName
                | NodeType::IndexedName
                | NodeType::BinaryExpression
                | NodeType::UnaryExpression
                | NodeType::ParenExpression
                | NodeType::FunctionCall
        )
    }

    /// Top-level blocks that carry a name and a statement body which SOLVE can target.
    pub fn is_solvable_block(&self) -> bool {
        matches!(
            self,
            NodeType::DerivativeBlock
                | NodeType::KineticBlock
                | NodeType::LinearBlock
                | NodeType::NonLinearBlock
        )
    }

    /// Nodes that open a new symbol scope.
    pub fn opens_scope(&self) -> bool {
        matches!(
            self,
            NodeType::Program
                | NodeType::StatementBlock
                | NodeType::ProcedureBlock
                | NodeType::FunctionBlock
                | NodeType::NetReceiveBlock
                | NodeType::FunctionTableBlock
                | NodeType::EigenLinearSolverBlock
                | NodeType::EigenNewtonSolverBlock
        )
    }
}
