use crate::ast::NodeId;
use crate::span::Span;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set describing how a name was declared. Declarations of the same
/// name in the NEURON block and in a variable block OR their properties.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct SymbolProperties(u32);

macro_rules! symbol_properties {
    ($($name:ident = $bit:expr => $label:literal;)*) => {
        impl SymbolProperties {
            $(pub const $name: SymbolProperties = SymbolProperties(1 << $bit);)*

            const LABELS: &'static [(SymbolProperties, &'static str)] = &[
                $((SymbolProperties::$name, $label),)*
            ];
        }
    };
}

symbol_properties! {
    RANGE = 0 => "range";
    GLOBAL = 1 => "global";
    PARAMETER = 2 => "parameter";
    STATE = 3 => "state";
    ASSIGNED = 4 => "assigned";
    CONSTANT = 5 => "constant";
    LOCAL = 6 => "local";
    ARGUMENT = 7 => "argument";
    FUNCTION = 8 => "function";
    PROCEDURE = 9 => "procedure";
    ION_READ = 10 => "read_ion";
    ION_WRITE = 11 => "write_ion";
    NONSPECIFIC_CURRENT = 12 => "nonspecific_current";
    ELECTRODE_CURRENT = 13 => "electrode_current";
    POINTER = 14 => "pointer";
    BBCORE_POINTER = 15 => "bbcore_pointer";
    BUILTIN = 16 => "builtin";
    DERIVATIVE_BLOCK = 17 => "derivative_block";
    KINETIC_BLOCK = 18 => "kinetic_block";
    LINEAR_BLOCK = 19 => "linear_block";
    NON_LINEAR_BLOCK = 20 => "non_linear_block";
    FUNCTION_TABLE = 21 => "function_table";
    UNIT_FACTOR = 22 => "unit_factor";
    LOOP_VARIABLE = 23 => "loop_variable";
}

impl SymbolProperties {
    pub const NONE: SymbolProperties = SymbolProperties(0);

    /// Declarations that give a name its storage or body. Two of these for
    /// one name in one scope conflict.
    pub const DEFINING: SymbolProperties = SymbolProperties(
        Self::PARAMETER.0
            | Self::STATE.0
            | Self::ASSIGNED.0
            | Self::CONSTANT.0
            | Self::LOCAL.0
            | Self::ARGUMENT.0
            | Self::FUNCTION.0
            | Self::PROCEDURE.0
            | Self::DERIVATIVE_BLOCK.0
            | Self::KINETIC_BLOCK.0
            | Self::LINEAR_BLOCK.0
            | Self::NON_LINEAR_BLOCK.0
            | Self::FUNCTION_TABLE.0
            | Self::UNIT_FACTOR.0,
    );

    pub const SOLVABLE: SymbolProperties = SymbolProperties(
        Self::DERIVATIVE_BLOCK.0
            | Self::KINETIC_BLOCK.0
            | Self::LINEAR_BLOCK.0
            | Self::NON_LINEAR_BLOCK.0,
    );

    pub const CALLABLE: SymbolProperties = SymbolProperties(
        Self::FUNCTION.0 | Self::PROCEDURE.0 | Self::FUNCTION_TABLE.0,
    );

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: SymbolProperties) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: SymbolProperties) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: SymbolProperties) {
        self.0 |= other.0;
    }

    pub fn labels(self) -> Vec<&'static str> {
        Self::LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }
}

impl BitOr for SymbolProperties {
    type Output = SymbolProperties;

    fn bitor(self, rhs: SymbolProperties) -> SymbolProperties {
        SymbolProperties(self.0 | rhs.0)
    }
}

impl BitOrAssign for SymbolProperties {
    fn bitor_assign(&mut self, rhs: SymbolProperties) {
        self.insert(rhs);
    }
}

impl fmt::Display for SymbolProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels().join(" "))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

common_struct! {
    pub struct Symbol {
        pub name: String,
        pub properties: SymbolProperties,
        pub scope: ScopeId,
        /// Span of the first declaration.
        pub span: Span,
        /// Declaring node, `None` for builtins.
        pub node: Option<NodeId>,
        pub reads: u32,
        pub writes: u32,
        pub length: Option<u32>,
        pub unit: Option<String>,
        /// Literal initial value from PARAMETER/CONSTANT, source spelling.
        pub value: Option<String>,
        /// Position in declaration order within the owning scope.
        pub order: u32,
    }
}

impl Symbol {
    pub fn new(name: impl Into<String>, properties: SymbolProperties, scope: ScopeId, span: Span) -> Self {
        Symbol {
            name: name.into(),
            properties,
            scope,
            span,
            node: None,
            reads: 0,
            writes: 0,
            length: None,
            unit: None,
            value: None,
            order: 0,
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_value(mut self, value: Option<String>) -> Self {
        self.value = value;
        self
    }

    pub fn has(&self, properties: SymbolProperties) -> bool {
        self.properties.intersects(properties)
    }

    pub fn is_array(&self) -> bool {
        self.length.is_some()
    }
}
