//! Storage of every program-level name in the generated code.

use mech_core::codegen_info::CodegenInfo;
use mech_core::symtab::{Symbol, SymbolProperties, SymbolTable};
use std::collections::HashMap;

/// Physical constants the language provides by name.
pub const PHYSICAL_CONSTANTS: &[(&str, &str)] = &[
    ("PI", "3.14159265358979323846"),
    ("FARADAY", "96485.3321233100184"),
    ("R", "8.31446261815324"),
];

/// Runtime state shared by every instance of every mechanism.
pub const RUNTIME_VARIABLES: &[&str] = &["celsius"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One float per instance.
    Float,
    /// Pointer into another mechanism's storage.
    Pointer,
    /// Opaque runtime handle.
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub length: Option<u32>,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    pub name: String,
    pub length: Option<u32>,
    /// Source spelling of the initial value.
    pub value: Option<String>,
}

/// How a resolved program-level name is spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Per-instance field `field`.
    Instance { field: String, length: Option<u32>, kind: FieldKind },
    /// Member of the global store.
    Global { length: Option<u32> },
    /// `nt->t`, `nt->dt`.
    Thread,
    /// Spelled as written: constants, runtime variables, the voltage.
    Plain,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub instance: Vec<Field>,
    pub globals: Vec<GlobalVariable>,
    /// `static const` values from CONSTANT blocks.
    pub constants: Vec<GlobalVariable>,
    /// Named physical constants that are referenced.
    pub defines: Vec<(String, String)>,
    /// Runtime variables that are referenced.
    pub runtime: Vec<String>,
    /// UNITS factors without a known value.
    pub unknown_factors: Vec<String>,
    access: HashMap<String, Access>,
}

fn used(symbol: &Symbol) -> bool {
    symbol.reads + symbol.writes > 0
}

impl Layout {
    pub fn new(table: &SymbolTable, info: &CodegenInfo) -> Self {
        let mut layout = Layout::default();
        let lookup = |name: &str| table.lookup_global(name);

        for name in &info.range_variables {
            let length = lookup(name).and_then(|symbol| symbol.length);
            layout.add_field(name, name, length, FieldKind::Float);
        }
        for ion in &info.ions {
            for variable in ion.reads.iter().chain(&ion.writes) {
                let field = format!("ion_{variable}");
                layout.add_field(variable, &field, None, FieldKind::Float);
            }
        }
        for current in &info.currents {
            layout.add_field(current, current, None, FieldKind::Float);
        }
        for name in &info.pointer_variables {
            layout.add_field(name, name, None, FieldKind::Pointer);
        }
        for name in &info.bbcore_pointer_variables {
            layout.add_field(name, name, None, FieldKind::Opaque);
        }
        for name in ["area", "diam"] {
            if lookup(name).is_some_and(used) {
                layout.add_field(name, name, None, FieldKind::Float);
            }
        }
        if info.is_point_process() {
            layout.instance.push(Field {
                name: "node_area".into(),
                length: None,
                kind: FieldKind::Float,
            });
        }

        for name in &info.global_variables {
            let symbol = lookup(name);
            let length = symbol.and_then(|symbol| symbol.length);
            layout.globals.push(GlobalVariable {
                name: name.clone(),
                length,
                value: symbol.and_then(|symbol| symbol.value.clone()),
            });
            layout.access.insert(name.clone(), Access::Global { length });
        }
        for name in &info.constant_variables {
            let symbol = lookup(name);
            layout.constants.push(GlobalVariable {
                name: name.clone(),
                length: None,
                value: symbol.and_then(|symbol| symbol.value.clone()),
            });
            layout.access.entry(name.clone()).or_insert(Access::Plain);
        }

        for name in ["t", "dt"] {
            layout.access.entry(name.into()).or_insert(Access::Thread);
        }
        layout.access.entry("v".into()).or_insert(Access::Plain);
        for name in RUNTIME_VARIABLES {
            if lookup(name).is_some_and(used) {
                layout.runtime.push(name.to_string());
            }
            layout.access.entry(name.to_string()).or_insert(Access::Plain);
        }
        for (name, value) in PHYSICAL_CONSTANTS {
            if lookup(name).is_some_and(used) {
                layout.defines.push((name.to_string(), value.to_string()));
            }
            layout.access.entry(name.to_string()).or_insert(Access::Plain);
        }
        for symbol in table.globals_with(SymbolProperties::UNIT_FACTOR) {
            let known = PHYSICAL_CONSTANTS.iter().any(|(name, _)| *name == symbol.name);
            if !known && used(symbol) {
                layout.unknown_factors.push(symbol.name.clone());
            }
        }
        layout
    }

    fn add_field(&mut self, name: &str, field: &str, length: Option<u32>, kind: FieldKind) {
        if self.access.contains_key(name) {
            return;
        }
        self.instance.push(Field {
            name: field.to_string(),
            length,
            kind,
        });
        self.access.insert(
            name.to_string(),
            Access::Instance {
                field: field.to_string(),
                length,
                kind,
            },
        );
    }

    pub fn access(&self, name: &str) -> Option<&Access> {
        self.access.get(name)
    }
}
