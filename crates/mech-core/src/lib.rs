//! Core data model of the mechanism compiler: the arena AST, the visitor
//! framework, the symbol table and the per-unit compilation context.

#[macro_use]
pub mod macros;

pub mod ast;
pub mod codegen_info;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod span;
pub mod symtab;
pub mod visitor;

// Re-export commonly used items for convenience
pub use tracing;

pub use ast::{Ast, Node, NodeId, NodeKind, NodeType};
pub use context::CompilationContext;

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
