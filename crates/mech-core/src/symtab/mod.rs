//! Scoped symbol table built by the symtab pass and read by every later
//! pass. Scopes are attached to the node that opened them; lookups walk the
//! parent chain, so a use never holds a pointer to its declaration.

mod symbol;

pub use symbol::{ScopeId, Symbol, SymbolProperties};

use crate::ast::{NodeId, NodeType};
use crate::span::Span;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    /// Node that opened the scope.
    pub node: Option<NodeId>,
    pub node_type: NodeType,
    symbols: Vec<Symbol>,
    index: BTreeMap<String, usize>,
}

impl Scope {
    fn new(id: ScopeId, parent: Option<ScopeId>, node: Option<NodeId>, node_type: NodeType) -> Self {
        Scope {
            id,
            parent,
            node,
            node_type,
            symbols: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        match self.index.get(name) {
            Some(&i) => self.symbols.get_mut(i),
            None => None,
        }
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Result of declaring a name in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    New,
    /// Properties were merged into an existing entry.
    Merged,
    /// A second defining declaration; carries the span of the first one.
    Duplicate(Span),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    by_node: BTreeMap<NodeId, ScopeId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for `node`. The first scope opened becomes the root.
    pub fn push_scope(&mut self, parent: Option<ScopeId>, node: Option<NodeId>, node_type: NodeType) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(id, parent, node, node_type));
        if let Some(node) = node {
            self.by_node.insert(node, id);
        }
        id
    }

    pub fn root(&self) -> Option<&Scope> {
        self.scopes.first()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.by_node.get(&node).copied()
    }

    pub fn declare(&mut self, scope: ScopeId, mut symbol: Symbol) -> Declared {
        let target = &mut self.scopes[scope.index()];
        if let Some(existing) = target.get_mut(&symbol.name) {
            if existing.properties.intersects(SymbolProperties::DEFINING)
                && symbol.properties.intersects(SymbolProperties::DEFINING)
            {
                return Declared::Duplicate(existing.span);
            }
            existing.properties |= symbol.properties;
            if symbol.properties.intersects(SymbolProperties::DEFINING) {
                existing.span = symbol.span;
                existing.node = symbol.node.or(existing.node);
            }
            existing.length = existing.length.or(symbol.length);
            existing.unit = existing.unit.take().or(symbol.unit);
            existing.value = existing.value.take().or(symbol.value);
            return Declared::Merged;
        }
        symbol.scope = scope;
        symbol.order = target.symbols.len() as u32;
        target.index.insert(symbol.name.clone(), target.symbols.len());
        target.symbols.push(symbol);
        Declared::New
    }

    /// Scope that declares `name`, searching outwards from `scope`.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let candidate = self.scope(id);
            if candidate.get(name).is_some() {
                return Some(id);
            }
            current = candidate.parent;
        }
        None
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.resolve(scope, name).and_then(|id| self.scope(id).get(name))
    }

    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.root().and_then(|root| root.get(name))
    }

    pub fn record_read(&mut self, scope: ScopeId, name: &str) -> bool {
        self.update(scope, name, |symbol| symbol.reads += 1)
    }

    pub fn record_write(&mut self, scope: ScopeId, name: &str) -> bool {
        self.update(scope, name, |symbol| symbol.writes += 1)
    }

    fn update(&mut self, scope: ScopeId, name: &str, f: impl FnOnce(&mut Symbol)) -> bool {
        let Some(owner) = self.resolve(scope, name) else {
            return false;
        };
        match self.scopes[owner.index()].get_mut(name) {
            Some(symbol) => {
                f(symbol);
                true
            }
            None => false,
        }
    }

    /// Program-level symbols carrying any of `properties`, in declaration order.
    pub fn globals_with(&self, properties: SymbolProperties) -> Vec<&Symbol> {
        self.root()
            .map(|root| {
                root.symbols()
                    .iter()
                    .filter(|symbol| symbol.has(properties))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn symbol_count(&self) -> usize {
        self.scopes.iter().map(Scope::len).sum()
    }
}

/// Innermost scope of a walk over an already analyzed tree. Walkers call
/// [`ScopeCursor::enter`] before a node's children and
/// [`ScopeCursor::leave`] after them.
#[derive(Debug, Clone, Default)]
pub struct ScopeCursor {
    stack: Vec<(NodeId, ScopeId)>,
}

impl ScopeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the scope opened by `node`, if it opened one.
    pub fn enter(&mut self, table: &SymbolTable, node: NodeId) -> bool {
        match table.scope_of(node) {
            Some(scope) => {
                self.stack.push((node, scope));
                true
            }
            None => false,
        }
    }

    pub fn leave(&mut self, node: NodeId) {
        if matches!(self.stack.last(), Some((top, _)) if *top == node) {
            self.stack.pop();
        }
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.stack.last().map(|(_, scope)| *scope)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> (SymbolTable, ScopeId) {
        let mut table = SymbolTable::new();
        let root = table.push_scope(None, None, NodeType::Program);
        (table, root)
    }

    #[test]
    fn neuron_and_parameter_declarations_merge() {
        let (mut table, root) = table();
        let range = Symbol::new("gbar", SymbolProperties::RANGE, root, Span::synthetic());
        let param = Symbol::new("gbar", SymbolProperties::PARAMETER, root, Span::synthetic())
            .with_value(Some("0.12".into()));
        assert_eq!(table.declare(root, range), Declared::New);
        assert_eq!(table.declare(root, param), Declared::Merged);
        let symbol = table.lookup_global("gbar").expect("declared");
        assert!(symbol.has(SymbolProperties::RANGE));
        assert!(symbol.has(SymbolProperties::PARAMETER));
        assert_eq!(symbol.value.as_deref(), Some("0.12"));
        assert_eq!(table.symbol_count(), 1);
    }

    #[test]
    fn second_defining_declaration_is_duplicate() {
        let (mut table, root) = table();
        let first = Span::new(0, 0, 1, 3, 5);
        table.declare(root, Symbol::new("m", SymbolProperties::STATE, root, first));
        let again = Symbol::new("m", SymbolProperties::ASSIGNED, root, Span::new(0, 9, 10, 8, 5));
        assert_eq!(table.declare(root, again), Declared::Duplicate(first));
    }

    #[test]
    fn cursor_follows_scoped_nodes() {
        let mut table = SymbolTable::new();
        let program = NodeId::from_index(0);
        let block = NodeId::from_index(4);
        let root = table.push_scope(None, Some(program), NodeType::Program);
        let inner = table.push_scope(Some(root), Some(block), NodeType::StatementBlock);
        let mut cursor = ScopeCursor::new();
        assert!(cursor.enter(&table, program));
        assert!(!cursor.enter(&table, NodeId::from_index(2)));
        assert!(cursor.enter(&table, block));
        assert_eq!(cursor.current(), Some(inner));
        cursor.leave(NodeId::from_index(2));
        assert_eq!(cursor.current(), Some(inner));
        cursor.leave(block);
        assert_eq!(cursor.current(), Some(root));
    }

    #[test]
    fn lookup_walks_to_enclosing_scope() {
        let (mut table, root) = table();
        table.declare(root, Symbol::new("v", SymbolProperties::BUILTIN, root, Span::synthetic()));
        let inner = table.push_scope(Some(root), None, NodeType::StatementBlock);
        table.declare(inner, Symbol::new("a", SymbolProperties::LOCAL, inner, Span::synthetic()));
        assert_eq!(table.resolve(inner, "v"), Some(root));
        assert_eq!(table.resolve(inner, "a"), Some(inner));
        assert_eq!(table.resolve(root, "a"), None);
        assert!(table.record_read(inner, "v"));
        assert_eq!(table.lookup_global("v").map(|s| s.reads), Some(1));
    }
}
