use super::{walk_node, AstVisitor};
use crate::ast::{Ast, NodeId, NodeType};
use crate::error::Result;

/// Collects, in traversal order, every node whose type is in `types`.
pub struct AstLookupVisitor {
    types: Vec<NodeType>,
    found: Vec<NodeId>,
}

impl AstLookupVisitor {
    pub fn new(types: &[NodeType]) -> Self {
        Self {
            types: types.to_vec(),
            found: Vec::new(),
        }
    }

    pub fn lookup(ast: &Ast, start: NodeId, types: &[NodeType]) -> Vec<NodeId> {
        let mut visitor = Self::new(types);
        // walking the arena cannot fail for this visitor
        let _ = visitor.visit_node(ast, start);
        visitor.found
    }

    pub fn into_found(self) -> Vec<NodeId> {
        self.found
    }
}

impl AstVisitor for AstLookupVisitor {
    fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
        if self.types.contains(&ast.node_type(id)) {
            self.found.push(id);
        }
        walk_node(self, ast, id)
    }
}
