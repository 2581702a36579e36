//! Arena-backed abstract syntax tree.
//!
//! Nodes live in [`Ast::nodes`] and refer to their children by [`NodeId`].
//! Replacing a subtree overwrites one child slot; the detached subtree simply
//! becomes unreachable. Reachable nodes always form a strict tree, which
//! [`Ast::verify_tree`] checks.

mod builder;
pub mod json;
mod kind;
pub mod nodes;
pub mod ops;

pub use kind::{NodeCast, NodeKind, NodeType};
pub use nodes::*;
pub use ops::{BinaryOp, ReactionOp, UnaryOp};

use crate::error::{Error, Result};
use crate::span::Span;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: u32) -> NodeId {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    /// An arena holding an empty `Program` root.
    pub fn new() -> Self {
        let mut ast = Ast {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        ast.root = ast.alloc(Program { blocks: Vec::new() }, Span::synthetic());
        ast
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, kind: impl Into<NodeKind>, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind: kind.into(),
            span,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Panics on an id that did not come from this arena.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.kind(id).node_type()
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id.index()].span = span;
    }

    pub fn cast<T: NodeCast>(&self, id: NodeId) -> Option<&T> {
        T::cast(self.kind(id))
    }

    pub fn cast_mut<T: NodeCast>(&mut self, id: NodeId) -> Option<&mut T> {
        T::cast_mut(self.kind_mut(id))
    }

    /// Like [`Ast::cast`] but a mismatch is an internal invariant violation.
    pub fn expect<T: NodeCast>(&self, id: NodeId, pass: &str, expected: &str) -> Result<&T> {
        match T::cast(self.kind(id)) {
            Some(node) => Ok(node),
            None => Err(Error::internal(
                pass,
                self.node_type(id).as_str(),
                self.span(id),
                format!("expected {expected}"),
            )),
        }
    }

    /// Direct children in their stable order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// Overwrite the child slot of `parent` holding `old` with `new`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        let mut replaced = false;
        self.kind_mut(parent).for_each_child_mut(&mut |slot| {
            if !replaced && *slot == old {
                *slot = new;
                replaced = true;
            }
        });
        if replaced {
            Ok(())
        } else {
            Err(Error::internal(
                "ast",
                self.node_type(parent).as_str(),
                self.span(parent),
                format!("{old} is not a child of {parent}"),
            ))
        }
    }

    /// Replace the payload stored at `id`, keeping its span and position in the tree.
    pub fn replace_node(&mut self, id: NodeId, kind: impl Into<NodeKind>) {
        self.nodes[id.index()].kind = kind.into();
    }

    /// Copy the subtree rooted at `id` into fresh nodes.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let mut node = self.node(id).clone();
        let children = node.kind.children();
        let copies: Vec<NodeId> = children.into_iter().map(|c| self.deep_clone(c)).collect();
        let mut next = copies.into_iter();
        node.kind.for_each_child_mut(&mut |slot| {
            if let Some(copy) = next.next() {
                *slot = copy;
            }
        });
        let new_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        new_id
    }

    /// Pre-order list of every node reachable from `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children = self.children(current);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Map from each reachable node to its parent.
    pub fn parents(&self) -> HashMap<NodeId, NodeId> {
        let mut parents = HashMap::new();
        for id in self.descendants(self.root) {
            for child in self.children(id) {
                parents.insert(child, id);
            }
        }
        parents
    }

    /// Walk the reachable tree and check that every node is reached exactly
    /// once and every child id is valid. Returns the number of reachable nodes.
    pub fn verify_tree(&self) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut stack = vec![(self.root, None::<NodeId>)];
        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.get(id) else {
                let (kind, span) = parent
                    .map(|p| (self.node_type(p).as_str(), self.span(p)))
                    .unwrap_or(("Program", Span::synthetic()));
                return Err(Error::internal(
                    "verify_tree",
                    kind,
                    span,
                    format!("dangling child reference {id}"),
                ));
            };
            if !seen.insert(id) {
                return Err(Error::internal(
                    "verify_tree",
                    node.node_type().as_str(),
                    node.span,
                    format!("node {id} has more than one parent"),
                ));
            }
            for child in node.kind.children().into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }
        Ok(seen.len())
    }

    /// Top-level blocks in source order.
    pub fn top_level(&self) -> Vec<NodeId> {
        match self.cast::<Program>(self.root) {
            Some(program) => program.blocks.clone(),
            None => Vec::new(),
        }
    }

    /// The SOLVE-able block (DERIVATIVE, KINETIC, LINEAR, NONLINEAR) with this name.
    pub fn find_solvable_block(&self, name: &str) -> Option<NodeId> {
        self.top_level()
            .into_iter()
            .find(|id| self.block_name(*id) == Some(name) && self.node_type(*id).is_solvable_block())
    }

    /// Declared name of a named top-level block.
    pub fn block_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::DerivativeBlock(b) => Some(&b.name),
            NodeKind::KineticBlock(b) => Some(&b.name),
            NodeKind::LinearBlock(b) => Some(&b.name),
            NodeKind::NonLinearBlock(b) => Some(&b.name),
            NodeKind::ProcedureBlock(b) => Some(&b.name),
            NodeKind::FunctionBlock(b) => Some(&b.name),
            NodeKind::DiscreteBlock(b) => Some(&b.name),
            NodeKind::PartialBlock(b) => Some(&b.name),
            NodeKind::FunctionTableBlock(b) => Some(&b.name),
            _ => None,
        }
    }

    /// Statement body of a code block, if it has one.
    pub fn block_body(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::InitialBlock(b) => Some(b.body),
            NodeKind::BreakpointBlock(b) => Some(b.body),
            NodeKind::DerivativeBlock(b) => Some(b.body),
            NodeKind::KineticBlock(b) => Some(b.body),
            NodeKind::LinearBlock(b) => Some(b.body),
            NodeKind::NonLinearBlock(b) => Some(b.body),
            NodeKind::ProcedureBlock(b) => Some(b.body),
            NodeKind::FunctionBlock(b) => Some(b.body),
            NodeKind::NetReceiveBlock(b) => Some(b.body),
            NodeKind::ConstructorBlock(b) => Some(b.body),
            NodeKind::DestructorBlock(b) => Some(b.body),
            NodeKind::BeforeBlock(b) => Some(b.body),
            NodeKind::AfterBlock(b) => Some(b.body),
            NodeKind::DiscreteBlock(b) => Some(b.body),
            _ => None,
        }
    }

    /// Drop unreachable nodes and renumber the rest in pre-order.
    pub fn compact(&self) -> Ast {
        let mut out = Ast {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        out.root = self.copy_into(self.root, &mut out);
        out
    }

    fn copy_into(&self, id: NodeId, out: &mut Ast) -> NodeId {
        let slot = NodeId(out.nodes.len() as u32);
        out.nodes.push(self.node(id).clone());
        let copies: Vec<NodeId> = self
            .children(id)
            .into_iter()
            .map(|child| self.copy_into(child, out))
            .collect();
        let mut next = copies.into_iter();
        out.nodes[slot.index()].kind.for_each_child_mut(&mut |child| {
            if let Some(copy) = next.next() {
                *child = copy;
            }
        });
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_of_names(ast: &mut Ast) -> NodeId {
        let a = ast.name("a", Span::synthetic());
        let b = ast.name("b", Span::synthetic());
        ast.binary(BinaryOp::Add, a, b, Span::synthetic())
    }

    #[test]
    fn children_follow_field_order() {
        let mut ast = Ast::new();
        let sum = sum_of_names(&mut ast);
        let children = ast.children(sum);
        assert_eq!(children.len(), 2);
        assert_eq!(ast.cast::<Name>(children[0]).map(|n| n.name.as_str()), Some("a"));
        assert_eq!(ast.cast::<Name>(children[1]).map(|n| n.name.as_str()), Some("b"));
    }

    #[test]
    fn replace_child_overwrites_slot() {
        let mut ast = Ast::new();
        let sum = sum_of_names(&mut ast);
        let rhs = ast.children(sum)[1];
        let c = ast.name("c", Span::synthetic());
        ast.replace_child(sum, rhs, c).unwrap();
        assert_eq!(ast.children(sum)[1], c);
        assert!(ast.replace_child(sum, rhs, c).is_err());
    }

    #[test]
    fn shared_child_breaks_tree_invariant() {
        let mut ast = Ast::new();
        let a = ast.name("a", Span::synthetic());
        let twice = ast.binary(BinaryOp::Mul, a, a, Span::synthetic());
        let stmt = ast.alloc(ExpressionStatement { expression: twice }, Span::synthetic());
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);
        let err = ast.verify_tree().unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn deep_clone_produces_fresh_nodes() {
        let mut ast = Ast::new();
        let sum = sum_of_names(&mut ast);
        let copy = ast.deep_clone(sum);
        let twice = ast.binary(BinaryOp::Mul, sum, copy, Span::synthetic());
        let stmt = ast.alloc(ExpressionStatement { expression: twice }, Span::synthetic());
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);
        assert_eq!(ast.verify_tree().unwrap(), 9);
    }

    #[test]
    fn compact_drops_unreachable_nodes() {
        let mut ast = Ast::new();
        let orphan = sum_of_names(&mut ast);
        let kept = ast.name("k", Span::synthetic());
        let stmt = ast.alloc(ExpressionStatement { expression: kept }, Span::synthetic());
        let root = ast.root();
        ast.cast_mut::<Program>(root).unwrap().blocks.push(stmt);
        assert!(ast.len() > 3);
        let compact = ast.compact();
        assert_eq!(compact.len(), 3);
        assert_eq!(compact.verify_tree().unwrap(), 3);
        let _ = orphan;
    }
}
