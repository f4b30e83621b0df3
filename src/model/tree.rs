//! The live subject tree handed to rules.

use super::arena::Arena;
use super::node::NodeId;
use crate::Result;

/// An arena plus a distinguished root. Construction validates the ownership
/// invariant, standing in for the parser contract: the engine fails fast on
/// malformed input rather than matching over it.
#[derive(Debug, Clone)]
pub struct SubjectTree {
    pub(crate) arena: Arena,
    pub(crate) root: NodeId,
}

impl SubjectTree {
    pub fn new(arena: Arena, root: NodeId) -> Result<Self> {
        arena.validate_ownership(root)?;
        Ok(Self { arena, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Re-check the ownership invariant over the current tree.
    pub fn validate(&self) -> Result<()> {
        self.arena.validate_ownership(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeKind};

    #[test]
    fn test_new_validates() {
        let mut arena = Arena::new();
        let nop = arena.leaf(NodeKind::Nop);
        let root = arena.insert(
            Node::new(NodeKind::If).with_child("then", nop).with_child("else", nop),
        );
        assert!(SubjectTree::new(arena, root).is_err());
    }

    #[test]
    fn test_new_ok() {
        let mut arena = Arena::new();
        let nop = arena.leaf(NodeKind::Nop);
        let root = arena.insert(Node::new(NodeKind::If).with_child("then", nop));
        let tree = SubjectTree::new(arena, root).unwrap();
        assert_eq!(tree.root(), root);
    }
}
