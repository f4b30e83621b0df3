//! Handle-addressed node storage.
//!
//! All subject nodes live in one `Arena` and reference each other by
//! [`NodeId`]. Nothing is ever freed: a splice leaves the replaced region in
//! place, unreachable from the root, and ownership validation only counts
//! references among reachable nodes.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::atom::Atom;
use super::kind::NodeKind;
use super::node::{Node, NodeId, Slot};
use crate::{Error, Result};

/// Arena of subject nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, returning its handle.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Resolve a handle.
    ///
    /// Panics on a handle that does not belong to this arena; handles are
    /// only produced by [`Arena::insert`], so a stale one is a logic error.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Fallible handle resolution for callers outside the engine.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    // ========================================================================
    // Construction helpers
    // ========================================================================

    /// A childless node of `kind`.
    pub fn leaf(&mut self, kind: NodeKind) -> NodeId {
        self.insert(Node::new(kind))
    }

    /// An identifier node.
    pub fn ident(&mut self, name: impl Into<String>) -> NodeId {
        self.insert(Node::new(NodeKind::Ident).with_atom(Atom::Name(name.into())))
    }

    /// An integer literal node.
    pub fn int(&mut self, value: i64) -> NodeId {
        self.insert(Node::new(NodeKind::IntLit).with_atom(Atom::Int(value)))
    }

    /// A string literal node.
    pub fn str_lit(&mut self, value: impl Into<String>) -> NodeId {
        self.insert(Node::new(NodeKind::StrLit).with_atom(Atom::Str(value.into())))
    }

    // ========================================================================
    // Item-model primitives
    // ========================================================================

    /// Copy a node's own fields without its children (all slots empty).
    pub fn clone_shallow(&self, id: NodeId) -> Node {
        let src = self.node(id);
        Node::new(src.kind).with_atom(src.atom.clone())
    }

    /// Debug label naming a node, e.g. `If#3` or `Ident(x)#7`.
    pub fn label(&self, id: NodeId) -> String {
        let n = self.node(id);
        if n.atom.is_none() {
            format!("{}#{id}", n.kind)
        } else {
            format!("{}({})#{id}", n.kind, n.atom)
        }
    }

    /// Child handles of a node across all slots, in slot order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children().collect()
    }

    // ========================================================================
    // Structural equality
    // ========================================================================

    /// Deep, order-sensitive structural equality. Collections compare in
    /// canonical stored order, so the result is deterministic.
    pub fn deep_eq(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (na, nb) = (self.node(a), self.node(b));
        if na.kind != nb.kind || na.atom != nb.atom {
            return false;
        }
        for (sa, sb) in na.slots().iter().zip(nb.slots()) {
            let (ca, cb) = (sa.children(), sb.children());
            if ca.len() != cb.len() {
                return false;
            }
            if !ca.iter().zip(cb).all(|(&x, &y)| self.deep_eq(x, y)) {
                return false;
            }
        }
        true
    }

    // ========================================================================
    // Duplication
    // ========================================================================

    /// Deep-copy a subtree for substitution. Identifier nodes are shared,
    /// never duplicated, so declare-once/use-many references stay intact.
    /// Every copied node has its freshness mark cleared.
    pub fn duplicate(&mut self, id: NodeId) -> NodeId {
        if self.node(id).is_identifier() {
            return id;
        }
        let (kind, atom, old_slots) = {
            let src = self.node(id);
            (src.kind, src.atom.clone(), src.slots.clone())
        };
        let mut copy = Node::new(kind).with_atom(atom);
        copy.clean = false;
        for (i, slot) in old_slots.iter().enumerate() {
            copy.slots[i] = match slot {
                Slot::Optional(opt) => Slot::Optional(opt.map(|c| self.duplicate(c))),
                Slot::Sequence(v) => {
                    Slot::Sequence(v.iter().map(|&c| self.duplicate(c)).collect())
                }
                Slot::Collection(v) => {
                    let mut copies: Vec<NodeId> =
                        v.iter().map(|&c| self.duplicate(c)).collect();
                    copies.sort_unstable();
                    Slot::Collection(copies)
                }
            };
        }
        self.insert(copy)
    }

    // ========================================================================
    // Freshness marks
    // ========================================================================

    /// Reset every freshness mark. Called at the start of each rule.
    pub fn mark_all_clean(&mut self) {
        for n in &mut self.nodes {
            n.clean = true;
        }
    }

    /// Is every node of the subtree unmarked by substitution?
    pub fn subtree_clean(&self, id: NodeId) -> bool {
        let n = self.node(id);
        n.clean && n.children().all(|c| self.subtree_clean(c))
    }

    // ========================================================================
    // Ownership validation
    // ========================================================================

    /// Nodes reachable from `root`, preorder, each listed once.
    pub fn reachable(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            let n = self.node(id);
            for slot in n.slots() {
                for &c in slot.children().iter().rev() {
                    stack.push(c);
                }
            }
        }
        order
    }

    /// Check the single-owner invariant over the region reachable from
    /// `root`: every non-identifier node has exactly one incoming reference
    /// (the root has zero); identifiers may have at most one incoming
    /// reference from a declaring slot plus any number of usage references.
    pub fn validate_ownership(&self, root: NodeId) -> Result<()> {
        let reachable = self.reachable(root);
        let live: HashSet<NodeId> = reachable.iter().copied().collect();
        let mut total: HashMap<NodeId, u32> = HashMap::new();
        let mut declaring: HashMap<NodeId, u32> = HashMap::new();

        for &id in &reachable {
            let n = self.node(id);
            for (slot, spec) in n.slots().iter().zip(n.kind.layout()) {
                for &c in slot.children() {
                    if !live.contains(&c) {
                        continue;
                    }
                    *total.entry(c).or_insert(0) += 1;
                    if spec.declaring {
                        *declaring.entry(c).or_insert(0) += 1;
                    }
                }
            }
        }

        for &id in &reachable {
            let n = self.node(id);
            let incoming = total.get(&id).copied().unwrap_or(0);
            if n.is_identifier() {
                let decls = declaring.get(&id).copied().unwrap_or(0);
                if decls > 1 {
                    return Err(Error::OwnershipViolation {
                        node: self.label(id),
                        detail: format!("identifier declared {decls} times"),
                    });
                }
            } else if id == root {
                if incoming != 0 {
                    return Err(Error::OwnershipViolation {
                        node: self.label(id),
                        detail: format!("root has {incoming} incoming references"),
                    });
                }
            } else if incoming != 1 {
                return Err(Error::OwnershipViolation {
                    node: self.label(id),
                    detail: format!("expected exactly one incoming reference, found {incoming}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kind::NodeKind;

    fn small_if(arena: &mut Arena) -> NodeId {
        let x = arena.ident("x");
        let y = arena.ident("y");
        let call = arena.insert(
            Node::new(NodeKind::Call).with_child("callee", y).with_seq("args", vec![]),
        );
        let body = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![call]));
        let nop = arena.leaf(NodeKind::Nop);
        arena.insert(
            Node::new(NodeKind::If)
                .with_child("cond", x)
                .with_child("then", body)
                .with_child("else", nop),
        )
    }

    #[test]
    fn test_builders_and_labels() {
        let mut arena = Arena::new();
        let id = arena.ident("x");
        assert_eq!(arena.label(id), "Ident(x)#0");
        let nop = arena.leaf(NodeKind::Nop);
        assert_eq!(arena.label(nop), "Nop#1");
    }

    #[test]
    fn test_deep_eq() {
        let mut arena = Arena::new();
        let a = small_if(&mut arena);
        let b = small_if(&mut arena);
        assert!(arena.deep_eq(a, b));
        assert!(arena.deep_eq(a, a));

        let z = arena.ident("z");
        let nop = arena.leaf(NodeKind::Nop);
        let block = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![]));
        let other = arena.insert(
            Node::new(NodeKind::If)
                .with_child("cond", z)
                .with_child("then", block)
                .with_child("else", nop),
        );
        assert!(!arena.deep_eq(a, other));
    }

    #[test]
    fn test_duplicate_shares_identifiers() {
        let mut arena = Arena::new();
        let root = small_if(&mut arena);
        let copy = arena.duplicate(root);
        assert_ne!(root, copy);
        assert!(arena.deep_eq(root, copy));
        // The condition identifier is the very same node in both trees.
        let orig_cond = arena.node(root).slot_named("cond").unwrap().children()[0];
        let copy_cond = arena.node(copy).slot_named("cond").unwrap().children()[0];
        assert_eq!(orig_cond, copy_cond);
        // Copies are marked as produced by substitution.
        assert!(!arena.node(copy).clean);
        assert!(arena.node(root).clean);
    }

    #[test]
    fn test_validate_ownership_ok() {
        let mut arena = Arena::new();
        let root = small_if(&mut arena);
        arena.validate_ownership(root).unwrap();
    }

    #[test]
    fn test_validate_rejects_double_reference() {
        let mut arena = Arena::new();
        let nop = arena.leaf(NodeKind::Nop);
        // Same Nop in two slots: one owner too many.
        let root = arena.insert(
            Node::new(NodeKind::If).with_child("then", nop).with_child("else", nop),
        );
        let err = arena.validate_ownership(root).unwrap_err();
        assert!(matches!(err, Error::OwnershipViolation { .. }));
    }

    #[test]
    fn test_identifier_may_have_many_usages() {
        let mut arena = Arena::new();
        let x = arena.ident("x");
        let a1 = arena.insert(Node::new(NodeKind::Assign).with_child("target", x));
        let a2 = arena.insert(Node::new(NodeKind::Assign).with_child("target", x));
        let root = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![a1, a2]));
        arena.validate_ownership(root).unwrap();
    }

    #[test]
    fn test_subtree_clean_tracking() {
        let mut arena = Arena::new();
        let root = small_if(&mut arena);
        assert!(arena.subtree_clean(root));
        let copy = arena.duplicate(root);
        assert!(!arena.subtree_clean(copy));
        arena.mark_all_clean();
        assert!(arena.subtree_clean(copy));
    }
}
