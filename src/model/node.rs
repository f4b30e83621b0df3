//! Subject-tree nodes and their child slots.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::atom::Atom;
use super::kind::{NodeKind, SlotShape};

/// Opaque node handle into an [`Arena`](super::arena::Arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One child slot. The variant always agrees with the kind's
/// [`SlotShape`](super::kind::SlotShape) at the same layout index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Optional(Option<NodeId>),
    Sequence(Vec<NodeId>),
    Collection(Vec<NodeId>),
}

impl Slot {
    fn empty(shape: SlotShape) -> Slot {
        match shape {
            SlotShape::Optional => Slot::Optional(None),
            SlotShape::Sequence => Slot::Sequence(Vec::new()),
            SlotShape::Collection => Slot::Collection(Vec::new()),
        }
    }

    /// Child handles of this slot, in stored order.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Slot::Optional(opt) => opt.as_slice(),
            Slot::Sequence(v) | Slot::Collection(v) => v,
        }
    }
}

/// A node in the subject tree: a concrete kind, its payload, and its
/// typed child slots in fixed per-kind order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub atom: Atom,
    pub(crate) slots: SmallVec<[Slot; 2]>,
    /// Freshness mark: cleared on nodes produced by substitution, reset at
    /// the start of each rule. Consulted by the immutable-region wildcard.
    pub clean: bool,
}

impl Node {
    /// A node of `kind` with every slot empty.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            atom: Atom::None,
            slots: kind.layout().iter().map(|s| Slot::empty(s.shape)).collect(),
            clean: true,
        }
    }

    pub fn with_atom(mut self, atom: impl Into<Atom>) -> Self {
        self.atom = atom.into();
        self
    }

    /// Set an optional slot by name.
    ///
    /// Panics if the kind has no optional slot with that name.
    pub fn with_child(mut self, name: &str, child: NodeId) -> Self {
        let i = self.expect_slot(name, SlotShape::Optional);
        self.slots[i] = Slot::Optional(Some(child));
        self
    }

    /// Set a sequence slot by name.
    ///
    /// Panics if the kind has no sequence slot with that name.
    pub fn with_seq(mut self, name: &str, children: Vec<NodeId>) -> Self {
        let i = self.expect_slot(name, SlotShape::Sequence);
        self.slots[i] = Slot::Sequence(children);
        self
    }

    /// Set a collection slot by name. Canonical order is imposed here.
    ///
    /// Panics if the kind has no collection slot with that name.
    pub fn with_coll(mut self, name: &str, mut children: Vec<NodeId>) -> Self {
        let i = self.expect_slot(name, SlotShape::Collection);
        children.sort_unstable();
        self.slots[i] = Slot::Collection(children);
        self
    }

    fn expect_slot(&self, name: &str, shape: SlotShape) -> usize {
        let layout = self.kind.layout();
        match self.kind.slot_index(name) {
            Some(i) if layout[i].shape == shape => i,
            Some(i) => panic!(
                "slot '{name}' of {} is {:?}, not {shape:?}",
                self.kind, layout[i].shape
            ),
            None => panic!("{} has no slot named '{name}'", self.kind),
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Named slot lookup.
    pub fn slot_named(&self, name: &str) -> Option<&Slot> {
        self.kind.slot_index(name).map(|i| &self.slots[i])
    }

    /// All child handles across all slots, in slot order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().flat_map(|s| s.children().iter().copied())
    }

    pub fn is_identifier(&self) -> bool {
        self.kind.is_identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_has_layout_slots() {
        let n = Node::new(NodeKind::If);
        assert_eq!(n.slots().len(), 3);
        assert!(matches!(n.slots()[0], Slot::Optional(None)));
        let n = Node::new(NodeKind::Nop);
        assert!(n.slots().is_empty());
    }

    #[test]
    fn test_with_child_by_name() {
        let n = Node::new(NodeKind::If)
            .with_child("cond", NodeId(7))
            .with_child("then", NodeId(8));
        assert_eq!(n.slot_named("cond").unwrap().children(), &[NodeId(7)]);
        assert_eq!(n.slot_named("else").unwrap().children(), &[] as &[NodeId]);
        assert_eq!(n.children().collect::<Vec<_>>(), vec![NodeId(7), NodeId(8)]);
    }

    #[test]
    fn test_collection_canonical_order() {
        let n = Node::new(NodeKind::Module)
            .with_coll("items", vec![NodeId(9), NodeId(2), NodeId(5)]);
        assert_eq!(
            n.slot_named("items").unwrap().children(),
            &[NodeId(2), NodeId(5), NodeId(9)]
        );
    }

    #[test]
    #[should_panic(expected = "no slot named")]
    fn test_unknown_slot_panics() {
        let _ = Node::new(NodeKind::Nop).with_child("body", NodeId(1));
    }
}
