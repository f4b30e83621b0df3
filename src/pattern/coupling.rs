//! Couplings: named equivalence constraints across pattern positions.
//!
//! A coupling forces several positions of the combined search+replace pattern
//! to bind the same subject value. The declaration is fixed per rule; the
//! bindings table is per match attempt.

use serde::{Deserialize, Serialize};

use crate::model::{Arena, NodeId};

/// Handle for a coupling declared on a
/// [`RuleBuilder`](super::rule::RuleBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouplingId(pub(crate) u32);

impl CouplingId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The subject value a coupling bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    /// A single subject node.
    Node(NodeId),
    /// A contiguous sibling run (sequence star) or element set
    /// (collection star), in canonical order.
    Range(Vec<NodeId>),
    /// A root-to-terminus span established by an arbitrary-depth wildcard.
    Span { root: NodeId, terminus: NodeId },
}

/// Per-attempt table mapping each coupling to its bound subject value.
/// Reset (rebuilt) at the start of every match attempt.
#[derive(Debug, Clone)]
pub struct CouplingBindings {
    slots: Vec<Option<Bound>>,
}

impl CouplingBindings {
    pub fn new(couplings: usize) -> Self {
        Self { slots: vec![None; couplings] }
    }

    pub fn get(&self, c: CouplingId) -> Option<&Bound> {
        self.slots[c.index()].as_ref()
    }

    pub(crate) fn set(&mut self, c: CouplingId, value: Bound) {
        self.slots[c.index()] = Some(value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Deep, order-sensitive structural equality between bound values.
/// Differently shaped bindings never compare equal.
pub(crate) fn bound_eq(arena: &Arena, a: &Bound, b: &Bound) -> bool {
    match (a, b) {
        (Bound::Node(x), Bound::Node(y)) => arena.deep_eq(*x, *y),
        (Bound::Range(xs), Bound::Range(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(&x, &y)| arena.deep_eq(x, y))
        }
        (
            Bound::Span { root: ra, terminus: ta },
            Bound::Span { root: rb, terminus: tb },
        ) => arena.deep_eq(*ra, *rb) && arena.deep_eq(*ta, *tb),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_get() {
        let mut b = CouplingBindings::new(2);
        let c = CouplingId(1);
        assert!(b.get(c).is_none());
        b.set(c, Bound::Node(NodeId(3)));
        assert_eq!(b.get(c), Some(&Bound::Node(NodeId(3))));
        assert!(b.get(CouplingId(0)).is_none());
    }

    #[test]
    fn test_bound_eq_structural() {
        let mut arena = Arena::new();
        let x1 = arena.ident("x");
        let x2 = arena.ident("x");
        let y = arena.ident("y");
        assert!(bound_eq(&arena, &Bound::Node(x1), &Bound::Node(x2)));
        assert!(!bound_eq(&arena, &Bound::Node(x1), &Bound::Node(y)));

        let r1 = Bound::Range(vec![x1, y]);
        let r2 = Bound::Range(vec![x2, y]);
        let short = Bound::Range(vec![x1]);
        assert!(bound_eq(&arena, &r1, &r2));
        assert!(!bound_eq(&arena, &r1, &short));
        // Shape mismatch never compares equal.
        assert!(!bound_eq(&arena, &Bound::Node(x1), &short));
    }
}
