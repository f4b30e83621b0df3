//! Pattern-node shapes: ordinary constrained nodes plus the wildcard kinds.
//!
//! Pattern nodes live in a per-rule arena and reference each other by
//! [`PatId`]; the combined search+replace pattern is one object graph, which
//! is what makes shared-position (alias) detection possible.

use std::fmt;
use std::rc::Rc;

use crate::matcher::{MatchCx, Outcome};
use crate::model::{Atom, KindClass, NodeId};
use crate::Result;

use super::coupling::CouplingId;

/// Handle into a rule's pattern arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatId(pub(crate) u32);

impl PatId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Callback type for soft patterns: full access to the match context
/// (conjecture decisions, coupling bindings, recursive comparison).
pub type SoftFn = Rc<dyn Fn(&mut MatchCx<'_>, NodeId) -> Result<Outcome>>;

/// Constraint on one child slot of a plain pattern node, paired with the
/// subject slot at the same layout index.
#[derive(Debug, Clone)]
pub enum SlotPat {
    /// Unconstrained.
    Free,
    /// Optional slot: one sub-pattern. `Absent` also matches a missing child.
    Single(PatId),
    /// Sequence slot: ordered element patterns, at most one `Star`.
    Sequence(Vec<PatId>),
    /// Collection slot: unordered element patterns, at most one `Star`.
    Collection(Vec<PatId>),
}

/// The shape of one pattern node.
#[derive(Clone)]
pub enum Shape {
    /// Ordinary node: kind constraint, optional payload constraint, and
    /// slot-wise sub-patterns. An empty slot list constrains no slot.
    Plain {
        kind: KindClass,
        atom: Option<Atom>,
        slots: Vec<SlotPat>,
    },
    /// Matches any subject unconditionally, including a missing child.
    Absent,
    /// Multiplicity wildcard: a contiguous sibling run (sequence) or the
    /// unclaimed remainder (collection), each element satisfying `each`.
    Star { each: Option<PatId> },
    /// Arbitrary-depth wildcard: descend zero or more levels (exactly one
    /// when `depth_one`) to a terminus; `between` restricts every node the
    /// descent passes through.
    Stuff {
        terminus: PatId,
        between: Option<PatId>,
        depth_one: bool,
    },
    /// Immutable-region wildcard: the subject subtree must be untouched by
    /// substitution in the current run, then `inner` must match.
    GreenGrass { inner: PatId },
    /// Substitution-only: overlay slots win, missing slots fall back to the
    /// resolved base.
    Overlay { base: PatId, overlay: PatId },
    /// Custom matching criterion.
    Soft { tag: &'static str, pred: SoftFn },
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Plain { kind, atom, slots } => f
                .debug_struct("Plain")
                .field("kind", kind)
                .field("atom", atom)
                .field("slots", slots)
                .finish(),
            Shape::Absent => write!(f, "Absent"),
            Shape::Star { each } => f.debug_struct("Star").field("each", each).finish(),
            Shape::Stuff { terminus, between, depth_one } => f
                .debug_struct("Stuff")
                .field("terminus", terminus)
                .field("between", between)
                .field("depth_one", depth_one)
                .finish(),
            Shape::GreenGrass { inner } => {
                f.debug_struct("GreenGrass").field("inner", inner).finish()
            }
            Shape::Overlay { base, overlay } => f
                .debug_struct("Overlay")
                .field("base", base)
                .field("overlay", overlay)
                .finish(),
            Shape::Soft { tag, .. } => f.debug_struct("Soft").field("tag", tag).finish(),
        }
    }
}

/// One node of a pattern: its shape plus an optional coupling.
#[derive(Debug, Clone)]
pub struct PatternNode {
    pub shape: Shape,
    pub coupling: Option<CouplingId>,
}

impl PatternNode {
    pub(crate) fn is_star(&self) -> bool {
        matches!(self.shape, Shape::Star { .. })
    }
}

/// Sub-pattern handles directly referenced by a shape, in a fixed order.
/// Soft patterns are opaque; their closure may reach any pattern node.
pub(crate) fn shape_children(shape: &Shape) -> Vec<PatId> {
    match shape {
        Shape::Plain { slots, .. } => slots
            .iter()
            .flat_map(|sp| match sp {
                SlotPat::Free => Vec::new(),
                SlotPat::Single(p) => vec![*p],
                SlotPat::Sequence(ps) | SlotPat::Collection(ps) => ps.clone(),
            })
            .collect(),
        Shape::Absent | Shape::Soft { .. } => Vec::new(),
        Shape::Star { each } => each.iter().copied().collect(),
        Shape::Stuff { terminus, between, .. } => {
            let mut v = vec![*terminus];
            v.extend(between.iter().copied());
            v
        }
        Shape::GreenGrass { inner } => vec![*inner],
        Shape::Overlay { base, overlay } => vec![*base, *overlay],
    }
}
