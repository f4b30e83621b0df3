//! # Pattern Matcher
//!
//! The recursive structural comparator. `compare` dispatches per pattern
//! shape; ordered slots lock-step with a decided star absorption, unordered
//! slots use trial selection over a scratch remaining-set, and every confirmed
//! node/range/span is wrapped by a coupling check.
//!
//! Non-matches are ordinary `Outcome::NotFound` values that flow back through
//! the recursion; the error channel carries only fatal authoring mistakes.

pub mod conjecture;

use tracing::trace;

use crate::model::{Arena, NodeId, Slot};
use crate::pattern::coupling::{bound_eq, Bound, CouplingBindings, CouplingId};
use crate::pattern::{PatId, Rule, Shape, SlotPat};
use crate::{Error, Result};

pub use conjecture::{Choice, Conjecture};

/// Result of one comparison. A value, not an error: structural disagreement
/// is the expected outcome of most attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    NotFound,
}

/// Which pass of the two-pass coupling protocol is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First touch of an unbound coupling records the subject value.
    Keying,
    /// No new bindings; every touch must equal the keyed value.
    Restricting,
}

/// Everything one match attempt carries: the subject arena (read-only), the
/// rule, the decision ledger, the binding table, and the active phase.
pub struct MatchCx<'a> {
    pub(crate) arena: &'a Arena,
    pub(crate) rule: &'a Rule,
    pub(crate) conjecture: &'a mut Conjecture,
    pub(crate) bindings: &'a mut CouplingBindings,
    pub(crate) phase: Phase,
}

impl<'a> MatchCx<'a> {
    pub fn new(
        arena: &'a Arena,
        rule: &'a Rule,
        conjecture: &'a mut Conjecture,
        bindings: &'a mut CouplingBindings,
        phase: Phase,
    ) -> Self {
        Self { arena, rule, conjecture, bindings, phase }
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bindings(&self) -> &CouplingBindings {
        self.bindings
    }

    /// Record or replay a decision. Exposed for soft patterns.
    pub fn decide(&mut self, candidates: usize) -> usize {
        self.conjecture.decide(candidates)
    }

    /// Compare one subject node against one pattern node.
    pub fn compare(&mut self, subject: NodeId, pat: PatId) -> Result<Outcome> {
        let rule = self.rule;
        let pnode = rule.pat(pat);
        let outcome = match &pnode.shape {
            Shape::Plain { kind, atom, slots } => {
                self.match_plain(subject, *kind, atom.as_ref(), slots)?
            }
            Shape::Absent => Outcome::Found,
            Shape::Star { .. } => {
                return Err(Error::MalformedPattern(format!(
                    "star {pat} compared outside a sequence or collection"
                )));
            }
            Shape::Stuff { terminus, between, depth_one } => {
                // Binds a span, not a node; coupling handled inside.
                return self.match_stuff(
                    subject,
                    pnode.coupling,
                    *terminus,
                    *between,
                    *depth_one,
                );
            }
            Shape::GreenGrass { inner } => {
                if self.arena.subtree_clean(subject) {
                    self.compare(subject, *inner)?
                } else {
                    Outcome::NotFound
                }
            }
            Shape::Overlay { .. } => {
                return Err(Error::MalformedPattern(format!(
                    "overlay {pat} has no matching semantics"
                )));
            }
            Shape::Soft { pred, .. } => {
                let pred = pred.clone();
                pred.as_ref()(self, subject)?
            }
        };
        match (outcome, pnode.coupling) {
            (Outcome::Found, Some(c)) => self.couple_check(c, Bound::Node(subject)),
            _ => Ok(outcome),
        }
    }

    // ========================================================================
    // Plain nodes
    // ========================================================================

    fn match_plain(
        &mut self,
        subject: NodeId,
        kind: crate::model::KindClass,
        atom: Option<&crate::model::Atom>,
        slot_pats: &[SlotPat],
    ) -> Result<Outcome> {
        let arena = self.arena;
        let snode = arena.node(subject);
        if !kind.admits(snode.kind) {
            return Ok(Outcome::NotFound);
        }
        if let Some(a) = atom {
            if *a != snode.atom {
                return Ok(Outcome::NotFound);
            }
        }
        for (i, sp) in slot_pats.iter().enumerate() {
            if matches!(sp, SlotPat::Free) {
                continue;
            }
            let Some(slot) = snode.slots().get(i) else {
                return Err(Error::MalformedPattern(format!(
                    "slot constraint {i} out of range for {}",
                    snode.kind
                )));
            };
            let ok = match (sp, slot) {
                (SlotPat::Single(p), Slot::Optional(opt)) => match opt {
                    Some(child) => self.compare(*child, *p)? == Outcome::Found,
                    // Only the unconditional pattern matches a missing child.
                    None => matches!(self.rule.pat(*p).shape, Shape::Absent),
                },
                (SlotPat::Sequence(ps), Slot::Sequence(cs)) => {
                    self.match_sequence(cs, ps)? == Outcome::Found
                }
                (SlotPat::Collection(ps), Slot::Collection(cs)) => {
                    self.match_collection(cs, ps)? == Outcome::Found
                }
                _ => {
                    return Err(Error::MalformedPattern(format!(
                        "slot {i} of {} constrained with the wrong slot shape",
                        snode.kind
                    )));
                }
            };
            if !ok {
                return Ok(Outcome::NotFound);
            }
        }
        Ok(Outcome::Found)
    }

    // ========================================================================
    // Ordered children
    // ========================================================================

    /// Lock-step advance over both element lists, except at a star, whose
    /// absorbed length goes through the ledger; a wrong length fails the
    /// tail check and backtracking finds the right one.
    fn match_sequence(&mut self, subject: &[NodeId], pats: &[PatId]) -> Result<Outcome> {
        let rule = self.rule;
        let star_at = pats.iter().position(|&p| rule.pat(p).is_star());
        let Some(si) = star_at else {
            if subject.len() != pats.len() {
                return Ok(Outcome::NotFound);
            }
            for (&c, &p) in subject.iter().zip(pats) {
                if self.compare(c, p)? == Outcome::NotFound {
                    return Ok(Outcome::NotFound);
                }
            }
            return Ok(Outcome::Found);
        };

        let tail_len = pats.len() - si - 1;
        if subject.len() < si + tail_len {
            return Ok(Outcome::NotFound);
        }
        for (&c, &p) in subject.iter().zip(&pats[..si]) {
            if self.compare(c, p)? == Outcome::NotFound {
                return Ok(Outcome::NotFound);
            }
        }

        let rem = subject.len() - si;
        let absorbed = self.decide(rem + 1);
        if rem - absorbed != tail_len {
            return Ok(Outcome::NotFound);
        }
        let run = &subject[si..si + absorbed];
        if self.star_accepts(pats[si], run)? == Outcome::NotFound {
            return Ok(Outcome::NotFound);
        }

        for (&c, &p) in subject[si + absorbed..].iter().zip(&pats[si + 1..]) {
            if self.compare(c, p)? == Outcome::NotFound {
                return Ok(Outcome::NotFound);
            }
        }
        Ok(Outcome::Found)
    }

    // ========================================================================
    // Unordered children
    // ========================================================================

    /// Trial selection: each non-star element claims one not-yet-claimed
    /// subject element chosen via the ledger; leftovers go to the star or
    /// fail the slot.
    fn match_collection(&mut self, subject: &[NodeId], pats: &[PatId]) -> Result<Outcome> {
        let rule = self.rule;
        let star: Option<PatId> = pats.iter().copied().find(|&p| rule.pat(p).is_star());
        let mut remaining: Vec<NodeId> = subject.to_vec();

        for &p in pats.iter().filter(|&&p| !rule.pat(p).is_star()) {
            if remaining.is_empty() {
                return Ok(Outcome::NotFound);
            }
            let k = self.decide(remaining.len());
            let chosen = remaining[k];
            if self.compare(chosen, p)? == Outcome::NotFound {
                return Ok(Outcome::NotFound);
            }
            remaining.remove(k);
        }

        match star {
            Some(s) => self.star_accepts(s, &remaining),
            None if remaining.is_empty() => Ok(Outcome::Found),
            None => Ok(Outcome::NotFound),
        }
    }

    /// Per-element restriction plus range coupling for an absorbing star.
    fn star_accepts(&mut self, star: PatId, elements: &[NodeId]) -> Result<Outcome> {
        let rule = self.rule;
        let pnode = rule.pat(star);
        let Shape::Star { each } = &pnode.shape else {
            unreachable!("star_accepts on non-star");
        };
        if let Some(e) = each {
            for &c in elements {
                if self.compare(c, *e)? == Outcome::NotFound {
                    return Ok(Outcome::NotFound);
                }
            }
        }
        match pnode.coupling {
            Some(c) => self.couple_check(c, Bound::Range(elements.to_vec())),
            None => Ok(Outcome::Found),
        }
    }

    // ========================================================================
    // Arbitrary depth
    // ========================================================================

    fn match_stuff(
        &mut self,
        subject: NodeId,
        coupling: Option<CouplingId>,
        terminus: PatId,
        between: Option<PatId>,
        depth_one: bool,
    ) -> Result<Outcome> {
        let found = if depth_one {
            self.stuff_child(subject, terminus, between)?
        } else {
            self.stuff_descend(subject, terminus, between)?
        };
        match (found, coupling) {
            (None, _) => Ok(Outcome::NotFound),
            (Some(t), Some(c)) => {
                self.couple_check(c, Bound::Span { root: subject, terminus: t })
            }
            (Some(_), None) => Ok(Outcome::Found),
        }
    }

    /// Zero-or-more descent: at each node the ledger decides between
    /// "terminus here" and "descend into child k". Every node the descent
    /// leaves is checked against the restriction; the terminus is not.
    fn stuff_descend(
        &mut self,
        at: NodeId,
        terminus: PatId,
        between: Option<PatId>,
    ) -> Result<Option<NodeId>> {
        let arena = self.arena;
        let kids: Vec<NodeId> = arena.node(at).children().collect();
        let choice = self.decide(kids.len() + 1);
        if choice == 0 {
            return Ok(match self.compare(at, terminus)? {
                Outcome::Found => Some(at),
                Outcome::NotFound => None,
            });
        }
        if let Some(b) = between {
            if self.compare(at, b)? == Outcome::NotFound {
                return Ok(None);
            }
        }
        self.stuff_descend(kids[choice - 1], terminus, between)
    }

    /// Exact-depth-one specialization: the terminus sits directly below.
    fn stuff_child(
        &mut self,
        at: NodeId,
        terminus: PatId,
        between: Option<PatId>,
    ) -> Result<Option<NodeId>> {
        let arena = self.arena;
        let kids: Vec<NodeId> = arena.node(at).children().collect();
        if kids.is_empty() {
            return Ok(None);
        }
        if let Some(b) = between {
            if self.compare(at, b)? == Outcome::NotFound {
                return Ok(None);
            }
        }
        let k = self.decide(kids.len());
        Ok(match self.compare(kids[k], terminus)? {
            Outcome::Found => Some(kids[k]),
            Outcome::NotFound => None,
        })
    }

    // ========================================================================
    // Coupling checks
    // ========================================================================

    /// Wrap a structurally confirmed value in the bind/verify protocol.
    pub(crate) fn couple_check(&mut self, c: CouplingId, value: Bound) -> Result<Outcome> {
        if let Some(prev) = self.bindings.get(c) {
            return Ok(if bound_eq(self.arena, prev, &value) {
                Outcome::Found
            } else {
                Outcome::NotFound
            });
        }
        match self.phase {
            Phase::Keying => {
                self.bindings.set(c, value);
                Ok(Outcome::Found)
            }
            // The keying pass never reached this position on the current
            // decision path, so the attempt cannot be confirmed.
            Phase::Restricting => {
                trace!(coupling = self.rule.coupling_name(c), "unbound in restricting pass");
                Ok(Outcome::NotFound)
            }
        }
    }
}
