//! Rule definition surface: builder, validation, and the finished `Rule`.
//!
//! A rule owns one pattern arena holding the combined search+replace pattern,
//! the declared couplings, and the two root handles. Validation happens once
//! at `build()`; authoring errors surface there, never mid-match.

use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::matcher::Outcome;
use crate::model::{Atom, Category, KindClass, NodeKind, SlotShape};
use crate::{Error, Result};

use super::coupling::CouplingId;
use super::node::{shape_children, PatId, PatternNode, Shape, SlotPat, SoftFn};

/// A validated search/replace rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) nodes: Vec<PatternNode>,
    pub(crate) search: PatId,
    pub(crate) replace: Option<PatId>,
    pub(crate) couplings: Vec<String>,
}

impl Rule {
    pub(crate) fn pat(&self, id: PatId) -> &PatternNode {
        &self.nodes[id.index()]
    }

    pub fn coupling_count(&self) -> usize {
        self.couplings.len()
    }

    pub fn coupling_name(&self, c: CouplingId) -> &str {
        &self.couplings[c.index()]
    }

    pub fn search_root(&self) -> PatId {
        self.search
    }

    pub fn replace_root(&self) -> Option<PatId> {
        self.replace
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates pattern nodes and coupling declarations, then validates the
/// whole rule in one step.
///
/// Structural misuse of the builder itself (an unknown slot name, a slot
/// constraint on a wildcard) panics like any other construction API; the
/// rule-level authoring errors the engine treats as fatal are reported by
/// [`RuleBuilder::build`].
#[derive(Default)]
pub struct RuleBuilder {
    nodes: Vec<PatternNode>,
    couplings: Vec<String>,
}

impl RuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, shape: Shape) -> PatId {
        let id = PatId(self.nodes.len() as u32);
        self.nodes.push(PatternNode { shape, coupling: None });
        id
    }

    /// Declare a named coupling.
    pub fn coupling(&mut self, name: impl Into<String>) -> CouplingId {
        let id = CouplingId(self.couplings.len() as u32);
        self.couplings.push(name.into());
        id
    }

    // ------------------------------------------------------------------
    // Node constructors
    // ------------------------------------------------------------------

    /// Plain pattern constrained to one concrete kind, all slots free.
    pub fn exact(&mut self, kind: NodeKind) -> PatId {
        let slots = vec![SlotPat::Free; kind.layout().len()];
        self.add(Shape::Plain { kind: KindClass::Exact(kind), atom: None, slots })
    }

    /// Plain pattern constrained to a category (no slot constraints).
    pub fn within(&mut self, cat: Category) -> PatId {
        self.add(Shape::Plain { kind: KindClass::In(cat), atom: None, slots: Vec::new() })
    }

    /// Unconditional match.
    pub fn absent(&mut self) -> PatId {
        self.add(Shape::Absent)
    }

    /// Multiplicity wildcard.
    pub fn star(&mut self) -> PatId {
        self.add(Shape::Star { each: None })
    }

    /// Multiplicity wildcard with a per-element restriction.
    pub fn star_each(&mut self, each: PatId) -> PatId {
        self.add(Shape::Star { each: Some(each) })
    }

    /// Arbitrary-depth wildcard: descend zero or more levels to `terminus`.
    pub fn stuff(&mut self, terminus: PatId) -> PatId {
        self.add(Shape::Stuff { terminus, between: None, depth_one: false })
    }

    /// Arbitrary-depth wildcard restricting every node the descent crosses.
    pub fn stuff_between(&mut self, terminus: PatId, between: PatId) -> PatId {
        self.add(Shape::Stuff { terminus, between: Some(between), depth_one: false })
    }

    /// Exact-depth-one specialization: `terminus` one level down.
    pub fn child(&mut self, terminus: PatId) -> PatId {
        self.add(Shape::Stuff { terminus, between: None, depth_one: true })
    }

    /// Immutable-region wildcard.
    pub fn green(&mut self, inner: PatId) -> PatId {
        self.add(Shape::GreenGrass { inner })
    }

    /// Substitution overlay: `overlay` slots win over the resolved `base`.
    pub fn overlay(&mut self, base: PatId, overlay: PatId) -> PatId {
        self.add(Shape::Overlay { base, overlay })
    }

    /// Custom matching criterion with access to the match context.
    pub fn soft(
        &mut self,
        tag: &'static str,
        pred: impl Fn(&mut crate::matcher::MatchCx<'_>, crate::model::NodeId) -> Result<Outcome>
            + 'static,
    ) -> PatId {
        let pred: SoftFn = Rc::new(pred);
        self.add(Shape::Soft { tag, pred })
    }

    /// Matches when any alternative matches; the choice goes through the
    /// conjecture, so backtracking tries the others.
    pub fn any_of(&mut self, alts: Vec<PatId>) -> PatId {
        if alts.is_empty() {
            return self.soft("any_of", |_, _| Ok(Outcome::NotFound));
        }
        self.soft("any_of", move |cx, subject| {
            let k = cx.decide(alts.len());
            cx.compare(subject, alts[k])
        })
    }

    /// Matches when every alternative matches.
    pub fn all_of(&mut self, alts: Vec<PatId>) -> PatId {
        self.soft("all_of", move |cx, subject| {
            for &p in &alts {
                if cx.compare(subject, p)? == Outcome::NotFound {
                    return Ok(Outcome::NotFound);
                }
            }
            Ok(Outcome::Found)
        })
    }

    // ------------------------------------------------------------------
    // Constraint setters
    // ------------------------------------------------------------------

    /// Require a payload on a plain pattern.
    ///
    /// Panics if `id` is not a plain pattern node.
    pub fn atom(&mut self, id: PatId, value: impl Into<Atom>) {
        match &mut self.nodes[id.index()].shape {
            Shape::Plain { atom, .. } => *atom = Some(value.into()),
            other => panic!("atom constraint on non-plain pattern {other:?}"),
        }
    }

    /// Constrain an optional slot of an exact-kind plain pattern.
    ///
    /// Panics if `id` is not an exact-kind plain pattern or the slot does
    /// not exist with the expected shape.
    pub fn single(&mut self, id: PatId, slot: &str, p: PatId) {
        let i = self.expect_slot(id, slot, SlotShape::Optional);
        self.plain_slots(id)[i] = SlotPat::Single(p);
    }

    /// Constrain a sequence slot of an exact-kind plain pattern.
    pub fn seq(&mut self, id: PatId, slot: &str, ps: Vec<PatId>) {
        let i = self.expect_slot(id, slot, SlotShape::Sequence);
        self.plain_slots(id)[i] = SlotPat::Sequence(ps);
    }

    /// Constrain a collection slot of an exact-kind plain pattern.
    pub fn coll(&mut self, id: PatId, slot: &str, ps: Vec<PatId>) {
        let i = self.expect_slot(id, slot, SlotShape::Collection);
        self.plain_slots(id)[i] = SlotPat::Collection(ps);
    }

    /// Attach a declared coupling to a pattern position.
    pub fn couple(&mut self, id: PatId, c: CouplingId) {
        self.nodes[id.index()].coupling = Some(c);
    }

    fn expect_slot(&self, id: PatId, slot: &str, shape: SlotShape) -> usize {
        let Shape::Plain { kind: KindClass::Exact(kind), .. } = &self.nodes[id.index()].shape
        else {
            panic!("slot constraints require an exact-kind plain pattern");
        };
        let kind = *kind;
        let layout = kind.layout();
        match kind.slot_index(slot) {
            Some(i) if layout[i].shape == shape => i,
            Some(i) => panic!(
                "slot '{slot}' of {kind} is {:?}, not {shape:?}",
                layout[i].shape
            ),
            None => panic!("{kind} has no slot named '{slot}'"),
        }
    }

    fn plain_slots(&mut self, id: PatId) -> &mut Vec<SlotPat> {
        match &mut self.nodes[id.index()].shape {
            Shape::Plain { slots, .. } => slots,
            _ => unreachable!("checked by expect_slot"),
        }
    }

    // ------------------------------------------------------------------
    // Build + validation
    // ------------------------------------------------------------------

    /// Finish the rule. `replace` is `None` for match-only rules.
    pub fn build(mut self, search: PatId, replace: Option<PatId>) -> Result<Rule> {
        self.infer_alias_couplings(search, replace);
        self.check_couplings_declared()?;
        self.check_star_placement(search, replace)?;
        self.check_overlay_placement(search)?;
        if let Some(r) = replace {
            self.check_constructible(search, r)?;
        }
        Ok(Rule {
            nodes: self.nodes,
            search,
            replace,
            couplings: self.couplings,
        })
    }

    fn reachable(&self, roots: &[PatId]) -> Vec<PatId> {
        let mut seen: HashSet<PatId> = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<PatId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(shape_children(&self.nodes[id.index()].shape));
        }
        order
    }

    /// One pattern node reachable from more than one place is an implicit
    /// coupling. Note that this treats accidental aliasing as intent; rule
    /// authors who want distinct positions must create distinct nodes.
    fn infer_alias_couplings(&mut self, search: PatId, replace: Option<PatId>) {
        let mut refs: HashMap<PatId, u32> = HashMap::new();
        *refs.entry(search).or_insert(0) += 1;
        if let Some(r) = replace {
            *refs.entry(r).or_insert(0) += 1;
        }
        let mut roots = vec![search];
        roots.extend(replace);
        for id in self.reachable(&roots) {
            for c in shape_children(&self.nodes[id.index()].shape) {
                *refs.entry(c).or_insert(0) += 1;
            }
        }
        let mut shared: Vec<PatId> = refs
            .into_iter()
            .filter_map(|(id, n)| (n >= 2).then_some(id))
            .collect();
        shared.sort_unstable();
        for id in shared {
            if self.nodes[id.index()].coupling.is_none() {
                let c = self.coupling(format!("~alias{}", id.0));
                self.nodes[id.index()].coupling = Some(c);
            }
        }
    }

    fn check_couplings_declared(&self) -> Result<()> {
        let declared = self.couplings.len() as u32;
        for node in &self.nodes {
            if let Some(c) = node.coupling {
                if c.0 >= declared {
                    return Err(Error::UndeclaredCoupling { index: c.0 });
                }
            }
        }
        Ok(())
    }

    fn is_star(&self, id: PatId) -> bool {
        self.nodes[id.index()].is_star()
    }

    fn check_star_placement(&self, search: PatId, replace: Option<PatId>) -> Result<()> {
        if self.is_star(search) {
            return Err(Error::MalformedPattern("search root may not be a star".into()));
        }
        if let Some(r) = replace {
            if self.is_star(r) || matches!(self.nodes[r.index()].shape, Shape::Absent) {
                return Err(Error::MalformedPattern(
                    "replace root must produce exactly one node".into(),
                ));
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match &node.shape {
                Shape::Plain { slots, .. } => {
                    for sp in slots {
                        match sp {
                            SlotPat::Free => {}
                            SlotPat::Single(p) => {
                                if self.is_star(*p) {
                                    return Err(Error::MalformedPattern(format!(
                                        "star in singular slot of p{i}"
                                    )));
                                }
                            }
                            SlotPat::Sequence(ps) | SlotPat::Collection(ps) => {
                                let stars = ps.iter().filter(|&&p| self.is_star(p)).count();
                                if stars > 1 {
                                    return Err(Error::DuplicateStar {
                                        place: format!("slot of pattern p{i}"),
                                    });
                                }
                            }
                        }
                    }
                }
                Shape::Star { each: Some(e) } if self.is_star(*e) => {
                    return Err(Error::MalformedPattern(format!(
                        "star restriction of p{i} is itself a star"
                    )));
                }
                Shape::Stuff { terminus, between, .. } => {
                    if self.is_star(*terminus) || between.is_some_and(|b| self.is_star(b)) {
                        return Err(Error::MalformedPattern(format!(
                            "star inside stuff pattern p{i}"
                        )));
                    }
                }
                Shape::GreenGrass { inner } if self.is_star(*inner) => {
                    return Err(Error::MalformedPattern(format!(
                        "star inside green-grass pattern p{i}"
                    )));
                }
                Shape::Overlay { base, overlay } => {
                    if self.is_star(*base) || self.is_star(*overlay) {
                        return Err(Error::MalformedPattern(format!(
                            "star inside overlay pattern p{i}"
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_overlay_placement(&self, search: PatId) -> Result<()> {
        for id in self.reachable(&[search]) {
            if matches!(self.nodes[id.index()].shape, Shape::Overlay { .. }) {
                return Err(Error::MalformedPattern(format!(
                    "overlay {id} is reachable from the search pattern"
                )));
            }
        }
        Ok(())
    }

    /// Every replace-side position must either resolve through a coupling the
    /// search pattern can bind, or be buildable from scratch.
    fn check_constructible(&self, search: PatId, replace: PatId) -> Result<()> {
        let bindable: HashSet<CouplingId> = self
            .reachable(&[search])
            .into_iter()
            .filter_map(|id| self.nodes[id.index()].coupling)
            .collect();
        for id in self.reachable(&[replace]) {
            let node = &self.nodes[id.index()];
            if node.coupling.is_some_and(|c| bindable.contains(&c)) {
                continue;
            }
            match &node.shape {
                Shape::Plain { kind: KindClass::In(cat), .. } => {
                    return Err(Error::MalformedPattern(format!(
                        "replace pattern {id} has category kind {cat:?} and no binding; \
                         a fresh node needs a concrete kind"
                    )));
                }
                Shape::Star { .. } | Shape::Stuff { .. } | Shape::GreenGrass { .. }
                | Shape::Soft { .. } => {
                    return Err(Error::MalformedPattern(format!(
                        "replace pattern {id} is a match-only construct without a binding"
                    )));
                }
                Shape::Plain { .. } | Shape::Absent | Shape::Overlay { .. } => {}
            }
        }
        Ok(())
    }
}
