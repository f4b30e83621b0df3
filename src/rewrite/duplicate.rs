//! Replacement construction: materializes the replace pattern against the
//! coupling bindings of a confirmed match.
//!
//! Bound positions splice duplicated subject fragments (identifiers shared,
//! never copied); unbound plain positions become fresh nodes; overlays start
//! from the resolved base and rewrite the slots the overlay names.

use crate::model::{Arena, Atom, KindClass, Node, NodeId, Slot};
use crate::pattern::coupling::{Bound, CouplingBindings};
use crate::pattern::{PatId, Rule, Shape, SlotPat};
use crate::{Error, Result};

/// What one pattern position produced: nothing (absent), one node, or a
/// spliced run of siblings (range binding).
#[derive(Debug, Clone)]
pub(crate) enum Built {
    None,
    One(NodeId),
    Many(Vec<NodeId>),
}

/// Build the whole replacement subtree. The replace root must come out as
/// exactly one node; rule validation rejects patterns that cannot.
pub(crate) fn build_replacement(
    arena: &mut Arena,
    rule: &Rule,
    bindings: &CouplingBindings,
    root: PatId,
) -> Result<NodeId> {
    match build(arena, rule, bindings, root)? {
        Built::One(id) => Ok(id),
        other => Err(Error::MalformedPattern(format!(
            "replace root produced {other:?}, expected exactly one node"
        ))),
    }
}

pub(crate) fn build(
    arena: &mut Arena,
    rule: &Rule,
    bindings: &CouplingBindings,
    pat: PatId,
) -> Result<Built> {
    let pnode = rule.pat(pat);

    // A bound coupling wins over the shape: the position reproduces the
    // subject value keyed during matching.
    if let Some(c) = pnode.coupling {
        if let Some(bound) = bindings.get(c) {
            let bound = bound.clone();
            return Ok(materialize(arena, &bound));
        }
    }

    match &pnode.shape {
        Shape::Plain { kind, atom, slots } => {
            let KindClass::Exact(k) = *kind else {
                return Err(Error::MalformedPattern(format!(
                    "replace pattern {pat} has no concrete kind and no binding"
                )));
            };
            let mut node = Node::new(k);
            node.atom = atom.clone().unwrap_or(Atom::None);
            node.clean = false;
            for (i, sp) in slots.iter().enumerate() {
                if let Some(slot) = build_slot(arena, rule, bindings, sp)? {
                    node.slots[i] = slot;
                }
            }
            Ok(Built::One(arena.insert(node)))
        }
        Shape::Absent => Ok(Built::None),
        Shape::Overlay { base, overlay } => build_overlay(arena, rule, bindings, *base, *overlay),
        Shape::Star { .. } | Shape::Stuff { .. } | Shape::GreenGrass { .. }
        | Shape::Soft { .. } => Err(Error::MalformedPattern(format!(
            "replace pattern {pat} is a match-only construct without a binding"
        ))),
    }
}

/// Duplicate a bound subject value into the tree under construction.
fn materialize(arena: &mut Arena, bound: &Bound) -> Built {
    match bound {
        Bound::Node(n) => Built::One(arena.duplicate(*n)),
        Bound::Range(run) => Built::Many(run.iter().map(|&n| arena.duplicate(n)).collect()),
        Bound::Span { root, .. } => Built::One(arena.duplicate(*root)),
    }
}

/// Build the content of one constrained slot. `Free` contributes nothing.
fn build_slot(
    arena: &mut Arena,
    rule: &Rule,
    bindings: &CouplingBindings,
    sp: &SlotPat,
) -> Result<Option<Slot>> {
    Ok(match sp {
        SlotPat::Free => None,
        SlotPat::Single(p) => match build(arena, rule, bindings, *p)? {
            Built::None => Some(Slot::Optional(None)),
            Built::One(id) => Some(Slot::Optional(Some(id))),
            Built::Many(_) => {
                return Err(Error::MalformedPattern(
                    "range binding spliced into singular slot".into(),
                ));
            }
        },
        SlotPat::Sequence(ps) => Some(Slot::Sequence(build_run(arena, rule, bindings, ps)?)),
        SlotPat::Collection(ps) => {
            let mut out = build_run(arena, rule, bindings, ps)?;
            out.sort_unstable();
            Some(Slot::Collection(out))
        }
    })
}

/// Element patterns of a sequence/collection slot: each contributes zero,
/// one, or (for a range binding) several children, spliced in place.
fn build_run(
    arena: &mut Arena,
    rule: &Rule,
    bindings: &CouplingBindings,
    ps: &[PatId],
) -> Result<Vec<NodeId>> {
    let mut out = Vec::new();
    for &p in ps {
        match build(arena, rule, bindings, p)? {
            Built::None => {}
            Built::One(id) => out.push(id),
            Built::Many(run) => out.extend(run),
        }
    }
    Ok(out)
}

/// Resolve the base, then rewrite every slot the overlay constrains.
/// Slots the overlay leaves free keep the base's resolved content; an
/// `Absent` overlay entry empties the slot.
fn build_overlay(
    arena: &mut Arena,
    rule: &Rule,
    bindings: &CouplingBindings,
    base: PatId,
    overlay: PatId,
) -> Result<Built> {
    let Built::One(base_id) = build(arena, rule, bindings, base)? else {
        return Err(Error::MalformedPattern(format!(
            "overlay base {base} must produce exactly one node"
        )));
    };
    let onode = rule.pat(overlay);
    let Shape::Plain { kind: okind, atom: oatom, slots: oslots } = &onode.shape else {
        return Err(Error::MalformedPattern(format!(
            "overlay side {overlay} must be a plain pattern"
        )));
    };

    let base_kind = arena.node(base_id).kind;
    if !okind.admits(base_kind) {
        return Err(Error::OverlayKindMismatch {
            base: arena.label(base_id),
            overlay: format!("{okind:?}"),
        });
    }

    if let Some(a) = oatom {
        arena.node_mut(base_id).atom = a.clone();
    }

    // Non-free overlay slots are only expressible on exact-kind patterns,
    // and `admits` above pins the resolved kind to that same layout.
    for (i, sp) in oslots.iter().enumerate() {
        let Some(slot) = build_slot(arena, rule, bindings, sp)? else {
            continue;
        };
        if i >= arena.node(base_id).slots().len() {
            return Err(Error::MalformedPattern(format!(
                "overlay slot {i} out of range for {base_kind}"
            )));
        }
        arena.node_mut(base_id).slots[i] = slot;
    }
    Ok(Built::One(base_id))
}
