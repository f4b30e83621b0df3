//! Property tests over generated subject trees.

use proptest::prelude::*;

use treewright::{
    Arena, Bound, Conjecture, CouplingBindings, MatchCx, Node, NodeId, NodeKind, Outcome, PatId,
    Phase, Rule, RuleBuilder, Slot, SubjectTree,
};

// ============================================================================
// Generators
// ============================================================================

/// A small language fragment that materializes into valid subject trees
/// (fresh nodes everywhere, so the ownership invariant holds by construction).
#[derive(Debug, Clone)]
enum TreeSpec {
    Nop,
    Int(i64),
    Ident(String),
    Ret(Option<Box<TreeSpec>>),
    Block(Vec<TreeSpec>),
    Assign(Box<TreeSpec>, Box<TreeSpec>),
}

fn build_tree(arena: &mut Arena, spec: &TreeSpec) -> NodeId {
    match spec {
        TreeSpec::Nop => arena.leaf(NodeKind::Nop),
        TreeSpec::Int(v) => arena.int(*v),
        TreeSpec::Ident(name) => arena.ident(name.clone()),
        TreeSpec::Ret(value) => {
            let mut node = Node::new(NodeKind::Return);
            if let Some(v) = value {
                let child = build_tree(arena, v);
                node = node.with_child("value", child);
            }
            arena.insert(node)
        }
        TreeSpec::Block(stmts) => {
            let children: Vec<NodeId> = stmts.iter().map(|s| build_tree(arena, s)).collect();
            arena.insert(Node::new(NodeKind::Block).with_seq("stmts", children))
        }
        TreeSpec::Assign(target, value) => {
            let t = build_tree(arena, target);
            let v = build_tree(arena, value);
            arena.insert(Node::new(NodeKind::Assign).with_child("target", t).with_child("value", v))
        }
    }
}

fn tree_strategy() -> impl Strategy<Value = TreeSpec> {
    let leaf = prop_oneof![
        Just(TreeSpec::Nop),
        (-100i64..100).prop_map(TreeSpec::Int),
        "[a-z]{1,4}".prop_map(TreeSpec::Ident),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(TreeSpec::Block),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| TreeSpec::Assign(Box::new(a), Box::new(b))),
            proptest::option::of(inner).prop_map(|v| TreeSpec::Ret(v.map(Box::new))),
        ]
    })
}

fn middle_kind() -> impl Strategy<Value = NodeKind> {
    prop_oneof![Just(NodeKind::Goto), Just(NodeKind::While), Just(NodeKind::Nop)]
}

// ============================================================================
// Helpers
// ============================================================================

/// Exact-shape pattern of a subject subtree.
fn pattern_copy(arena: &Arena, id: NodeId, r: &mut RuleBuilder) -> PatId {
    let node = arena.node(id);
    let p = r.exact(node.kind);
    if !node.atom.is_none() {
        r.atom(p, node.atom.clone());
    }
    for (i, slot) in node.slots().iter().enumerate() {
        let name = node.kind.layout()[i].name;
        match slot {
            Slot::Optional(None) => {}
            Slot::Optional(Some(c)) => {
                let cp = pattern_copy(arena, *c, r);
                r.single(p, name, cp);
            }
            Slot::Sequence(cs) => {
                let ps = cs.iter().map(|&c| pattern_copy(arena, c, r)).collect();
                r.seq(p, name, ps);
            }
            Slot::Collection(cs) => {
                let ps = cs.iter().map(|&c| pattern_copy(arena, c, r)).collect();
                r.coll(p, name, ps);
            }
        }
    }
    p
}

/// The full two-pass attempt loop at one site, exposing the bindings.
fn find(arena: &Arena, rule: &Rule, site: NodeId) -> Option<CouplingBindings> {
    let mut conjecture = Conjecture::new();
    loop {
        let mut bindings = CouplingBindings::new(rule.coupling_count());
        conjecture.begin_attempt();
        let keyed = MatchCx::new(arena, rule, &mut conjecture, &mut bindings, Phase::Keying)
            .compare(site, rule.search_root())
            .unwrap();
        let confirmed = keyed == Outcome::Found && {
            conjecture.begin_replay();
            MatchCx::new(arena, rule, &mut conjecture, &mut bindings, Phase::Restricting)
                .compare(site, rule.search_root())
                .unwrap()
                == Outcome::Found
        };
        if confirmed {
            return Some(bindings);
        }
        if !conjecture.advance() {
            return None;
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Any subject matches a pattern copy of itself.
    #[test]
    fn prop_reflexivity(spec in tree_strategy()) {
        let mut arena = Arena::new();
        let root = build_tree(&mut arena, &spec);
        let mut r = RuleBuilder::new();
        let search = pattern_copy(&arena, root, &mut r);
        let probe = r.build(search, None).unwrap();

        let mut tree = SubjectTree::new(arena, root).unwrap();
        prop_assert_eq!(probe.run_once(&mut tree).unwrap(), 1);
    }

    /// Substitution-grade duplication preserves structure exactly.
    #[test]
    fn prop_duplicate_is_structurally_equal(spec in tree_strategy()) {
        let mut arena = Arena::new();
        let root = build_tree(&mut arena, &spec);
        let copy = arena.duplicate(root);
        prop_assert!(arena.deep_eq(root, copy));
        prop_assert!(arena.deep_eq(copy, root));
    }

    /// `[A, Star, B]` against `[a, m1..mk, b]` absorbs exactly the middle,
    /// for every middle length.
    #[test]
    fn prop_star_absorbs_exactly_the_middle(mids in prop::collection::vec(middle_kind(), 0..6)) {
        let mut arena = Arena::new();
        let head = arena.leaf(NodeKind::Assign);
        let middle: Vec<NodeId> = mids.iter().map(|&k| arena.leaf(k)).collect();
        let tail = arena.insert(Node::new(NodeKind::Return));
        let mut stmts = vec![head];
        stmts.extend(&middle);
        stmts.push(tail);
        let block = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", stmts));

        let mut r = RuleBuilder::new();
        let run = r.coupling("run");
        let a = r.exact(NodeKind::Assign);
        let star = r.star();
        r.couple(star, run);
        let b = r.exact(NodeKind::Return);
        let search = r.exact(NodeKind::Block);
        r.seq(search, "stmts", vec![a, star, b]);
        let rule = r.build(search, None).unwrap();

        let bindings = find(&arena, &rule, block).expect("must match for every length");
        match bindings.get(run) {
            Some(Bound::Range(v)) => prop_assert_eq!(v, &middle),
            other => prop_assert!(false, "expected range binding, got {:?}", other),
        }
    }
}
