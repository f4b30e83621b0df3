//! End-to-end matching tests: category coverage, reflexive pattern copies,
//! site scanning, and model serialization.

use treewright::{
    Arena, Atom, Category, Node, NodeId, NodeKind, PatId, RuleBuilder, Slot, SubjectTree,
    ALL_KINDS,
};

/// Build the exact-shape pattern of a subject subtree: same kinds, same
/// atoms, same slot contents.
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

// ============================================================================
// 1. Subtype coverage: a category pattern admits every member kind
// ============================================================================

#[test]
fn test_category_pattern_admits_every_member() {
    let categories = [
        Category::Item,
        Category::Stmt,
        Category::Expr,
        Category::Decl,
        Category::Name,
    ];
    for &kind in ALL_KINDS {
        let mut arena = Arena::new();
        let root = arena.leaf(kind);
        let mut tree = SubjectTree::new(arena, root).unwrap();

        for cat in categories {
            let mut r = RuleBuilder::new();
            let search = r.within(cat);
            let probe = r.build(search, None).unwrap();
            let hits = probe.run_once(&mut tree).unwrap();
            assert_eq!(
                hits == 1,
                cat.admits(kind),
                "category {cat:?} vs kind {kind}"
            );
        }
    }
}

// ============================================================================
// 2. Reflexivity: a tree always matches its own pattern copy
// ============================================================================

#[test]
fn test_pattern_copy_of_tree_matches() {
    let mut arena = Arena::new();
    let x = arena.ident("x");
    let one = arena.int(1);
    let asn = arena.insert(
        Node::new(NodeKind::Assign).with_child("target", x).with_child("value", one),
    );
    let ret_val = arena.int(2);
    let ret = arena.insert(Node::new(NodeKind::Return).with_child("value", ret_val));
    let body = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![asn, ret]));
    let f = arena.ident("f");
    let func = arena.insert(
        Node::new(NodeKind::Function).with_child("name", f).with_child("body", body),
    );
    let root = arena.insert(Node::new(NodeKind::Module).with_coll("items", vec![func]));

    let mut r = RuleBuilder::new();
    let search = pattern_copy(&arena, root, &mut r);
    let probe = r.build(search, None).unwrap();

    let mut tree = SubjectTree::new(arena, root).unwrap();
    assert_eq!(probe.run_once(&mut tree).unwrap(), 1);
}

// ============================================================================
// 3. Site scanning: the driver skips non-matching candidates
// ============================================================================

#[test]
fn test_driver_finds_later_site() {
    // Two assignments; only the second has equal identifiers on both sides.
    let mut arena = Arena::new();
    let a = arena.ident("a");
    let b = arena.ident("b");
    let first = arena.insert(
        Node::new(NodeKind::Assign).with_child("target", a).with_child("value", b),
    );
    let c1 = arena.ident("c");
    let c2 = arena.ident("c");
    let second = arena.insert(
        Node::new(NodeKind::Assign).with_child("target", c1).with_child("value", c2),
    );
    let root = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![first, second]));
    let mut tree = SubjectTree::new(arena, root).unwrap();

    // x := x  =>  Nop
    let mut r = RuleBuilder::new();
    let v = r.coupling("v");
    let lhs = r.exact(NodeKind::Ident);
    r.couple(lhs, v);
    let rhs = r.exact(NodeKind::Ident);
    r.couple(rhs, v);
    let search = r.exact(NodeKind::Assign);
    r.single(search, "target", lhs);
    r.single(search, "value", rhs);
    let replace = r.exact(NodeKind::Nop);
    let rule = r.build(search, Some(replace)).unwrap();

    assert_eq!(rule.run_repeating(&mut tree).unwrap(), 1);
    let kinds: Vec<NodeKind> = tree
        .arena()
        .node(tree.root())
        .slot_named("stmts")
        .unwrap()
        .children()
        .iter()
        .map(|&s| tree.arena().node(s).kind)
        .collect();
    // The self-assignment went away; the real one stayed.
    assert_eq!(kinds, vec![NodeKind::Assign, NodeKind::Nop]);
    let survivor = tree.arena().node(tree.root()).slot_named("stmts").unwrap().children()[0];
    let target = tree.arena().node(survivor).slot_named("target").unwrap().children()[0];
    assert_eq!(tree.arena().node(target).atom, Atom::Name("a".into()));
}

// ============================================================================
// 4. Model serialization round-trip
// ============================================================================

#[test]
fn test_arena_serde_round_trip() {
    let mut arena = Arena::new();
    let x = arena.ident("x");
    let lit = arena.str_lit("hello");
    let asn = arena.insert(
        Node::new(NodeKind::Assign).with_child("target", x).with_child("value", lit),
    );
    let root = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![asn]));

    let json = serde_json::to_string(&arena).unwrap();
    let back: Arena = serde_json::from_str(&json).unwrap();

    assert_eq!(back.len(), arena.len());
    assert_eq!(
        serde_json::to_value(&back).unwrap(),
        serde_json::to_value(&arena).unwrap()
    );
    // Handles survive the round trip unchanged.
    assert!(back.deep_eq(root, root));
    assert_eq!(back.node(root).kind, NodeKind::Block);
}
