//! Node-kind taxonomy: a closed union of concrete kinds plus a category lattice.
//!
//! Categories overlap: a kind may sit in several at once (`Call` is both a
//! statement and an expression). Membership is a static bitset table, so every
//! kind test is a mask lookup rather than a chain of downcasts.

use serde::{Deserialize, Serialize};

/// Concrete ("final") node kinds. Subject trees contain only these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Module,
    Function,
    Param,
    Block,
    If,
    While,
    Return,
    Goto,
    Label,
    Nop,
    Assign,
    Call,
    Ident,
    IntLit,
    StrLit,
    BinOp,
}

/// Every concrete kind, in declaration order. Used by generators and tests.
pub const ALL_KINDS: &[NodeKind] = &[
    NodeKind::Module,
    NodeKind::Function,
    NodeKind::Param,
    NodeKind::Block,
    NodeKind::If,
    NodeKind::While,
    NodeKind::Return,
    NodeKind::Goto,
    NodeKind::Label,
    NodeKind::Nop,
    NodeKind::Assign,
    NodeKind::Call,
    NodeKind::Ident,
    NodeKind::IntLit,
    NodeKind::StrLit,
    NodeKind::BinOp,
];

impl NodeKind {
    pub const fn mask(self) -> u32 {
        1u32 << self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::Function => "Function",
            NodeKind::Param => "Param",
            NodeKind::Block => "Block",
            NodeKind::If => "If",
            NodeKind::While => "While",
            NodeKind::Return => "Return",
            NodeKind::Goto => "Goto",
            NodeKind::Label => "Label",
            NodeKind::Nop => "Nop",
            NodeKind::Assign => "Assign",
            NodeKind::Call => "Call",
            NodeKind::Ident => "Ident",
            NodeKind::IntLit => "IntLit",
            NodeKind::StrLit => "StrLit",
            NodeKind::BinOp => "BinOp",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Abstract categories over the concrete kinds.
///
/// A category pattern matches the set of all kinds beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Every kind.
    Item,
    /// Statement positions.
    Stmt,
    /// Expression positions.
    Expr,
    /// Declaring constructs (own a declaring reference to an `Ident`).
    Decl,
    /// The identifier category of the ownership invariant.
    Name,
}

const STMT_MASK: u32 = NodeKind::Block.mask()
    | NodeKind::If.mask()
    | NodeKind::While.mask()
    | NodeKind::Return.mask()
    | NodeKind::Goto.mask()
    | NodeKind::Label.mask()
    | NodeKind::Nop.mask()
    | NodeKind::Assign.mask()
    | NodeKind::Call.mask();

const EXPR_MASK: u32 = NodeKind::Ident.mask()
    | NodeKind::IntLit.mask()
    | NodeKind::StrLit.mask()
    | NodeKind::BinOp.mask()
    | NodeKind::Call.mask();

const DECL_MASK: u32 =
    NodeKind::Function.mask() | NodeKind::Param.mask() | NodeKind::Label.mask();

const NAME_MASK: u32 = NodeKind::Ident.mask();

const ITEM_MASK: u32 = (1u32 << ALL_KINDS.len()) - 1;

impl Category {
    pub const fn members(self) -> u32 {
        match self {
            Category::Item => ITEM_MASK,
            Category::Stmt => STMT_MASK,
            Category::Expr => EXPR_MASK,
            Category::Decl => DECL_MASK,
            Category::Name => NAME_MASK,
        }
    }

    /// Set-theoretic membership test.
    pub const fn admits(self, kind: NodeKind) -> bool {
        self.members() & kind.mask() != 0
    }
}

// ============================================================================
// Kind constraints (patterns)
// ============================================================================

/// A kind constraint carried by a plain pattern node: either one concrete
/// kind or everything beneath a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KindClass {
    Exact(NodeKind),
    In(Category),
}

impl KindClass {
    /// Does a subject of `kind` satisfy this constraint?
    pub fn admits(self, kind: NodeKind) -> bool {
        match self {
            KindClass::Exact(k) => k == kind,
            KindClass::In(cat) => cat.admits(kind),
        }
    }

    /// Non-strict specialization: every kind admitted by `self` is admitted
    /// by `other`.
    pub fn specializes(self, other: KindClass) -> bool {
        self.mask() & !other.mask() == 0
    }

    fn mask(self) -> u32 {
        match self {
            KindClass::Exact(k) => k.mask(),
            KindClass::In(cat) => cat.members(),
        }
    }
}

impl From<NodeKind> for KindClass {
    fn from(k: NodeKind) -> Self {
        KindClass::Exact(k)
    }
}

impl From<Category> for KindClass {
    fn from(c: Category) -> Self {
        KindClass::In(c)
    }
}

// ============================================================================
// Slot layouts
// ============================================================================

/// Shape of one child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotShape {
    /// Zero or one child.
    Optional,
    /// Ordered, duplicates allowed.
    Sequence,
    /// Unordered, canonically ordered in storage for determinism.
    Collection,
}

/// Static description of one slot of a concrete kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    pub shape: SlotShape,
    /// A reference from this slot to an `Ident` is the declaring reference.
    pub declaring: bool,
}

const fn slot(name: &'static str, shape: SlotShape) -> SlotSpec {
    SlotSpec { name, shape, declaring: false }
}

const fn decl_slot(name: &'static str) -> SlotSpec {
    SlotSpec { name, shape: SlotShape::Optional, declaring: true }
}

impl NodeKind {
    /// Child slots of this kind, in fixed per-kind order.
    pub fn layout(self) -> &'static [SlotSpec] {
        use SlotShape::*;
        match self {
            NodeKind::Module => const { &[slot("items", Collection)] },
            NodeKind::Function => const {
                &[
                    decl_slot("name"),
                    slot("params", Sequence),
                    slot("body", Optional),
                ]
            },
            NodeKind::Param => const { &[decl_slot("name")] },
            NodeKind::Block => const { &[slot("stmts", Sequence)] },
            NodeKind::If => const {
                &[
                    slot("cond", Optional),
                    slot("then", Optional),
                    slot("else", Optional),
                ]
            },
            NodeKind::While => const { &[slot("cond", Optional), slot("body", Optional)] },
            NodeKind::Return => const { &[slot("value", Optional)] },
            NodeKind::Goto => const { &[slot("target", Optional)] },
            NodeKind::Label => const { &[decl_slot("name"), slot("body", Optional)] },
            NodeKind::Nop => &[],
            NodeKind::Assign => const { &[slot("target", Optional), slot("value", Optional)] },
            NodeKind::Call => const { &[slot("callee", Optional), slot("args", Sequence)] },
            NodeKind::Ident => &[],
            NodeKind::IntLit => &[],
            NodeKind::StrLit => &[],
            NodeKind::BinOp => const { &[slot("lhs", Optional), slot("rhs", Optional)] },
        }
    }

    /// Index of a named slot in this kind's layout.
    pub fn slot_index(self, name: &str) -> Option<usize> {
        self.layout().iter().position(|s| s.name == name)
    }

    pub fn is_identifier(self) -> bool {
        Category::Name.admits(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_overlap() {
        // Call sits in both Stmt and Expr.
        assert!(Category::Stmt.admits(NodeKind::Call));
        assert!(Category::Expr.admits(NodeKind::Call));
        // Ident is an expression and an identifier.
        assert!(Category::Expr.admits(NodeKind::Ident));
        assert!(Category::Name.admits(NodeKind::Ident));
        assert!(!Category::Name.admits(NodeKind::IntLit));
    }

    #[test]
    fn test_item_admits_everything() {
        for &k in ALL_KINDS {
            assert!(Category::Item.admits(k), "{k} not in Item");
        }
    }

    #[test]
    fn test_kind_class_specializes() {
        let call = KindClass::Exact(NodeKind::Call);
        assert!(call.specializes(KindClass::In(Category::Stmt)));
        assert!(call.specializes(KindClass::In(Category::Expr)));
        assert!(call.specializes(call));
        assert!(!KindClass::In(Category::Stmt).specializes(call));
        assert!(KindClass::In(Category::Name).specializes(KindClass::In(Category::Expr)));
    }

    #[test]
    fn test_slot_lookup() {
        assert_eq!(NodeKind::If.slot_index("else"), Some(2));
        assert_eq!(NodeKind::If.slot_index("body"), None);
        assert!(NodeKind::Function.layout()[0].declaring);
        assert_eq!(NodeKind::Nop.layout().len(), 0);
    }
}
