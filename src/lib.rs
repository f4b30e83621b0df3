//! # treewright — Declarative AST Rewriting
//!
//! A program-transformation engine: search patterns over a closed node
//! taxonomy are matched against a subject tree with full backtracking, and a
//! replace pattern sharing coupling variables with the search pattern is
//! materialized and spliced in.
//!
//! ## Design Principles
//!
//! 1. **Closed taxonomy**: node kinds are one tagged union; category tests
//!    are bitset lookups, exhaustively matched everywhere
//! 2. **Arena trees**: subject nodes are handle-addressed; the single-owner
//!    invariant is an explicit check, not a pointer discipline
//! 3. **Non-matches are values**: structural disagreement flows back as
//!    `Outcome::NotFound`; the error channel carries only authoring mistakes
//! 4. **One ledger**: all backtracking goes through the `Conjecture`; retry
//!    means replay-from-root, diverging at the last choice
//!
//! ## Quick Start
//!
//! ```rust
//! use treewright::{Arena, Category, Node, NodeKind, RuleBuilder, SubjectTree};
//!
//! # fn example() -> treewright::Result<()> {
//! // Subject: `if (x) { y(); }`. The front end normalizes a missing
//! // else branch to Nop.
//! let mut arena = Arena::new();
//! let x = arena.ident("x");
//! let y = arena.ident("y");
//! let call = arena.insert(Node::new(NodeKind::Call).with_child("callee", y));
//! let body = arena.insert(Node::new(NodeKind::Block).with_seq("stmts", vec![call]));
//! let nop = arena.leaf(NodeKind::Nop);
//! let root = arena.insert(
//!     Node::new(NodeKind::If)
//!         .with_child("cond", x)
//!         .with_child("then", body)
//!         .with_child("else", nop),
//! );
//! let mut tree = SubjectTree::new(arena, root)?;
//!
//! // Rule: a no-op else branch becomes a jump to the common exit.
//! let mut r = RuleBuilder::new();
//! let cond = r.coupling("cond");
//! let then = r.coupling("then");
//! let c = r.within(Category::Expr);
//! r.couple(c, cond);
//! let t = r.within(Category::Stmt);
//! r.couple(t, then);
//! let nop_pat = r.exact(NodeKind::Nop);
//! let search = r.exact(NodeKind::If);
//! r.single(search, "cond", c);
//! r.single(search, "then", t);
//! r.single(search, "else", nop_pat);
//!
//! let exit = r.exact(NodeKind::Ident);
//! r.atom(exit, "exit");
//! let goto = r.exact(NodeKind::Goto);
//! r.single(goto, "target", exit);
//! let replace = r.exact(NodeKind::If);
//! r.single(replace, "cond", c);
//! r.single(replace, "then", t);
//! r.single(replace, "else", goto);
//! let rule = r.build(search, Some(replace))?;
//!
//! assert_eq!(rule.run_once(&mut tree)?, 1);
//! assert_eq!(rule.run_once(&mut tree)?, 0); // fixpoint
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `model` | node taxonomy, categories, slots, arena, ownership invariant |
//! | `pattern` | wildcard shapes, couplings, rule builder + validation |
//! | `matcher` | structural comparator, conjecture ledger, bind/verify passes |
//! | `rewrite` | duplicator/substituter, driver, rule sets, statistics |

// ============================================================================
// Modules
// ============================================================================

pub mod matcher;
pub mod model;
pub mod pattern;
pub mod rewrite;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Arena, Atom, Category, KindClass, Node, NodeId, NodeKind, Slot, SlotShape, SlotSpec,
    SubjectTree, ALL_KINDS,
};

// ============================================================================
// Re-exports: Patterns
// ============================================================================

pub use pattern::{Bound, CouplingBindings, CouplingId, PatId, Rule, RuleBuilder};

// ============================================================================
// Re-exports: Matching
// ============================================================================

pub use matcher::{Conjecture, MatchCx, Outcome, Phase};

// ============================================================================
// Re-exports: Rewriting
// ============================================================================

pub use rewrite::{RewriteStats, RuleSet, DEFAULT_CEILING};

// ============================================================================
// Error Types
// ============================================================================

/// Fatal authoring and invariant errors. Structural non-matches are never
/// errors; they are [`Outcome::NotFound`] values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Ownership violation at {node}: {detail}")]
    OwnershipViolation { node: String, detail: String },

    #[error("Pattern references undeclared coupling #{index}")]
    UndeclaredCoupling { index: u32 },

    #[error("More than one star in {place}")]
    DuplicateStar { place: String },

    #[error("Overlay kind {overlay} does not cover resolved base {base}")]
    OverlayKindMismatch { base: String, overlay: String },

    #[error("Malformed pattern: {0}")]
    MalformedPattern(String),

    #[error("Iteration ceiling of {limit} exceeded: rule set does not terminate")]
    IterationCeiling { limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
