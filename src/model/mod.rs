//! # Item Model
//!
//! The concrete node taxonomy and subject-tree storage every other module
//! works against: a closed union of kinds, an overlapping category lattice,
//! fixed per-kind slot layouts, and arena-allocated nodes addressed by handle.
//!
//! Design rule: this module is pure data plus structural primitives. No
//! pattern types, no matching, no rewriting.

pub mod arena;
pub mod atom;
pub mod kind;
pub mod node;
pub mod tree;

pub use arena::Arena;
pub use atom::Atom;
pub use kind::{Category, KindClass, NodeKind, SlotShape, SlotSpec, ALL_KINDS};
pub use node::{Node, NodeId, Slot};
pub use tree::SubjectTree;
