//! # Patterns
//!
//! Pattern trees over the node taxonomy plus the wildcard kinds, couplings,
//! and the rule definition surface. Patterns never occur in subject trees;
//! wildcard shapes exist only here.

pub mod coupling;
pub mod node;
pub mod rule;

pub use coupling::{Bound, CouplingBindings, CouplingId};
pub use node::{PatId, PatternNode, Shape, SlotPat, SoftFn};
pub use rule::{Rule, RuleBuilder};
