//! Per-node payload: the fields a node owns besides its children.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload carried by a node. Most kinds carry `Atom::None`; identifiers
/// carry their name, literals their value, binary operators their operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Atom {
    #[default]
    None,
    Name(String),
    Int(i64),
    Str(String),
    Op(String),
}

impl Atom {
    pub fn is_none(&self) -> bool {
        matches!(self, Atom::None)
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Atom::Name(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Atom::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Atom {
    fn from(v: &str) -> Self {
        Atom::Name(v.to_owned())
    }
}
impl From<String> for Atom {
    fn from(v: String) -> Self {
        Atom::Name(v)
    }
}
impl From<i64> for Atom {
    fn from(v: i64) -> Self {
        Atom::Int(v)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::None => write!(f, ""),
            Atom::Name(s) => write!(f, "{s}"),
            Atom::Int(i) => write!(f, "{i}"),
            Atom::Str(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Atom::Op(op) => write!(f, "{op}"),
        }
    }
}
