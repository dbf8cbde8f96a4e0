//! The main-table collaborator read by the index layer.
//!
//! Indexes never store node content themselves beyond what they need to
//! answer lookups. Value indexes recover their tokens by asking the table for
//! the text at a position, and builders walk the table once per build.

pub mod id_map;
pub mod mem;

use std::borrow::Cow;

pub use id_map::IdPositionMap;
pub use mem::{MemData, MemDataBuilder};

/// Sequential position of a node in the table
pub type Pre = u32;

/// Stable node identifier
pub type Id = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Doc,
    Elem,
    Text,
    Attr,
    Comm,
    Pi,
}

/// Read-only view of the node table.
pub trait Data: Send + Sync {
    fn kind(&self, pre: Pre) -> NodeKind;

    /// Parent position, `None` for document nodes
    fn parent(&self, pre: Pre, kind: NodeKind) -> Option<Pre>;

    /// Number of positions covered by the subtree rooted at `pre`
    fn size(&self, pre: Pre, kind: NodeKind) -> u32;

    /// Text of a text node (`text == true`) or value of an attribute
    fn text(&self, pre: Pre, text: bool) -> Cow<'_, [u8]>;

    /// Numeric value of the text, NaN when it is not a plain decimal number
    fn text_as_double(&self, pre: Pre, text: bool) -> f64 {
        parse_decimal(&self.text(pre, text))
    }

    fn text_len(&self, pre: Pre, text: bool) -> usize {
        self.text(pre, text).len()
    }

    /// Number of positions in the table
    fn total_size(&self) -> u32;
}

/// Parse plain decimal notation: optional sign, digits, optional fraction,
/// surrounding whitespace. Exponents and special values yield NaN.
pub fn parse_decimal(bytes: &[u8]) -> f64 {
    let trimmed = bytes.trim_ascii();
    let unsigned = match trimmed.first() {
        Some(b'+') | Some(b'-') => &trimmed[1..],
        _ => trimmed,
    };
    let mut digits = 0;
    let mut dots = 0;
    for &b in unsigned {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return f64::NAN,
        }
    }
    if digits == 0 || dots > 1 {
        return f64::NAN;
    }
    std::str::from_utf8(trimmed)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}
