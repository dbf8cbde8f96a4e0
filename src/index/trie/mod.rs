//! Full-text index as a compressed trie
//!
//! Three files:
//!
//! - `ftxa`: node records in pre-order, node 0 being the root with an empty
//!   label. A record is `[label len u8][label][(child id u32, first byte)*]
//!   [size u32][pointer 5 bytes]`; children are sorted by their first byte.
//! - `ftxb`: position lists, addressed by the node pointers
//! - `ftxc`: `nodes + 1` 4-byte offsets, node `i` spans `[c[i], c[i + 1])`
//!   in `ftxa`
//!
//! Nodes without a token have size 0. Tokens are at most 255 bytes, so a
//! label always fits its length byte.

pub mod builder;
pub mod reader;
mod search;

pub use builder::TrieWriter;
pub use reader::{NodeView, TrieFiles};

use crate::index::fulltext::FullTextIndex;

/// Width of a child reference: node id and first label byte
pub(crate) const CHILD_WIDTH: usize = 5;

/// Width of the size and pointer that close a node record
pub(crate) const TAIL_WIDTH: usize = 9;

/// Full-text index over the trie layout
pub type TrieIndex = FullTextIndex<TrieFiles>;
