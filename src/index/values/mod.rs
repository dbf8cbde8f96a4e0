//! Sorted value index
//!
//! Maps complete text or attribute values to the ascending positions that
//! hold them. Two files per index kind:
//!
//! - `{prefix}l`: 4-byte entry count, then per entry a VarNum count and
//!   VarNum position deltas
//! - `{prefix}r`: one 5-byte offset into the list file per entry, ordered by
//!   the represented value

pub mod reader;
pub mod writer;

pub use reader::ValueIndex;
pub use writer::ValueWriter;
