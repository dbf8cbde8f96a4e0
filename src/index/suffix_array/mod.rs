//! Full-text index as length buckets
//!
//! Tokens are grouped by byte length and sorted inside each group, so an
//! exact lookup is a binary search over fixed-width records and fuzzy
//! searches only visit the lengths within the error budget.
//!
//! ## File Format
//!
//! - `ftxx`: per length `0..=max_token_len`, the 5-byte offset of its
//!   bucket in `ftxy` and its record count (4 bytes)
//! - `ftxy`: records `token[len] size:u32 pointer:5 bytes`, sorted per bucket
//! - `ftxz`: position lists

pub mod builder;
pub mod reader;

pub use builder::BucketWriter;
pub use reader::BucketFiles;

use crate::index::fulltext::FullTextIndex;

/// Width of a directory slot in `ftxx`
pub(crate) const SLOT_WIDTH: usize = 9;

/// Record width of the bucket holding tokens of `len` bytes
pub(crate) fn record_width(len: usize) -> usize {
    len + 9
}

/// Full-text index over the bucket layout
pub type BucketIndex = FullTextIndex<BucketFiles>;
