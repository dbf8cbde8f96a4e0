//! # xmlidx - Value and full-text indexes for an embedded XML database
//!
//! Disk-backed secondary indexes over the node table of an XML store:
//! sorted value indexes over text and attribute values, a full-text index in
//! one of two layouts, and the id-to-position map that survives updates.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Index building and lookups (value, trie, length buckets)
//! - [`data`] - The node table the indexes are built from, and the id map
//! - [`storage`] - Random-access and memory-mapped files
//! - [`utils`] - VarNum encoding, lexer, memory probes, progress bars
//! - [`error`] - The error type shared by all of the above
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use xmlidx::data::{Data, MemData};
//! use xmlidx::index::{open_index, IndexBuild, IndexConfig, IndexKind, IndexToken};
//!
//! let data: Arc<dyn Data> = Arc::new(MemData::texts(["apple pie", "banana", "apple pie"]));
//!
//! // Build the indexes once
//! let build = IndexBuild::new("db/index", IndexConfig::default())?;
//! build.build_value_indexes(data.as_ref())?;
//! build.build_fulltext(data.as_ref())?;
//!
//! // Look values and words up
//! if let Some(text) = open_index("db/index".as_ref(), IndexKind::Text, data.clone())? {
//!     let hits = text.lookup(&IndexToken::exact("apple pie"))?;
//!     assert_eq!(hits.pres(), vec![0, 2]);
//! }
//! if let Some(ft) = open_index("db/index".as_ref(), IndexKind::FullText, data)? {
//!     let hits = ft.lookup(&IndexToken::fuzzy("aple", Some(1)))?;
//!     println!("{} hits", hits.size());
//! }
//! # Ok::<(), xmlidx::IndexError>(())
//! ```
//!
//! ## Building
//!
//! Builders keep memory bounded: when the memory probe reports pressure
//! twice in a row, the accumulated tokens are written to sorted spill files
//! and merged at the end. Finished files are renamed into place and recorded
//! in `meta.json`, so a failed build never replaces a working index.

pub mod data;
pub mod error;
pub mod index;
pub mod storage;
pub mod utils;

pub use error::{IndexError, Result};
