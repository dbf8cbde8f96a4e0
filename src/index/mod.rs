//! Value and full-text indexes.
//!
//! - [`values`] - sorted value index over text or attribute values
//! - [`trie`] - full-text index as a compressed trie
//! - [`suffix_array`] - full-text index as length buckets
//! - [`build`] - bounded-memory builders with spill files and k-way merge
//! - [`cache`] - token to posting cache shared by queries
//!
//! Every index answers the same [`Index`] interface. Looking up a token
//! that is not indexed yields an empty [`IndexIterator`], never an error.

pub mod build;
pub mod cache;
pub mod fulltext;
pub mod postings;
pub mod scoring;
pub mod stats;
pub mod suffix_array;
pub mod trie;
pub mod types;
pub mod values;
pub mod wildcard;

use crate::data::{Data, Pre};
use crate::error::Result;
use roaring::RoaringBitmap;
use std::path::Path;
use std::sync::Arc;

pub use build::{drop_index, IndexBuild};
pub use cache::IndexResultCache;
pub use scoring::ScoringModel;
pub use types::*;

/// A single match: position, token ordinal (0 for value indexes) and the
/// full-text score if the index was built with scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub pre: Pre,
    pub pos: u32,
    pub score: Option<f32>,
}

/// How a full-text token is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtMode {
    Exact,
    Wildcard,
    /// Edit distance bound, `None` for the configured default
    Fuzzy { max_errors: Option<u32> },
}

/// What a query asks an index for
#[derive(Debug, Clone, PartialEq)]
pub enum IndexToken {
    Exact(Vec<u8>),
    NumericRange {
        min: f64,
        max: f64,
    },
    StringRange {
        min: Vec<u8>,
        min_inclusive: bool,
        max: Vec<u8>,
        max_inclusive: bool,
    },
    FullText {
        token: Vec<u8>,
        mode: FtMode,
    },
}

impl IndexToken {
    pub fn exact(token: impl AsRef<[u8]>) -> Self {
        IndexToken::Exact(token.as_ref().to_vec())
    }

    pub fn wildcard(pattern: impl AsRef<[u8]>) -> Self {
        IndexToken::FullText {
            token: pattern.as_ref().to_vec(),
            mode: FtMode::Wildcard,
        }
    }

    pub fn fuzzy(token: impl AsRef<[u8]>, max_errors: Option<u32>) -> Self {
        IndexToken::FullText {
            token: token.as_ref().to_vec(),
            mode: FtMode::Fuzzy { max_errors },
        }
    }
}

/// Selection for [`Index::entries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySpec {
    All,
    Prefix(Vec<u8>),
    /// Inclusive token range
    Range { min: Vec<u8>, max: Vec<u8> },
}

/// A distinct indexed token and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub token: Vec<u8>,
    pub count: u32,
}

/// Hits of a lookup, in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexIterator {
    hits: Vec<Hit>,
}

impl IndexIterator {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hits(hits: Vec<Hit>) -> Self {
        Self { hits }
    }

    pub fn from_pres<I: IntoIterator<Item = Pre>>(pres: I) -> Self {
        Self {
            hits: pres
                .into_iter()
                .map(|pre| Hit { pre, pos: 0, score: None })
                .collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Append the hits of `other`, keeping discovery order
    pub fn union(mut self, other: IndexIterator) -> Self {
        self.hits.extend(other.hits);
        self
    }

    /// Positions in discovery order, duplicates kept
    pub fn pres(&self) -> Vec<Pre> {
        self.hits.iter().map(|h| h.pre).collect()
    }

    /// Distinct positions in ascending order
    pub fn into_pres(self) -> Vec<Pre> {
        let bitmap: RoaringBitmap = self.hits.into_iter().map(|h| h.pre).collect();
        bitmap.into_iter().collect()
    }
}

impl IntoIterator for IndexIterator {
    type Item = Hit;
    type IntoIter = std::vec::IntoIter<Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Interface the query layer uses to talk to an index
pub trait Index: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Human-readable statistics
    fn info(&self) -> Result<String>;

    /// Indexed tokens with their counts, in index order
    fn entries(&self, spec: &EntrySpec) -> Result<Vec<IndexEntry>>;

    fn lookup(&self, token: &IndexToken) -> Result<IndexIterator>;

    /// Estimated result size; `u32::MAX` means the index cannot answer
    fn approx_count(&self, token: &IndexToken) -> Result<u32>;

    /// Release the index files; later calls fail with `Closed`
    fn close(&mut self);
}

/// Open the index of `kind` in `dir`, or `None` if it has not been built
pub fn open_index(dir: &Path, kind: IndexKind, data: Arc<dyn Data>) -> Result<Option<Box<dyn Index>>> {
    let meta = IndexMeta::load_or_default(dir)?;
    if !meta.available(kind) {
        return Ok(None);
    }
    let index: Box<dyn Index> = match kind {
        IndexKind::Text | IndexKind::Attribute => {
            Box::new(values::ValueIndex::open(dir, kind, &meta, data)?)
        }
        IndexKind::FullText => match meta.ft_layout {
            FtLayout::Trie => Box::new(trie::TrieIndex::open(dir, &meta, data.total_size())?),
            FtLayout::Buckets => Box::new(suffix_array::BucketIndex::open(dir, &meta, data.total_size())?),
        },
    };
    Ok(Some(index))
}
