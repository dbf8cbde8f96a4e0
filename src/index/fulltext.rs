//! Query front end shared by both full-text layouts.
//!
//! The trie and the length buckets only answer structural questions (which
//! postings match a token, a pattern or an edit-distance ball). Lexer
//! normalization, result caching, cost estimates and hit decoding live here.

use crate::error::{IndexError, Result};
use crate::index::cache::IndexResultCache;
use crate::index::postings::{decode_ft_list, encode_ft_list, Occurrence, Posting};
use crate::index::scoring::{ScoreRange, ScoringModel, UnitStats};
use crate::index::stats::IndexStats;
use crate::index::types::{IndexConfig, IndexKind, IndexMeta};
use crate::index::wildcard::WildcardPattern;
use crate::index::{EntrySpec, FtMode, Index, IndexEntry, IndexIterator, IndexToken};
use crate::storage::MappedFile;
use crate::utils::Lexer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Structural lookups of a full-text layout. Postings are reported in the
/// layout's discovery order.
pub trait FtStructure: Send + Sync {
    fn name(&self) -> &'static str;

    fn exact(&self, token: &[u8]) -> Result<Option<Posting>>;

    fn wildcard(&self, pattern: &WildcardPattern, out: &mut Vec<Posting>) -> Result<()>;

    fn fuzzy(&self, token: &[u8], max_errors: u32, out: &mut Vec<Posting>) -> Result<()>;

    /// Tokens starting with `prefix`, in index order
    fn tokens(&self, prefix: &[u8], out: &mut Vec<(Vec<u8>, Posting)>) -> Result<()>;

    /// File holding the position lists
    fn blob(&self) -> &MappedFile;

    fn disk_size(&self) -> u64;
}

/// A full-text index over one of the layouts
pub struct FullTextIndex<S> {
    structure: Option<S>,
    lexer: Lexer,
    config: IndexConfig,
    scored: bool,
    cache: IndexResultCache,
    total_size: u32,
}

impl<S: FtStructure> FullTextIndex<S> {
    pub fn new(structure: S, meta: &IndexMeta, total_size: u32) -> Self {
        let config = meta.config(IndexKind::FullText);
        Self {
            structure: Some(structure),
            lexer: Lexer::new(config.case_sensitive, config.max_token_len, &config.stopwords),
            scored: config.scoring,
            cache: IndexResultCache::new(config.cache_initial_capacity, config.cache_max_entries),
            config,
            total_size,
        }
    }

    fn structure(&self) -> Result<&S> {
        self.structure.as_ref().ok_or(IndexError::Closed)
    }

    fn find(&self, token: &[u8]) -> Result<Option<Posting>> {
        if let Some(posting) = self.cache.get(token) {
            return Ok(Some(posting));
        }
        let found = self.structure()?.exact(token)?;
        if let Some(p) = found {
            self.cache.put(token, p.size, p.pointer);
        }
        Ok(found)
    }

    fn hits(&self, postings: &[Posting]) -> Result<IndexIterator> {
        let blob = self.structure()?.blob().bytes();
        let mut hits = Vec::with_capacity(postings.iter().map(|p| p.size as usize).sum());
        for posting in postings {
            hits.extend(decode_ft_list(blob, posting.pointer as usize, self.scored)?);
        }
        Ok(IndexIterator::from_hits(hits))
    }

    fn postings(&self, token: &[u8], mode: FtMode) -> Result<Vec<Posting>> {
        let token = self.lexer.normalize(token);
        if token.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        match mode {
            FtMode::Wildcard if WildcardPattern::has_wildcards(&token) => {
                let pattern = WildcardPattern::parse(&token);
                match pattern.as_literal() {
                    Some(literal) => out.extend(self.exact_posting(&literal)?),
                    None => self.structure()?.wildcard(&pattern, &mut out)?,
                }
            }
            FtMode::Fuzzy { max_errors } => {
                let k = self.config.fuzzy_budget(token.len(), max_errors);
                self.structure()?.fuzzy(&token, k, &mut out)?;
            }
            _ => out.extend(self.exact_posting(&token)?),
        }
        Ok(out)
    }

    fn exact_posting(&self, token: &[u8]) -> Result<Option<Posting>> {
        if token.len() > self.config.max_token_len {
            return Ok(None);
        }
        self.find(token)
    }

    fn all_tokens(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Posting)>> {
        let mut out = Vec::new();
        self.structure()?.tokens(prefix, &mut out)?;
        Ok(out)
    }
}

impl<S: FtStructure> Index for FullTextIndex<S> {
    fn kind(&self) -> IndexKind {
        IndexKind::FullText
    }

    fn info(&self) -> Result<String> {
        let structure = self.structure()?;
        let tokens = self.all_tokens(b"")?;
        let stats = IndexStats::collect(
            IndexKind::FullText,
            structure.name(),
            structure.disk_size(),
            tokens.into_iter().map(|(t, p)| (t, p.size)),
        )
        .with_lexer(&self.lexer, self.scored);
        Ok(stats.to_string())
    }

    fn entries(&self, spec: &EntrySpec) -> Result<Vec<IndexEntry>> {
        let tokens = match spec {
            EntrySpec::All => self.all_tokens(b"")?,
            EntrySpec::Prefix(prefix) => self.all_tokens(&self.lexer.normalize(prefix))?,
            EntrySpec::Range { min, max } => {
                let (min, max) = (self.lexer.normalize(min), self.lexer.normalize(max));
                let mut tokens = self.all_tokens(b"")?;
                tokens.retain(|(t, _)| t.as_slice() >= min.as_ref() && t.as_slice() <= max.as_ref());
                tokens
            }
        };
        Ok(tokens
            .into_iter()
            .map(|(token, p)| IndexEntry { token, count: p.size })
            .collect())
    }

    fn lookup(&self, token: &IndexToken) -> Result<IndexIterator> {
        let postings = match token {
            IndexToken::Exact(t) => self.postings(t, FtMode::Exact)?,
            IndexToken::FullText { token, mode } => self.postings(token, *mode)?,
            IndexToken::NumericRange { .. } | IndexToken::StringRange { .. } => Vec::new(),
        };
        self.hits(&postings)
    }

    fn approx_count(&self, token: &IndexToken) -> Result<u32> {
        let (bytes, mode) = match token {
            IndexToken::Exact(t) => (t, FtMode::Exact),
            IndexToken::FullText { token, mode } => (token, *mode),
            IndexToken::NumericRange { .. } | IndexToken::StringRange { .. } => return Ok(u32::MAX),
        };
        let exact = match mode {
            FtMode::Exact => true,
            FtMode::Wildcard => !WildcardPattern::has_wildcards(bytes),
            FtMode::Fuzzy { .. } => false,
        };
        if exact {
            if bytes.len() > self.config.max_token_len {
                return Ok(u32::MAX);
            }
            let token = self.lexer.normalize(bytes);
            return Ok(self.find(&token)?.map(|p| p.size).unwrap_or(0));
        }
        Ok((self.total_size / 10).max(1))
    }

    fn close(&mut self) {
        self.structure = None;
        self.cache.clear();
    }
}

/// Appends full-text lists to the blob file of a layout being built,
/// scoring each unit when unit statistics are given
pub struct FtBlobWriter {
    out: BufWriter<File>,
    offset: u64,
    buf: Vec<u8>,
    stats: Option<UnitStats>,
    scores: Vec<f32>,
    range: Option<ScoreRange>,
}

impl FtBlobWriter {
    pub fn create(path: &Path, stats: Option<UnitStats>) -> Result<Self> {
        Ok(Self {
            out: BufWriter::with_capacity(65536, File::create(path)?),
            offset: 0,
            buf: Vec::with_capacity(256),
            stats,
            scores: Vec::new(),
            range: None,
        })
    }

    /// Write the list of one token; `occurrences` are sorted by position
    /// and ordinal
    pub fn write(&mut self, occurrences: &[Occurrence]) -> Result<Posting> {
        self.buf.clear();
        let scores = match &self.stats {
            Some(stats) => {
                self.scores.clear();
                let units: Vec<&[Occurrence]> = occurrences.chunk_by(|a, b| a.0 == b.0).collect();
                let df = units.len() as u32;
                for unit in units {
                    let pre = unit[0].0;
                    let score =
                        ScoringModel::tf_idf(unit.len() as u32, stats.max_tf(pre), stats.total_units(), df);
                    self.range = Some(ScoreRange::include(self.range, score));
                    self.scores.push(score);
                }
                Some(self.scores.as_slice())
            }
            None => None,
        };
        encode_ft_list(occurrences, scores, &mut self.buf);
        self.out.write_all(&self.buf)?;

        let posting = Posting {
            size: occurrences.len() as u32,
            pointer: self.offset,
        };
        self.offset += self.buf.len() as u64;
        Ok(posting)
    }

    /// Flush the blob and report the score range, if scored
    pub fn finish(&mut self) -> Result<Option<(f32, f32)>> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(self.range.map(|r| (r.min, r.max)))
    }
}

/// Levenshtein distances between a query and every prefix walked so far.
/// `row[j]` is the distance between the walked bytes and `query[..j]`.
#[derive(Debug, Clone)]
pub struct DistanceRow(Vec<u32>);

impl DistanceRow {
    pub fn start(query: &[u8]) -> Self {
        DistanceRow((0..=query.len() as u32).collect())
    }

    /// Row after walking one more byte
    pub fn advance(&self, query: &[u8], byte: u8) -> Self {
        let prev = &self.0;
        let mut row = Vec::with_capacity(prev.len());
        row.push(prev[0] + 1);
        for j in 1..prev.len() {
            let cost = u32::from(query[j - 1] != byte);
            let best = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
            row.push(best);
        }
        DistanceRow(row)
    }

    /// Distance between the walked bytes and the whole query
    pub fn distance(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    /// No extension of the walked bytes can come within `k`
    pub fn exceeds(&self, k: u32) -> bool {
        self.0.iter().all(|&d| d > k)
    }
}

/// Whether the edit distance between `a` and `b` is at most `k`
pub fn within_distance(a: &[u8], b: &[u8], k: u32) -> bool {
    if a.len().abs_diff(b.len()) > k as usize {
        return false;
    }
    let mut row = DistanceRow::start(a);
    for &byte in b {
        row = row.advance(a, byte);
        if row.exceeds(k) {
            return false;
        }
    }
    row.distance() <= k
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &[u8], b: &[u8]) -> u32 {
        let mut row = DistanceRow::start(a);
        for &byte in b {
            row = row.advance(a, byte);
        }
        row.distance()
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(b"kitten", b"sitting"), 3);
        assert_eq!(distance(b"", b"abc"), 3);
        assert_eq!(distance(b"flaw", b"lawn"), 2);
        assert_eq!(distance(b"same", b"same"), 0);
    }

    #[test]
    fn test_blob_writer_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let mut stats = UnitStats::default();
        stats.record_unit(1, 2);
        stats.record_unit(5, 1);

        let mut writer = FtBlobWriter::create(&path, Some(stats)).unwrap();
        let first = writer.write(&[(1, 0), (1, 3)]).unwrap();
        let second = writer.write(&[(1, 1), (5, 0)]).unwrap();
        let (min, max) = writer.finish().unwrap().unwrap();
        assert!(min <= max && max <= 1.0);

        assert_eq!(first, Posting { size: 2, pointer: 0 });
        assert_eq!(second.size, 2);
        let blob = std::fs::read(&path).unwrap();
        let hits = decode_ft_list(&blob, second.pointer as usize, true).unwrap();
        assert_eq!(hits.iter().map(|h| h.pre).collect::<Vec<_>>(), vec![1, 5]);
        assert!(hits.iter().all(|h| h.score.is_some()));
    }

    #[test]
    fn test_within_distance() {
        assert!(within_distance(b"house", b"mouse", 1));
        assert!(!within_distance(b"house", b"mice", 2));
        assert!(within_distance(b"house", b"hose", 1));
        assert!(!within_distance(b"a", b"abcd", 2));
    }
}
