use super::{record_width, BucketIndex, SLOT_WIDTH};
use crate::error::{IndexError, Result};
use crate::index::fulltext::{within_distance, FtStructure, FullTextIndex};
use crate::index::postings::Posting;
use crate::index::stats::files_size;
use crate::index::types::{index_file, FtLayout, IndexKind, IndexMeta};
use crate::index::wildcard::WildcardPattern;
use crate::storage::MappedFile;
use regex::bytes::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    offset: usize,
    count: usize,
}

/// The mapped files of a bucket index
pub struct BucketFiles {
    dir: PathBuf,
    records: MappedFile,
    blob: MappedFile,
    buckets: Vec<Bucket>,
}

impl BucketFiles {
    pub fn open(dir: &Path) -> Result<Self> {
        let slots = MappedFile::open(&index_file(dir, IndexKind::FullText, 'x'))?;
        let records = MappedFile::open(&index_file(dir, IndexKind::FullText, 'y'))?;
        let blob = MappedFile::open(&index_file(dir, IndexKind::FullText, 'z'))?;

        if slots.is_empty() || slots.len() % SLOT_WIDTH != 0 {
            return Err(IndexError::malformed(format!(
                "{} holds {} bytes",
                slots.path().display(),
                slots.len()
            )));
        }
        let mut buckets = Vec::with_capacity(slots.len() / SLOT_WIDTH);
        for len in 0..slots.len() / SLOT_WIDTH {
            let bucket = Bucket {
                offset: slots.read_fixed(len * SLOT_WIDTH, 5)? as usize,
                count: slots.read_fixed(len * SLOT_WIDTH + 5, 4)? as usize,
            };
            if bucket.offset + bucket.count * record_width(len) > records.len() {
                return Err(IndexError::malformed(format!("bucket {} overruns the record file", len)));
            }
            buckets.push(bucket);
        }
        log::debug!(
            "Opened length buckets ({} lengths, {} record bytes, {} list bytes)",
            buckets.len(),
            records.len(),
            blob.len()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            records,
            blob,
            buckets,
        })
    }

    /// Longest token length the directory covers
    pub fn max_len(&self) -> usize {
        self.buckets.len() - 1
    }

    /// Token and posting of record `i` in the bucket for `len`
    fn record(&self, len: usize, i: usize) -> Result<(&[u8], Posting)> {
        let width = record_width(len);
        let raw = self.records.slice(self.buckets[len].offset + i * width, width)?;
        let (token, tail) = raw.split_at(len);
        let size = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let pointer = tail[4..].iter().fold(0u64, |acc, &b| acc << 8 | b as u64);
        Ok((token, Posting { size, pointer }))
    }

    /// First record of the bucket for `len` whose token is `>= key`
    fn lower_bound(&self, len: usize, key: &[u8]) -> Result<usize> {
        let (mut lo, mut hi) = (0, self.buckets[len].count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.record(len, mid)?.0 < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Bucket lengths in `lo..=hi`, clipped to the directory
    fn lengths(&self, lo: usize, hi: usize) -> std::ops::RangeInclusive<usize> {
        lo.max(1)..=hi.min(self.max_len())
    }
}

impl FtStructure for BucketFiles {
    fn name(&self) -> &'static str {
        "Length buckets"
    }

    fn exact(&self, token: &[u8]) -> Result<Option<Posting>> {
        let len = token.len();
        if len == 0 || len > self.max_len() {
            return Ok(None);
        }
        let i = self.lower_bound(len, token)?;
        if i == self.buckets[len].count {
            return Ok(None);
        }
        let (found, posting) = self.record(len, i)?;
        Ok((found.cmp(token) == Ordering::Equal).then_some(posting))
    }

    fn wildcard(&self, pattern: &WildcardPattern, out: &mut Vec<Posting>) -> Result<()> {
        let regex = Regex::new(&pattern.to_regex())
            .map_err(|e| IndexError::malformed(format!("wildcard pattern: {}", e)))?;
        let prefix = pattern.literal_prefix();
        let max = pattern.max_len().unwrap_or(usize::MAX);

        for len in self.lengths(pattern.min_len().max(prefix.len()), max) {
            let start = self.lower_bound(len, &prefix)?;
            for i in start..self.buckets[len].count {
                let (token, posting) = self.record(len, i)?;
                if !token.starts_with(&prefix) {
                    break;
                }
                if regex.is_match(token) {
                    out.push(posting);
                }
            }
        }
        Ok(())
    }

    fn fuzzy(&self, token: &[u8], max_errors: u32, out: &mut Vec<Posting>) -> Result<()> {
        let k = max_errors as usize;
        for len in self.lengths(token.len().saturating_sub(k), token.len().saturating_add(k)) {
            for i in 0..self.buckets[len].count {
                let (candidate, posting) = self.record(len, i)?;
                if within_distance(token, candidate, max_errors) {
                    out.push(posting);
                }
            }
        }
        Ok(())
    }

    fn tokens(&self, prefix: &[u8], out: &mut Vec<(Vec<u8>, Posting)>) -> Result<()> {
        let first = out.len();
        for len in self.lengths(prefix.len(), usize::MAX) {
            let start = self.lower_bound(len, prefix)?;
            for i in start..self.buckets[len].count {
                let (token, posting) = self.record(len, i)?;
                if !token.starts_with(prefix) {
                    break;
                }
                out.push((token.to_vec(), posting));
            }
        }
        out[first..].sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Ok(())
    }

    fn blob(&self) -> &MappedFile {
        &self.blob
    }

    fn disk_size(&self) -> u64 {
        let paths: Vec<PathBuf> = FtLayout::Buckets
            .suffixes()
            .iter()
            .map(|&s| index_file(&self.dir, IndexKind::FullText, s))
            .collect();
        files_size(paths.iter().map(PathBuf::as_path))
    }
}

impl BucketIndex {
    pub fn open(dir: &Path, meta: &IndexMeta, total_size: u32) -> Result<Self> {
        Ok(FullTextIndex::new(BucketFiles::open(dir)?, meta, total_size))
    }
}
