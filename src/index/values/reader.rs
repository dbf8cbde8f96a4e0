use crate::data::{Data, Pre};
use crate::error::{IndexError, Result};
use crate::index::cache::IndexResultCache;
use crate::index::postings::{decode_value_list, value_list_head, Posting};
use crate::index::stats::{files_size, IndexStats};
use crate::index::types::{index_file, IndexKind, IndexMeta, VALUE_SUFFIXES};
use crate::index::{EntrySpec, Index, IndexEntry, IndexIterator, IndexToken};
use crate::storage::MappedFile;
use roaring::RoaringBitmap;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct ValueFiles {
    list: MappedFile,
    refs: MappedFile,
}

/// Sorted value index over text or attribute values.
///
/// Tokens are not stored: the first position of each list is resolved
/// through the main table whenever the binary search needs the token.
pub struct ValueIndex {
    kind: IndexKind,
    dir: PathBuf,
    data: Arc<dyn Data>,
    files: Option<ValueFiles>,
    size: usize,
    max_token_len: usize,
    cache: IndexResultCache,
}

impl ValueIndex {
    pub fn open(dir: &Path, kind: IndexKind, meta: &IndexMeta, data: Arc<dyn Data>) -> Result<Self> {
        let list = MappedFile::open(&index_file(dir, kind, 'l'))?;
        let refs = MappedFile::open(&index_file(dir, kind, 'r'))?;

        let size = list.read_fixed(0, 4)? as usize;
        if refs.len() != size * 5 {
            return Err(IndexError::malformed(format!(
                "{} holds {} bytes for {} entries",
                refs.path().display(),
                refs.len(),
                size
            )));
        }
        log::debug!(
            "Opened {} ({} entries, {} list bytes)",
            kind.label(),
            size,
            list.len()
        );

        let config = meta.config(kind);
        Ok(Self {
            kind,
            dir: dir.to_path_buf(),
            data,
            files: Some(ValueFiles { list, refs }),
            size,
            max_token_len: config.max_token_len,
            cache: IndexResultCache::new(config.cache_initial_capacity, config.cache_max_entries),
        })
    }

    /// Number of distinct values
    pub fn size(&self) -> usize {
        self.size
    }

    fn files(&self) -> Result<&ValueFiles> {
        self.files.as_ref().ok_or(IndexError::Closed)
    }

    fn pointer(&self, files: &ValueFiles, i: usize) -> Result<usize> {
        Ok(files.refs.read_fixed(i * 5, 5)? as usize)
    }

    fn posting(&self, files: &ValueFiles, i: usize) -> Result<(Posting, Pre)> {
        let pointer = self.pointer(files, i)?;
        let (size, first) = value_list_head(files.list.bytes(), pointer)?;
        let first = first.ok_or_else(|| IndexError::malformed("empty value list"))?;
        Ok((
            Posting {
                size,
                pointer: pointer as u64,
            },
            first,
        ))
    }

    /// Token of entry `i`, recovered from the main table
    fn token_at(&self, files: &ValueFiles, i: usize) -> Result<Cow<'_, [u8]>> {
        let (_, first) = self.posting(files, i)?;
        Ok(self.data.text(first, self.kind.reads_text()))
    }

    /// First entry whose token is `>= key` (`> key` if not inclusive)
    fn lower_bound(&self, files: &ValueFiles, key: &[u8], inclusive: bool) -> Result<usize> {
        let (mut lo, mut hi) = (0, self.size);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let token = self.token_at(files, mid)?;
            let before = match token.as_ref().cmp(key) {
                Ordering::Less => true,
                Ordering::Equal => !inclusive,
                Ordering::Greater => false,
            };
            if before {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    fn find(&self, token: &[u8]) -> Result<Option<Posting>> {
        if let Some(posting) = self.cache.get(token) {
            return Ok(Some(posting));
        }
        let files = self.files()?;
        let i = self.lower_bound(files, token, true)?;
        if i == self.size || self.token_at(files, i)?.as_ref() != token {
            return Ok(None);
        }
        let (posting, _) = self.posting(files, i)?;
        Ok(Some(self.cache.put(token, posting.size, posting.pointer)))
    }

    fn read_list(&self, files: &ValueFiles, pointer: usize) -> Result<Vec<Pre>> {
        decode_value_list(files.list.bytes(), pointer)
    }

    fn exact(&self, token: &[u8]) -> Result<IndexIterator> {
        if token.is_empty() || token.len() > self.max_token_len {
            return Ok(IndexIterator::empty());
        }
        match self.find(token)? {
            Some(posting) => Ok(IndexIterator::from_pres(
                self.read_list(self.files()?, posting.pointer as usize)?,
            )),
            None => Ok(IndexIterator::empty()),
        }
    }

    /// Full scan; tokens are sorted as strings, not as numbers
    fn numeric_range(&self, min: f64, max: f64) -> Result<IndexIterator> {
        if min.is_nan() || max.is_nan() || min > max {
            return Ok(IndexIterator::empty());
        }
        let files = self.files()?;
        let width = integer_width(min, max);
        let text = self.kind.reads_text();
        let mut pres = RoaringBitmap::new();

        for i in 0..self.size {
            let (posting, first) = self.posting(files, i)?;
            if let Some(width) = width {
                let token = self.data.text(first, text);
                if canonical_integer(&token, width).is_some_and(|v| v as f64 > max) {
                    break;
                }
            }
            let value = self.data.text_as_double(first, text);
            if value >= min && value <= max {
                pres.extend(self.read_list(files, posting.pointer as usize)?);
            }
        }
        Ok(IndexIterator::from_pres(pres))
    }

    fn string_range(&self, min: &[u8], min_incl: bool, max: &[u8], max_incl: bool) -> Result<IndexIterator> {
        let files = self.files()?;
        let mut pres = RoaringBitmap::new();
        let mut i = self.lower_bound(files, min, min_incl)?;
        while i < self.size {
            let past = match self.token_at(files, i)?.as_ref().cmp(max) {
                Ordering::Less => false,
                Ordering::Equal => !max_incl,
                Ordering::Greater => true,
            };
            if past {
                break;
            }
            pres.extend(self.read_list(files, self.pointer(files, i)?)?);
            i += 1;
        }
        Ok(IndexIterator::from_pres(pres))
    }

    fn collect_entries<F>(&self, start: &[u8], mut keep: F) -> Result<Vec<IndexEntry>>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let files = self.files()?;
        let mut out = Vec::new();
        for i in self.lower_bound(files, start, true)?..self.size {
            let token = self.token_at(files, i)?;
            if !keep(&token) {
                break;
            }
            let (posting, _) = self.posting(files, i)?;
            out.push(IndexEntry {
                token: token.into_owned(),
                count: posting.size,
            });
        }
        Ok(out)
    }
}

impl Index for ValueIndex {
    fn kind(&self) -> IndexKind {
        self.kind
    }

    fn info(&self) -> Result<String> {
        let entries = self.collect_entries(b"", |_| true)?;
        let paths: Vec<PathBuf> = VALUE_SUFFIXES
            .iter()
            .map(|&s| index_file(&self.dir, self.kind, s))
            .collect();
        let stats = IndexStats::collect(
            self.kind,
            "Sorted list",
            files_size(paths.iter().map(PathBuf::as_path)),
            entries.into_iter().map(|e| (e.token, e.count)),
        );
        Ok(stats.to_string())
    }

    fn entries(&self, spec: &EntrySpec) -> Result<Vec<IndexEntry>> {
        match spec {
            EntrySpec::All => self.collect_entries(b"", |_| true),
            EntrySpec::Prefix(prefix) => self.collect_entries(prefix, |t| t.starts_with(prefix)),
            EntrySpec::Range { min, max } => self.collect_entries(min, |t| t <= max.as_slice()),
        }
    }

    fn lookup(&self, token: &IndexToken) -> Result<IndexIterator> {
        match token {
            IndexToken::Exact(t) => self.exact(t),
            IndexToken::NumericRange { min, max } => self.numeric_range(*min, *max),
            IndexToken::StringRange {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => self.string_range(min, *min_inclusive, max, *max_inclusive),
            IndexToken::FullText { .. } => Ok(IndexIterator::empty()),
        }
    }

    fn approx_count(&self, token: &IndexToken) -> Result<u32> {
        match token {
            IndexToken::Exact(t) if t.len() > self.max_token_len => Ok(u32::MAX),
            IndexToken::Exact(t) if t.is_empty() => Ok(0),
            IndexToken::Exact(t) => Ok(self.find(t)?.map(|p| p.size).unwrap_or(0)),
            IndexToken::NumericRange { .. } | IndexToken::StringRange { .. } => {
                Ok((self.data.total_size() / 10).max(1))
            }
            IndexToken::FullText { .. } => Ok(u32::MAX),
        }
    }

    fn close(&mut self) {
        self.files = None;
        self.cache.clear();
    }
}

/// Digit count of `min` and `max` if both are non-negative integers of the
/// same length. Only then can a numeric range scan stop at the first
/// canonical integer of that length above `max`.
fn integer_width(min: f64, max: f64) -> Option<usize> {
    if min < 0.0 || min.fract() != 0.0 || max.fract() != 0.0 || max >= 1e18 {
        return None;
    }
    let (a, b) = (digits(min as u64), digits(max as u64));
    (a == b).then_some(a)
}

fn digits(mut n: u64) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// Value of `token` if it is exactly `width` digits without a leading zero
fn canonical_integer(token: &[u8], width: usize) -> Option<u64> {
    if token.len() != width || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if width > 1 && token[0] == b'0' {
        return None;
    }
    Some(token.iter().fold(0u64, |acc, &d| acc * 10 + (d - b'0') as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_width() {
        assert_eq!(integer_width(10.0, 99.0), Some(2));
        assert_eq!(integer_width(0.0, 9.0), Some(1));
        assert_eq!(integer_width(5.0, 50.0), None);
        assert_eq!(integer_width(-1.0, 5.0), None);
        assert_eq!(integer_width(1.5, 5.0), None);
    }

    #[test]
    fn test_canonical_integer() {
        assert_eq!(canonical_integer(b"42", 2), Some(42));
        assert_eq!(canonical_integer(b"042", 3), None);
        assert_eq!(canonical_integer(b"0", 1), Some(0));
        assert_eq!(canonical_integer(b"4.2", 3), None);
    }
}
