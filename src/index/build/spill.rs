//! Spill files: a sorted run of the accumulator written to disk when memory
//! gets tight.
//!
//! ```text
//! per entry: varnum(token len) token varnum(n) n * (varnum(pre delta) [varnum(pos)])
//! ```
//!
//! Position deltas restart at every entry; the ordinal is only present for
//! full-text runs.

use crate::data::Pre;
use crate::error::{IndexError, Result};
use crate::index::build::{IndexSink, SinkSummary};
use crate::index::postings::Occurrence;
use crate::index::types::{IndexKind, SPILL_EXT};
use crate::utils::encoding::{decode_varnum, encode_varnum};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Path of spill file `n` of `kind`
pub fn spill_path(dir: &Path, kind: IndexKind, n: usize) -> PathBuf {
    dir.join(format!("{}{}.{}", kind.prefix(), n, SPILL_EXT))
}

/// Spill files of `kind` currently lying in `dir`
pub fn spill_files(dir: &Path, kind: IndexKind) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.strip_prefix(kind.prefix())
                .and_then(|rest| rest.strip_suffix(SPILL_EXT))
                .and_then(|rest| rest.strip_suffix('.'))
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect()
}

/// Writes token-sorted entries to a spill file; also the sink of
/// intermediate merge passes
pub struct SpillWriter {
    out: BufWriter<File>,
    buf: Vec<u8>,
    with_pos: bool,
    entries: u32,
    written: u64,
}

impl SpillWriter {
    pub fn create(path: &Path, with_pos: bool) -> Result<Self> {
        Ok(Self {
            out: BufWriter::with_capacity(1 << 20, File::create(path)?),
            buf: Vec::with_capacity(4096),
            with_pos,
            entries: 0,
            written: 0,
        })
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl IndexSink for SpillWriter {
    fn write_entry(&mut self, token: &[u8], occurrences: &[Occurrence]) -> Result<()> {
        self.buf.clear();
        encode_varnum(token.len() as u32, &mut self.buf);
        self.buf.extend_from_slice(token);
        encode_varnum(occurrences.len() as u32, &mut self.buf);
        let mut prev = 0;
        for &(pre, pos) in occurrences {
            encode_varnum(pre - prev, &mut self.buf);
            prev = pre;
            if self.with_pos {
                encode_varnum(pos, &mut self.buf);
            }
        }
        self.out.write_all(&self.buf)?;
        self.written += self.buf.len() as u64;
        self.entries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkSummary> {
        self.out.flush()?;
        Ok(SinkSummary {
            entries: self.entries,
            scores: None,
        })
    }
}

/// Write token-sorted `entries` to `path`; returns the bytes written
pub fn write_spill(path: &Path, entries: &[(Box<[u8]>, Vec<Occurrence>)], with_pos: bool) -> Result<u64> {
    let mut writer = SpillWriter::create(path, with_pos)?;
    for (token, occurrences) in entries {
        writer.write_entry(token, occurrences)?;
    }
    writer.finish()?;
    Ok(writer.written())
}

/// Streaming reader over one spill file, positioned on its current entry
pub struct SpillCursor {
    reader: BufReader<File>,
    path: PathBuf,
    with_pos: bool,
    token: Vec<u8>,
    occurrences: Vec<Occurrence>,
    done: bool,
}

impl SpillCursor {
    pub fn open(path: &Path, with_pos: bool) -> Result<Self> {
        let mut cursor = Self {
            reader: BufReader::with_capacity(1 << 16, File::open(path)?),
            path: path.to_path_buf(),
            with_pos,
            token: Vec::new(),
            occurrences: Vec::new(),
            done: false,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Move to the next entry; false once the file is exhausted
    pub fn advance(&mut self) -> Result<bool> {
        let Some(len) = self.next_varnum(true)? else {
            self.done = true;
            self.token.clear();
            self.occurrences.clear();
            return Ok(false);
        };
        self.token.resize(len as usize, 0);
        self.reader.read_exact(&mut self.token)?;

        let n = self.require()?;
        self.occurrences.clear();
        self.occurrences.reserve(n as usize);
        let mut pre: Pre = 0;
        for _ in 0..n {
            pre = pre
                .checked_add(self.require()?)
                .ok_or_else(|| IndexError::malformed(format!("{}: position overflow", self.path.display())))?;
            let pos = if self.with_pos { self.require()? } else { 0 };
            self.occurrences.push((pre, pos));
        }
        Ok(true)
    }

    fn require(&mut self) -> Result<u32> {
        self.next_varnum(false)?
            .ok_or_else(|| IndexError::truncated("spill entry"))
    }

    /// Next VarNum of the stream; `None` at end of file if `eof_ok`
    fn next_varnum(&mut self, eof_ok: bool) -> Result<Option<u32>> {
        let mut raw = [0u8; 5];
        match self.reader.read_exact(&mut raw[..1]) {
            Ok(()) => {}
            Err(e) if eof_ok && e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let width = match raw[0] >> 6 {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => 5,
        };
        self.reader.read_exact(&mut raw[1..width])?;
        let (value, _) = decode_varnum(&raw[..width])?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(token: &str, occ: &[Occurrence]) -> (Box<[u8]>, Vec<Occurrence>) {
        (token.as_bytes().into(), occ.to_vec())
    }

    #[test]
    fn test_spill_cursor_reads_back() {
        let dir = tempdir().unwrap();
        let path = spill_path(dir.path(), IndexKind::FullText, 0);
        let entries = vec![
            entry("alpha", &[(3, 0), (3, 4), (70_000, 1)]),
            entry("beta", &[(9, 200)]),
        ];
        let bytes = write_spill(&path, &entries, true).unwrap();
        assert_eq!(bytes, std::fs::metadata(&path).unwrap().len());

        let mut cursor = SpillCursor::open(&path, true).unwrap();
        assert_eq!(cursor.token(), b"alpha");
        assert_eq!(cursor.occurrences(), &[(3, 0), (3, 4), (70_000, 1)]);
        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.token(), b"beta");
        assert_eq!(cursor.occurrences(), &[(9, 200)]);
        assert!(!cursor.advance().unwrap());
        assert!(cursor.is_done());
    }

    #[test]
    fn test_truncated_spill() {
        let dir = tempdir().unwrap();
        let path = spill_path(dir.path(), IndexKind::Text, 1);
        write_spill(&path, &[entry("value", &[(1, 0), (2, 0)])], false).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
        assert!(SpillCursor::open(&path, false).is_err());
    }

    #[test]
    fn test_spill_files() {
        let dir = tempdir().unwrap();
        for name in ["txt0.spill", "txt12.spill", "atv0.spill", "txtl", "txtx.spill"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let mut found = spill_files(dir.path(), IndexKind::Text);
        found.sort();
        assert_eq!(
            found,
            vec![dir.path().join("txt0.spill"), dir.path().join("txt12.spill")]
        );
    }
}
