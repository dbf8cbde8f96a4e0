use super::record_width;
use crate::error::{IndexError, Result};
use crate::index::build::{IndexSink, SinkSummary};
use crate::index::fulltext::FtBlobWriter;
use crate::index::postings::Occurrence;
use crate::index::scoring::UnitStats;
use crate::index::types::{index_file, pending_file, IndexKind};
use crate::utils::encoding::{put_fixed, MAX_POINTER};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sorts the token stream of a full-text build into per-length buckets.
///
/// Tokens arrive in ascending order, so each bucket is filled already
/// sorted. Records are kept in memory until `finish`; position lists stream
/// to the blob file.
pub struct BucketWriter {
    dir_path: PathBuf,
    record_path: PathBuf,
    blob: FtBlobWriter,
    buckets: Vec<Vec<u8>>,
    counts: Vec<u32>,
    entries: u32,
}

impl BucketWriter {
    pub fn create(dir: &Path, max_len: usize, stats: Option<UnitStats>) -> Result<Self> {
        let blob_path = pending_file(&index_file(dir, IndexKind::FullText, 'z'));
        Ok(Self {
            dir_path: pending_file(&index_file(dir, IndexKind::FullText, 'x')),
            record_path: pending_file(&index_file(dir, IndexKind::FullText, 'y')),
            blob: FtBlobWriter::create(&blob_path, stats)?,
            buckets: vec![Vec::new(); max_len + 1],
            counts: vec![0; max_len + 1],
            entries: 0,
        })
    }
}

impl IndexSink for BucketWriter {
    fn write_entry(&mut self, token: &[u8], occurrences: &[Occurrence]) -> Result<()> {
        let len = token.len();
        if len >= self.buckets.len() {
            return Err(IndexError::malformed(format!("token of {} bytes exceeds the bucket range", len)));
        }
        let posting = self.blob.write(occurrences)?;
        if posting.pointer > MAX_POINTER {
            return Err(IndexError::malformed("full-text blob exceeds pointer range"));
        }

        let bucket = &mut self.buckets[len];
        bucket.extend_from_slice(token);
        put_fixed(bucket, posting.size as u64, 4);
        put_fixed(bucket, posting.pointer, 5);
        self.counts[len] += 1;
        self.entries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkSummary> {
        let scores = self.blob.finish()?;

        let mut slots = BufWriter::new(File::create(&self.dir_path)?);
        let mut records = BufWriter::with_capacity(65536, File::create(&self.record_path)?);
        let mut offset = 0u64;
        let mut slot = Vec::with_capacity(9);

        for (len, bucket) in self.buckets.iter().enumerate() {
            debug_assert_eq!(bucket.len(), self.counts[len] as usize * record_width(len));
            slot.clear();
            put_fixed(&mut slot, offset, 5);
            put_fixed(&mut slot, self.counts[len] as u64, 4);
            slots.write_all(&slot)?;
            records.write_all(bucket)?;
            offset += bucket.len() as u64;
        }

        slots.flush()?;
        records.flush()?;
        slots.get_ref().sync_all()?;
        records.get_ref().sync_all()?;
        log::debug!(
            "Wrote {} tokens in {} length buckets ({} record bytes)",
            self.entries,
            self.counts.iter().filter(|&&c| c > 0).count(),
            offset
        );
        Ok(SinkSummary {
            entries: self.entries,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encoding::get_fixed;
    use tempfile::tempdir;

    #[test]
    fn test_bucket_files() {
        let dir = tempdir().unwrap();
        let mut writer = BucketWriter::create(dir.path(), 4, None).unwrap();
        writer.write_entry(b"ab", &[(0, 0)]).unwrap();
        writer.write_entry(b"abc", &[(1, 0), (2, 0)]).unwrap();
        writer.write_entry(b"b", &[(3, 0)]).unwrap();
        writer.write_entry(b"bc", &[(4, 0)]).unwrap();
        assert_eq!(writer.finish().unwrap().entries, 4);

        let slots = std::fs::read(dir.path().join("ftxx.new")).unwrap();
        let records = std::fs::read(dir.path().join("ftxy.new")).unwrap();
        assert_eq!(slots.len(), 5 * 9);
        // Length 2 starts after the single 1-byte record and holds two tokens
        assert_eq!(get_fixed(&slots[18..], 5).unwrap(), 10);
        assert_eq!(get_fixed(&slots[23..], 4).unwrap(), 2);
        assert_eq!(&records[10..12], b"ab");
        assert_eq!(&records[21..23], b"bc");
        assert_eq!(&records[32..35], b"abc");
        assert_eq!(get_fixed(&records[35..], 4).unwrap(), 2);
    }

    #[test]
    fn test_rejects_long_token() {
        let dir = tempdir().unwrap();
        let mut writer = BucketWriter::create(dir.path(), 2, None).unwrap();
        assert!(writer.write_entry(b"abc", &[(0, 0)]).is_err());
    }
}
