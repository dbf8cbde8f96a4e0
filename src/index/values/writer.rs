use crate::data::Pre;
use crate::error::Result;
use crate::index::build::{IndexSink, SinkSummary};
use crate::index::postings::{encode_value_list, Occurrence};
use crate::index::types::{index_file, pending_file, IndexKind};
use crate::storage::RandomAccessStore;
use crate::utils::encoding::put_fixed;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes the list and reference files of a value index from the merged,
/// token-sorted entry stream
pub struct ValueWriter {
    list_path: PathBuf,
    list: BufWriter<File>,
    refs: BufWriter<File>,
    offset: u64,
    entries: u32,
    buf: Vec<u8>,
    pres: Vec<Pre>,
}

impl ValueWriter {
    /// Create the pending files of the `kind` index in `dir`
    pub fn new(dir: &Path, kind: IndexKind) -> Result<Self> {
        let list_path = pending_file(&index_file(dir, kind, 'l'));
        let ref_path = pending_file(&index_file(dir, kind, 'r'));

        let mut list = BufWriter::with_capacity(65536, File::create(&list_path)?);
        // Entry count, patched in finish()
        list.write_all(&[0; 4])?;
        let refs = BufWriter::with_capacity(65536, File::create(&ref_path)?);

        Ok(Self {
            list_path,
            list,
            refs,
            offset: 4,
            entries: 0,
            buf: Vec::with_capacity(256),
            pres: Vec::new(),
        })
    }
}

impl IndexSink for ValueWriter {
    fn write_entry(&mut self, _token: &[u8], occurrences: &[Occurrence]) -> Result<()> {
        self.pres.clear();
        self.pres.extend(occurrences.iter().map(|o| o.0));
        self.pres.dedup();

        self.buf.clear();
        encode_value_list(&self.pres, &mut self.buf);
        self.list.write_all(&self.buf)?;

        let mut pointer = Vec::with_capacity(5);
        put_fixed(&mut pointer, self.offset, 5);
        self.refs.write_all(&pointer)?;

        self.offset += self.buf.len() as u64;
        self.entries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkSummary> {
        self.list.flush()?;
        self.refs.flush()?;
        self.list.get_ref().sync_all()?;
        self.refs.get_ref().sync_all()?;

        let mut store = RandomAccessStore::open(&self.list_path)?;
        store.write_fixed(0, self.entries as u64, 4)?;
        store.close()?;

        Ok(SinkSummary {
            entries: self.entries,
            scores: None,
        })
    }
}
