use crate::error::{IndexError, Result};
use crate::index::build::{IndexSink, SinkSummary};
use crate::index::fulltext::FtBlobWriter;
use crate::index::postings::{Occurrence, Posting};
use crate::index::scoring::UnitStats;
use crate::index::types::{index_file, pending_file, IndexKind};
use crate::utils::encoding::{put_fixed, MAX_POINTER};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
struct BuildNode {
    label: Vec<u8>,
    /// Sorted by first label byte
    children: Vec<usize>,
    posting: Option<Posting>,
}

/// Collects the token stream of a full-text build into an in-memory radix
/// trie and writes it in pre-order once all tokens are known. Position
/// lists stream straight to the blob file.
pub struct TrieWriter {
    node_path: PathBuf,
    offset_path: PathBuf,
    blob: FtBlobWriter,
    nodes: Vec<BuildNode>,
    entries: u32,
}

impl TrieWriter {
    pub fn create(dir: &Path, stats: Option<UnitStats>) -> Result<Self> {
        let blob_path = pending_file(&index_file(dir, IndexKind::FullText, 'b'));
        Ok(Self {
            node_path: pending_file(&index_file(dir, IndexKind::FullText, 'a')),
            offset_path: pending_file(&index_file(dir, IndexKind::FullText, 'c')),
            blob: FtBlobWriter::create(&blob_path, stats)?,
            nodes: vec![BuildNode::default()],
            entries: 0,
        })
    }

    fn push(&mut self, node: BuildNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn insert(&mut self, token: &[u8], posting: Posting) {
        let mut node = 0;
        let mut rest = token;
        loop {
            if rest.is_empty() {
                self.nodes[node].posting = Some(posting);
                return;
            }
            let found = self.nodes[node]
                .children
                .binary_search_by(|&c| self.nodes[c].label[0].cmp(&rest[0]));
            match found {
                Err(at) => {
                    let leaf = self.push(BuildNode {
                        label: rest.to_vec(),
                        children: Vec::new(),
                        posting: Some(posting),
                    });
                    self.nodes[node].children.insert(at, leaf);
                    return;
                }
                Ok(i) => {
                    let child = self.nodes[node].children[i];
                    let common = common_prefix(&self.nodes[child].label, rest);
                    if common < self.nodes[child].label.len() {
                        let label = self.nodes[child].label.split_off(common);
                        let tail = BuildNode {
                            label,
                            children: std::mem::take(&mut self.nodes[child].children),
                            posting: self.nodes[child].posting.take(),
                        };
                        let tail = self.push(tail);
                        self.nodes[child].children.push(tail);
                    }
                    node = child;
                    rest = &rest[common..];
                }
            }
        }
    }

    /// Node arena indexes in pre-order
    fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.nodes[i].children.iter().rev());
        }
        order
    }

    fn write_nodes(&self) -> Result<()> {
        let order = self.pre_order();
        let mut ids = vec![0u32; self.nodes.len()];
        for (id, &i) in order.iter().enumerate() {
            ids[i] = id as u32;
        }

        let mut nodes = BufWriter::with_capacity(65536, File::create(&self.node_path)?);
        let mut offsets = BufWriter::with_capacity(65536, File::create(&self.offset_path)?);
        let mut record = Vec::with_capacity(64);
        let mut offset = 0u64;

        for &i in &order {
            let node = &self.nodes[i];
            let label_len = u8::try_from(node.label.len())
                .map_err(|_| IndexError::malformed(format!("trie label of {} bytes", node.label.len())))?;

            record.clear();
            record.push(label_len);
            record.extend_from_slice(&node.label);
            for &c in &node.children {
                put_fixed(&mut record, ids[c] as u64, 4);
                record.push(self.nodes[c].label[0]);
            }
            let posting = node.posting.unwrap_or(Posting { size: 0, pointer: 0 });
            put_fixed(&mut record, posting.size as u64, 4);
            put_fixed(&mut record, posting.pointer, 5);

            offsets.write_all(&(offset as u32).to_be_bytes())?;
            nodes.write_all(&record)?;
            offset += record.len() as u64;
        }
        if offset > u32::MAX as u64 {
            return Err(IndexError::malformed("trie node file exceeds 4 GiB"));
        }
        offsets.write_all(&(offset as u32).to_be_bytes())?;

        nodes.flush()?;
        offsets.flush()?;
        nodes.get_ref().sync_all()?;
        offsets.get_ref().sync_all()?;
        log::debug!("Wrote trie of {} nodes ({} bytes)", order.len(), offset);
        Ok(())
    }
}

impl IndexSink for TrieWriter {
    fn write_entry(&mut self, token: &[u8], occurrences: &[Occurrence]) -> Result<()> {
        let posting = self.blob.write(occurrences)?;
        if posting.pointer > MAX_POINTER {
            return Err(IndexError::malformed("full-text blob exceeds pointer range"));
        }
        self.insert(token, posting);
        self.entries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkSummary> {
        let scores = self.blob.finish()?;
        self.write_nodes()?;
        Ok(SinkSummary {
            entries: self.entries,
            scores,
        })
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn labels(writer: &TrieWriter) -> Vec<String> {
        writer
            .pre_order()
            .into_iter()
            .map(|i| String::from_utf8_lossy(&writer.nodes[i].label).into_owned())
            .collect()
    }

    #[test]
    fn test_insert_splits_labels() {
        let dir = tempdir().unwrap();
        let mut writer = TrieWriter::create(dir.path(), None).unwrap();
        for token in ["team", "tea", "ten", "a"] {
            writer.write_entry(token.as_bytes(), &[(0, 0)]).unwrap();
        }
        // root, a, te, a, m, n
        assert_eq!(labels(&writer), vec!["", "a", "te", "a", "m", "n"]);
        let tea = writer.pre_order()[3];
        assert!(writer.nodes[tea].posting.is_some());
        let te = writer.pre_order()[2];
        assert!(writer.nodes[te].posting.is_none());
    }

    #[test]
    fn test_finish_writes_offsets() {
        let dir = tempdir().unwrap();
        let mut writer = TrieWriter::create(dir.path(), None).unwrap();
        writer.write_entry(b"ab", &[(1, 0)]).unwrap();
        writer.write_entry(b"ac", &[(2, 0)]).unwrap();
        assert_eq!(writer.finish().unwrap().entries, 2);

        let offsets = std::fs::read(dir.path().join("ftxc.new")).unwrap();
        let nodes = std::fs::read(dir.path().join("ftxa.new")).unwrap();
        // root, "a", "b", "c"
        assert_eq!(offsets.len(), 5 * 4);
        let last = u32::from_be_bytes([offsets[16], offsets[17], offsets[18], offsets[19]]);
        assert_eq!(last as usize, nodes.len());
        // Root: empty label, one child (id 1, 'a')
        assert_eq!(&nodes[..6], &[0, 0, 0, 0, 1, b'a']);
    }
}
