use super::{search, TrieIndex, CHILD_WIDTH, TAIL_WIDTH};
use crate::error::{IndexError, Result};
use crate::index::fulltext::{FtStructure, FullTextIndex};
use crate::index::postings::Posting;
use crate::index::stats::files_size;
use crate::index::types::{index_file, FtLayout, IndexKind, IndexMeta};
use crate::index::wildcard::WildcardPattern;
use crate::storage::MappedFile;
use std::path::{Path, PathBuf};

/// A decoded view of one node record
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub label: &'a [u8],
    children: &'a [u8],
    pub size: u32,
    pub pointer: u64,
}

impl<'a> NodeView<'a> {
    fn parse(record: &'a [u8]) -> Result<Self> {
        let (&len, rest) = record
            .split_first()
            .ok_or_else(|| IndexError::malformed("empty trie node"))?;
        let len = len as usize;
        if rest.len() < len + TAIL_WIDTH || (rest.len() - len - TAIL_WIDTH) % CHILD_WIDTH != 0 {
            return Err(IndexError::malformed(format!(
                "trie node of {} bytes with label of {}",
                record.len(),
                len
            )));
        }
        let (label, rest) = rest.split_at(len);
        let (children, tail) = rest.split_at(rest.len() - TAIL_WIDTH);
        let size = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let pointer = tail[4..].iter().fold(0u64, |acc, &b| acc << 8 | b as u64);
        Ok(Self {
            label,
            children,
            size,
            pointer,
        })
    }

    pub fn child_count(&self) -> usize {
        self.children.len() / CHILD_WIDTH
    }

    /// Node id and first label byte of child `i`
    pub fn child(&self, i: usize) -> (u32, u8) {
        let c = &self.children[i * CHILD_WIDTH..(i + 1) * CHILD_WIDTH];
        (u32::from_be_bytes([c[0], c[1], c[2], c[3]]), c[4])
    }

    /// Child whose label starts with `byte`
    pub fn find_child(&self, byte: u8) -> Option<u32> {
        let (mut lo, mut hi) = (0, self.child_count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (id, first) = self.child(mid);
            match first.cmp(&byte) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(id),
            }
        }
        None
    }

    /// Posting of the token ending here, if any
    pub fn posting(&self) -> Option<Posting> {
        (self.size > 0).then_some(Posting {
            size: self.size,
            pointer: self.pointer,
        })
    }
}

/// The mapped files of a trie index
pub struct TrieFiles {
    dir: PathBuf,
    nodes: MappedFile,
    blob: MappedFile,
    offsets: MappedFile,
    count: u32,
}

impl TrieFiles {
    pub fn open(dir: &Path) -> Result<Self> {
        let nodes = MappedFile::open(&index_file(dir, IndexKind::FullText, 'a'))?;
        let blob = MappedFile::open(&index_file(dir, IndexKind::FullText, 'b'))?;
        let offsets = MappedFile::open(&index_file(dir, IndexKind::FullText, 'c'))?;

        if offsets.len() < 8 || offsets.len() % 4 != 0 {
            return Err(IndexError::malformed(format!(
                "{} holds {} bytes",
                offsets.path().display(),
                offsets.len()
            )));
        }
        let count = (offsets.len() / 4 - 1) as u32;
        if offsets.read_fixed(count as usize * 4, 4)? as usize != nodes.len() {
            return Err(IndexError::malformed("trie offsets do not cover the node file"));
        }
        log::debug!(
            "Opened trie ({} nodes, {} node bytes, {} list bytes)",
            count,
            nodes.len(),
            blob.len()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            nodes,
            blob,
            offsets,
            count,
        })
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> u32 {
        self.count
    }

    pub fn node(&self, id: u32) -> Result<NodeView<'_>> {
        if id >= self.count {
            return Err(IndexError::malformed(format!("trie node {} of {}", id, self.count)));
        }
        let start = self.offsets.read_fixed(id as usize * 4, 4)? as usize;
        let end = self.offsets.read_fixed(id as usize * 4 + 4, 4)? as usize;
        if end < start {
            return Err(IndexError::malformed(format!("trie node {} has negative length", id)));
        }
        NodeView::parse(self.nodes.slice(start, end - start)?)
    }

    pub fn root(&self) -> Result<NodeView<'_>> {
        self.node(0)
    }

    /// Node reached by walking `prefix` from the root, with the bytes of the
    /// path to it. The path may extend past `prefix` inside the last label.
    fn descend(&self, prefix: &[u8]) -> Result<Option<(NodeView<'_>, Vec<u8>)>> {
        let mut node = self.root()?;
        let mut path = Vec::with_capacity(prefix.len());
        let mut rest = prefix;
        while !rest.is_empty() {
            let Some(id) = node.find_child(rest[0]) else {
                return Ok(None);
            };
            let child = self.node(id)?;
            let n = child.label.len().min(rest.len());
            if child.label[..n] != rest[..n] {
                return Ok(None);
            }
            path.extend_from_slice(child.label);
            rest = &rest[n..];
            node = child;
        }
        Ok(Some((node, path)))
    }

    fn collect(&self, node: NodeView<'_>, path: &mut Vec<u8>, out: &mut Vec<(Vec<u8>, Posting)>) -> Result<()> {
        if let Some(posting) = node.posting() {
            out.push((path.clone(), posting));
        }
        for i in 0..node.child_count() {
            let child = self.node(node.child(i).0)?;
            path.extend_from_slice(child.label);
            self.collect(child, path, out)?;
            path.truncate(path.len() - child.label.len());
        }
        Ok(())
    }
}

impl FtStructure for TrieFiles {
    fn name(&self) -> &'static str {
        "Trie"
    }

    fn exact(&self, token: &[u8]) -> Result<Option<Posting>> {
        match self.descend(token)? {
            Some((node, path)) if path.len() == token.len() => Ok(node.posting()),
            _ => Ok(None),
        }
    }

    fn wildcard(&self, pattern: &WildcardPattern, out: &mut Vec<Posting>) -> Result<()> {
        search::wildcard(self, pattern, out)
    }

    fn fuzzy(&self, token: &[u8], max_errors: u32, out: &mut Vec<Posting>) -> Result<()> {
        search::fuzzy(self, token, max_errors, out)
    }

    fn tokens(&self, prefix: &[u8], out: &mut Vec<(Vec<u8>, Posting)>) -> Result<()> {
        if let Some((node, mut path)) = self.descend(prefix)? {
            self.collect(node, &mut path, out)?;
        }
        Ok(())
    }

    fn blob(&self) -> &MappedFile {
        &self.blob
    }

    fn disk_size(&self) -> u64 {
        let paths: Vec<PathBuf> = FtLayout::Trie
            .suffixes()
            .iter()
            .map(|&s| index_file(&self.dir, IndexKind::FullText, s))
            .collect();
        files_size(paths.iter().map(PathBuf::as_path))
    }
}

impl TrieIndex {
    pub fn open(dir: &Path, meta: &IndexMeta, total_size: u32) -> Result<Self> {
        Ok(FullTextIndex::new(TrieFiles::open(dir)?, meta, total_size))
    }
}
