//! K-way merge of spill files into an index sink.

use crate::error::Result;
use crate::index::build::spill::SpillCursor;
use crate::index::build::IndexSink;
use crate::index::postings::Occurrence;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;

/// Most spill files opened by one merge; larger builds merge in passes
pub const MERGE_FAN_IN: usize = 64;

/// Heap entry: current token of the cursor at `idx`
#[derive(Debug, PartialEq, Eq)]
struct MergeEntry {
    key: Vec<u8>,
    idx: usize,
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties go to the earlier spill
        other.key.cmp(&self.key).then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merge the spill files in `paths` (in spill order) and feed one entry per
/// distinct token to `sink`. Returns the number of entries written.
///
/// Spills are written in scan order, so concatenating the lists of all
/// cursors sharing a token in spill order keeps positions ascending.
pub fn merge_spills(paths: &[PathBuf], with_pos: bool, sink: &mut dyn IndexSink) -> Result<u32> {
    let mut cursors = paths
        .iter()
        .map(|p| SpillCursor::open(p, with_pos))
        .collect::<Result<Vec<_>>>()?;

    let mut heap = BinaryHeap::with_capacity(cursors.len());
    for (idx, cursor) in cursors.iter().enumerate() {
        if !cursor.is_done() {
            heap.push(MergeEntry {
                key: cursor.token().to_vec(),
                idx,
            });
        }
    }

    let mut group: Vec<usize> = Vec::with_capacity(cursors.len());
    let mut merged: Vec<Occurrence> = Vec::new();
    let mut entries = 0u32;

    while let Some(top) = heap.pop() {
        group.clear();
        group.push(top.idx);
        while let Some(next) = heap.peek() {
            if next.key != top.key {
                break;
            }
            group.push(next.idx);
            heap.pop();
        }
        group.sort_unstable();

        merged.clear();
        for &i in &group {
            merged.extend_from_slice(cursors[i].occurrences());
        }
        sink.write_entry(&top.key, &merged)?;
        entries += 1;

        for &i in &group {
            if cursors[i].advance()? {
                heap.push(MergeEntry {
                    key: cursors[i].token().to_vec(),
                    idx: i,
                });
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::spill::{spill_path, write_spill};
    use crate::index::build::SinkSummary;
    use crate::index::types::IndexKind;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Collect(Vec<(Vec<u8>, Vec<Occurrence>)>);

    impl IndexSink for Collect {
        fn write_entry(&mut self, token: &[u8], occurrences: &[Occurrence]) -> Result<()> {
            self.0.push((token.to_vec(), occurrences.to_vec()));
            Ok(())
        }

        fn finish(&mut self) -> Result<SinkSummary> {
            Ok(SinkSummary {
                entries: self.0.len() as u32,
                scores: None,
            })
        }
    }

    #[test]
    fn test_merge_groups_equal_tokens() {
        let dir = tempdir().unwrap();
        let runs: Vec<Vec<(Box<[u8]>, Vec<Occurrence>)>> = vec![
            vec![(b"a".as_slice().into(), vec![(0, 0)]), (b"c".as_slice().into(), vec![(1, 0)])],
            vec![(b"b".as_slice().into(), vec![(2, 0)]), (b"c".as_slice().into(), vec![(3, 0)])],
            vec![(b"c".as_slice().into(), vec![(5, 0)])],
        ];
        let mut paths = Vec::new();
        for (n, run) in runs.iter().enumerate() {
            let path = spill_path(dir.path(), IndexKind::Text, n);
            write_spill(&path, run, false).unwrap();
            paths.push(path);
        }

        let mut sink = Collect::default();
        assert_eq!(merge_spills(&paths, false, &mut sink).unwrap(), 3);
        assert_eq!(
            sink.0,
            vec![
                (b"a".to_vec(), vec![(0, 0)]),
                (b"b".to_vec(), vec![(2, 0)]),
                (b"c".to_vec(), vec![(1, 0), (3, 0), (5, 0)]),
            ]
        );
    }

    #[test]
    fn test_merge_empty_spill() {
        let dir = tempdir().unwrap();
        let path = spill_path(dir.path(), IndexKind::Text, 0);
        write_spill(&path, &[], false).unwrap();
        let mut sink = Collect::default();
        assert_eq!(merge_spills(&[path], false, &mut sink).unwrap(), 0);
        assert!(sink.0.is_empty());
    }
}
