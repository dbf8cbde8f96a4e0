//! Stable id to current position translation.
//!
//! Nodes keep their id for life while their position shifts with every
//! insert and delete in front of them. The map records updates as runs of
//! positions holding consecutive ids:
//!
//! ```text
//! position  0 1 2 3 | 4   5   6   | 7 8 9
//! id        0 1 2 3 | 100 101 102 | 4 5 6
//!           identity  run(pre=4,    run(pre=7,
//!                     ids 100..=102) ids 4..=6)
//! ```
//!
//! Runs cover the table from the first modified position to its end and are
//! kept sorted by position; positions in front of the first run hold their
//! own id. The number of runs grows with the number of updates, not with the
//! number of nodes they touch.

use crate::data::{Id, Pre};
use crate::error::{IndexError, Result};
use crate::storage::RandomAccessStore;
use crate::utils::encoding::{zigzag_decode, zigzag_encode};
use roaring::RoaringBitmap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    /// First position of the run
    pre: Pre,
    /// First and last id (inclusive)
    fid: Id,
    nid: Id,
    /// Position `fid` held when the run was recorded
    origin: Pre,
}

impl Run {
    #[inline]
    fn len(&self) -> u32 {
        self.nid - self.fid + 1
    }

    #[inline]
    fn end(&self) -> Pre {
        self.pre + self.len()
    }

    #[inline]
    fn increment(&self) -> i32 {
        self.pre.wrapping_sub(self.fid) as i32
    }

    #[inline]
    fn is_identity(&self) -> bool {
        self.pre == self.fid
    }
}

/// Interval list translating ids to positions after updates.
#[derive(Debug, Clone)]
pub struct IdPositionMap {
    /// Last id of the identity table while no runs exist, -1 for an empty table
    base_id: i64,
    runs: Vec<Run>,
    /// Run indexes sorted by first id
    by_id: Vec<usize>,
}

impl IdPositionMap {
    /// Map for a fresh table holding ids `0..=base_id` at their own positions
    pub fn new(base_id: Id) -> Self {
        Self {
            base_id: base_id as i64,
            runs: Vec::new(),
            by_id: Vec::new(),
        }
    }

    /// Map for a table without nodes
    pub fn empty() -> Self {
        Self {
            base_id: -1,
            runs: Vec::new(),
            by_id: Vec::new(),
        }
    }

    /// Last id of the untouched table, `None` if the table is empty.
    /// Only meaningful while [`runs`](Self::runs) is zero.
    pub fn base_id(&self) -> Option<Id> {
        (self.base_id >= 0).then_some(self.base_id as Id)
    }

    /// Number of recorded runs
    pub fn runs(&self) -> usize {
        self.runs.len()
    }

    /// Number of positions in the table
    pub fn table_len(&self) -> u32 {
        match self.runs.last() {
            Some(run) => run.end(),
            None => (self.base_id + 1) as u32,
        }
    }

    /// Current position of `id`, or `None` if the id is not in the table
    pub fn position_of(&self, id: Id) -> Option<Pre> {
        let Some(first) = self.runs.first() else {
            return ((id as i64) <= self.base_id).then_some(id);
        };
        if id < first.pre {
            return Some(id);
        }
        let k = self.by_id.partition_point(|&i| self.runs[i].fid <= id);
        if k == 0 {
            return None;
        }
        let run = &self.runs[self.by_id[k - 1]];
        (id <= run.nid).then(|| run.pre + (id - run.fid))
    }

    /// Positions of all `ids` present in the table, ascending and deduplicated
    pub fn positions_of(&self, ids: &[Id]) -> Vec<Pre> {
        let bitmap: RoaringBitmap = ids.iter().filter_map(|&id| self.position_of(id)).collect();
        bitmap.into_iter().collect()
    }

    /// Record that ids `first..first + count` were inserted at position `at`
    pub fn record_insert(&mut self, at: Pre, first: Id, count: u32) {
        if count == 0 {
            return;
        }
        if self.runs.is_empty() && at as i64 == self.base_id + 1 && first as i64 == self.base_id + 1 {
            self.base_id += count as i64;
            return;
        }

        let at = at.min(self.table_len());
        self.cover_from(at);
        let i = self.split_at(at);
        self.runs.insert(
            i,
            Run {
                pre: at,
                fid: first,
                nid: first + count - 1,
                origin: at,
            },
        );
        for run in &mut self.runs[i + 1..] {
            run.pre += count;
        }

        self.coalesce(i);
        if i > 0 {
            self.coalesce(i - 1);
        }
        self.drop_identity_prefix();
        self.reindex();
    }

    /// Record that `count` nodes starting at position `at` were deleted;
    /// `first` is the id that was stored at `at`
    pub fn record_delete(&mut self, at: Pre, first: Id, count: u32) {
        let len = self.table_len();
        let at = at.min(len);
        let end = at.saturating_add(count).min(len);
        let count = end - at;
        if count == 0 {
            return;
        }
        debug_assert_eq!(self.id_at(at), Some(first), "delete does not start at id {first}");

        if self.runs.is_empty() && at == first && (first + count - 1) as i64 == self.base_id {
            self.base_id -= count as i64;
            return;
        }

        self.cover_from(at);
        let i = self.split_at(at);
        let j = self.split_at(end);
        self.runs.drain(i..j);
        for run in &mut self.runs[i..] {
            run.pre -= count;
        }

        if self.runs.is_empty() {
            self.base_id = at as i64 - 1;
        } else {
            if i > 0 {
                self.coalesce(i - 1);
            }
            self.drop_identity_prefix();
        }
        self.reindex();
    }

    /// Id stored at position `pre`
    pub fn id_at(&self, pre: Pre) -> Option<Id> {
        if pre >= self.table_len() {
            return None;
        }
        match self.runs.first() {
            Some(first) if pre >= first.pre => {
                let i = self.runs.partition_point(|r| r.pre <= pre) - 1;
                let run = &self.runs[i];
                Some(run.fid + (pre - run.pre))
            }
            _ => Some(pre),
        }
    }

    /// Make runs cover every position from `at` to the table end
    fn cover_from(&mut self, at: Pre) {
        let start = match self.runs.first() {
            Some(run) => run.pre,
            None => (self.base_id + 1) as Pre,
        };
        if at < start {
            self.runs.insert(
                0,
                Run {
                    pre: at,
                    fid: at,
                    nid: start - 1,
                    origin: at,
                },
            );
        }
    }

    /// Ensure a run starts at `pre`; returns its index, or the run count
    /// when `pre` is the table end
    fn split_at(&mut self, pre: Pre) -> usize {
        let i = self.runs.partition_point(|r| r.pre <= pre);
        if i == 0 {
            return 0;
        }
        let run = self.runs[i - 1];
        if run.pre == pre {
            return i - 1;
        }
        if pre >= run.end() {
            return i;
        }
        let k = pre - run.pre;
        self.runs[i - 1].nid = run.fid + k - 1;
        self.runs.insert(
            i,
            Run {
                pre,
                fid: run.fid + k,
                nid: run.nid,
                origin: run.origin + k,
            },
        );
        i
    }

    /// Merge runs `i` and `i + 1` if their ids are contiguous
    fn coalesce(&mut self, i: usize) {
        if i + 1 < self.runs.len() && self.runs[i].nid.checked_add(1) == Some(self.runs[i + 1].fid) {
            self.runs[i].nid = self.runs[i + 1].nid;
            self.runs.remove(i + 1);
        }
    }

    fn drop_identity_prefix(&mut self) {
        let n = self.runs.iter().take_while(|r| r.is_identity()).count();
        if n == 0 {
            return;
        }
        if n == self.runs.len() {
            self.base_id = self.runs[n - 1].nid as i64;
            self.runs.clear();
        } else {
            self.runs.drain(..n);
        }
    }

    fn reindex(&mut self) {
        self.by_id = (0..self.runs.len()).collect();
        let runs = &self.runs;
        self.by_id.sort_unstable_by_key(|&i| runs[i].fid);
    }

    /// Persist the map, replacing the file contents
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut store = RandomAccessStore::open(path)?;
        store.truncate(0)?;
        // Shifted by one so an empty table stays unsigned
        store.append_varnum((self.base_id + 1) as u32)?;
        store.append_varnum(self.runs.len() as u32)?;
        for run in &self.runs {
            store.append_varnum(run.pre)?;
        }
        for run in &self.runs {
            store.append_varnum(run.fid)?;
        }
        for run in &self.runs {
            store.append_varnum(run.nid)?;
        }
        for run in &self.runs {
            store.append_varnum(zigzag_encode(run.increment()))?;
        }
        for run in &self.runs {
            store.append_varnum(run.origin)?;
        }
        store.close()
    }

    /// Load a map written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = RandomAccessStore::open_read(path)?;
        let file_len = store.length()?;
        let base_id = store.read_varnum(0)? as i64 - 1;
        let rows = store.next_varnum()? as usize;
        // Every row takes at least five bytes
        if rows as u64 * 5 > file_len {
            return Err(IndexError::malformed(format!(
                "id map declares {} rows in {} bytes",
                rows, file_len
            )));
        }

        let mut columns: [Vec<u32>; 5] = Default::default();
        for column in columns.iter_mut() {
            column.reserve(rows);
            for _ in 0..rows {
                column.push(store.next_varnum()?);
            }
        }
        store.close()?;

        let [pres, fids, nids, incs, origins] = columns;
        let mut runs = Vec::with_capacity(rows);
        for i in 0..rows {
            if fids[i] > nids[i] {
                return Err(IndexError::malformed(format!("id map row {} has inverted ids", i)));
            }
            let run = Run {
                pre: pres[i],
                fid: fids[i],
                nid: nids[i],
                origin: origins[i],
            };
            if run.increment() != zigzag_decode(incs[i]) {
                return Err(IndexError::malformed(format!(
                    "id map row {} increment does not match its position",
                    i
                )));
            }
            if let Some(prev) = runs.last().map(|r: &Run| r.end()) {
                if prev != run.pre {
                    return Err(IndexError::malformed(format!(
                        "id map row {} does not continue the previous run",
                        i
                    )));
                }
            }
            runs.push(run);
        }

        let mut map = Self {
            base_id,
            runs,
            by_id: Vec::new(),
        };
        map.reindex();
        Ok(map)
    }
}
