//! Bounded-memory index builds.
//!
//! A build walks the table once, collecting occurrences per token in an
//! in-memory accumulator. The memory probe is consulted every
//! `memory_check_interval` tokens. The first breach shrinks the accumulator
//! and asks the probe to reclaim memory. A second breach in a row spills the
//! accumulator to a sorted run on disk, or fails the build when the index
//! cannot be split (full-text with scoring). At the end the runs are merged
//! into the index sink. Without runs, the in-memory batch goes to the sink
//! directly.
//!
//! Files are written under a `.new` suffix and only renamed into place, and
//! recorded in the metadata, once the sink has finished. A failed build
//! leaves the previous index untouched.

pub mod merge;
pub mod spill;

use crate::data::{Data, NodeKind, Pre};
use crate::error::{IndexError, Result};
use crate::index::postings::Occurrence;
use crate::index::scoring::UnitStats;
use crate::index::suffix_array::BucketWriter;
use crate::index::trie::TrieWriter;
use crate::index::types::{index_file, owned_files, pending_file, FtLayout, IndexConfig, IndexKind, IndexMeta, VALUE_SUFFIXES};
use crate::index::values::ValueWriter;
use crate::utils::progress::{build_bar, ProgressBar};
use crate::utils::{Lexer, MemoryPressureProbe, ProcessMemoryProbe};
use ahash::AHashMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a sink reports once all entries were written
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkSummary {
    /// Distinct tokens written
    pub entries: u32,
    /// Smallest and largest full-text score, if scored
    pub scores: Option<(f32, f32)>,
}

/// Receives the entries of a build in ascending token order
pub trait IndexSink: Send {
    fn write_entry(&mut self, token: &[u8], occurrences: &[Occurrence]) -> Result<()>;

    /// Flush all pending files
    fn finish(&mut self) -> Result<SinkSummary>;
}

/// Token to occurrence lists, with a running estimate of its heap size
#[derive(Default)]
struct Accumulator {
    map: AHashMap<Box<[u8]>, Vec<Occurrence>>,
    bytes: u64,
}

impl Accumulator {
    fn add(&mut self, token: &[u8], occurrence: Occurrence) {
        match self.map.get_mut(token) {
            Some(list) => list.push(occurrence),
            None => {
                self.bytes += token.len() as u64 + 48;
                self.map.insert(token.into(), vec![occurrence]);
            }
        }
        self.bytes += std::mem::size_of::<Occurrence>() as u64;
    }

    fn memory(&self) -> u64 {
        self.bytes
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn shrink(&mut self) {
        self.map.shrink_to_fit();
        for list in self.map.values_mut() {
            list.shrink_to_fit();
        }
    }

    /// Take all entries sorted by token
    fn drain_sorted(&mut self) -> Vec<(Box<[u8]>, Vec<Occurrence>)> {
        let mut entries: Vec<_> = self.map.drain().collect();
        entries.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
        self.map = AHashMap::new();
        self.bytes = 0;
        entries
    }
}

/// State of one index build; removes its spill files when dropped
struct BuildRun<'a> {
    build: &'a IndexBuild,
    kind: IndexKind,
    acc: Accumulator,
    spills: Vec<PathBuf>,
    /// Number of the next spill file name
    next_spill: usize,
    spillable: bool,
    with_pos: bool,
    merge_mode: bool,
    since_check: usize,
    overhead: u64,
    bar: Option<ProgressBar>,
}

impl<'a> BuildRun<'a> {
    fn new(build: &'a IndexBuild, kind: IndexKind, total: u32, spillable: bool) -> Self {
        Self {
            build,
            kind,
            acc: Accumulator::default(),
            spills: Vec::new(),
            next_spill: 0,
            spillable,
            with_pos: kind == IndexKind::FullText,
            merge_mode: false,
            since_check: 0,
            overhead: 0,
            bar: build_bar(build.progress, total as u64, kind.label()),
        }
    }

    /// Cancellation and progress, once per table position
    fn checkpoint(&mut self, pre: Pre) -> Result<()> {
        if pre % self.build.config.stop_check_interval == 0 && self.build.cancel.load(Ordering::Relaxed) {
            log::info!("{} build cancelled at position {}", self.kind.label(), pre);
            if let Some(bar) = &self.bar {
                bar.abandon();
            }
            return Err(IndexError::BuildCancelled);
        }
        if pre % 4096 == 0 {
            if let Some(bar) = &self.bar {
                bar.set_position(pre as u64);
            }
        }
        Ok(())
    }

    fn add(&mut self, token: &[u8], occurrence: Occurrence) -> Result<()> {
        self.acc.add(token, occurrence);
        self.since_check += 1;
        if self.since_check >= self.build.config.memory_check_interval {
            self.since_check = 0;
            self.check_memory()?;
        }
        Ok(())
    }

    fn check_memory(&mut self) -> Result<()> {
        let build = self.build;
        let probe = &build.probe;
        let used = self.acc.memory() + self.overhead;
        if !probe.under_pressure(used) {
            self.merge_mode = false;
            return Ok(());
        }
        if !self.merge_mode {
            log::debug!(
                "{}: memory above {} bytes, reclaiming ({} bytes accumulated)",
                self.kind.label(),
                probe.ceiling(),
                used
            );
            self.acc.shrink();
            probe.reclaim();
            self.merge_mode = true;
            return Ok(());
        }
        if !self.spillable {
            log::warn!(
                "{}: memory still above {} bytes and the index cannot be split",
                self.kind.label(),
                probe.ceiling()
            );
            return Err(IndexError::build_memory(format!(
                "{} needs more than {} bytes",
                self.kind.label(),
                probe.ceiling()
            )));
        }
        self.spill()?;
        probe.reclaim();
        self.merge_mode = false;
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        if self.acc.is_empty() {
            return Ok(());
        }
        let path = self.register_spill();
        let entries = self.acc.drain_sorted();
        let bytes = spill::write_spill(&path, &entries, self.with_pos)?;
        log::debug!(
            "{}: spill {} written ({} tokens, {} bytes)",
            self.kind.label(),
            self.next_spill - 1,
            entries.len(),
            bytes
        );
        Ok(())
    }

    /// Name a new spill file and register it for removal before anything
    /// is written to it
    fn register_spill(&mut self) -> PathBuf {
        let path = spill::spill_path(&self.build.dir, self.kind, self.next_spill);
        self.next_spill += 1;
        self.spills.push(path.clone());
        path
    }

    /// Merge consecutive batches of at most `MERGE_FAN_IN` spills into one
    /// spill each, keeping their order
    fn merge_pass(&mut self) -> Result<()> {
        let runs = self.spills.len();
        log::debug!("{}: merging {} spills in batches of {}", self.kind.label(), runs, merge::MERGE_FAN_IN);
        let mut start = 0;
        while start < runs {
            let end = (start + merge::MERGE_FAN_IN).min(runs);
            let path = self.register_spill();
            let mut writer = spill::SpillWriter::create(&path, self.with_pos)?;
            merge::merge_spills(&self.spills[start..end], self.with_pos, &mut writer)?;
            writer.finish()?;
            for done in &self.spills[start..end] {
                remove_if_exists(done)?;
            }
            start = end;
        }
        self.spills.drain(..runs);
        Ok(())
    }

    /// Feed everything collected to `sink`
    fn finish(mut self, sink: &mut dyn IndexSink) -> Result<SinkSummary> {
        if self.spills.is_empty() {
            for (token, occurrences) in self.acc.drain_sorted() {
                sink.write_entry(&token, &occurrences)?;
            }
        } else {
            self.spill()?;
            while self.spills.len() > merge::MERGE_FAN_IN {
                self.merge_pass()?;
            }
            log::debug!("{}: merging {} spills", self.kind.label(), self.spills.len());
            let entries = merge::merge_spills(&self.spills, self.with_pos, sink)?;
            log::debug!("{}: merged {} tokens", self.kind.label(), entries);
        }
        let summary = sink.finish()?;
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!("{} tokens", summary.entries));
        }
        Ok(summary)
    }
}

impl Drop for BuildRun<'_> {
    fn drop(&mut self) {
        for path in &self.spills {
            let _ = fs::remove_file(path);
        }
    }
}

/// Builds value and full-text indexes into an index directory.
///
/// ```no_run
/// use xmlidx::data::MemData;
/// use xmlidx::index::{IndexBuild, IndexConfig};
///
/// let data = MemData::texts(["apple", "banana", "apple"]);
/// let build = IndexBuild::new("db/index", IndexConfig::default())?;
/// build.build_value_indexes(&data)?;
/// build.build_fulltext(&data)?;
/// # Ok::<(), xmlidx::IndexError>(())
/// ```
pub struct IndexBuild {
    dir: PathBuf,
    config: IndexConfig,
    probe: Arc<dyn MemoryPressureProbe>,
    cancel: Arc<AtomicBool>,
    progress: bool,
}

impl IndexBuild {
    pub fn new(dir: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            probe: Arc::new(ProcessMemoryProbe::new(config.memory_ratio, config.memory_limit)),
            dir,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: false,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn MemoryPressureProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Flag polled at every `stop_check_interval` positions
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Build and install the text or attribute value index
    pub fn build_values(&self, data: &dyn Data, kind: IndexKind) -> Result<SinkSummary> {
        if kind == IndexKind::FullText {
            return self.build_fulltext(data);
        }
        let finals = value_files(&self.dir, kind);
        let summary = self
            .write_values(data, kind)
            .inspect_err(|e| self.discard(kind, &finals, e))?;
        self.install(&finals, |meta| {
            meta.set_available(kind, true, summary.entries);
            meta.set_config(kind, Some(self.config.clone()));
        })
        .inspect_err(|e| self.discard(kind, &finals, e))?;
        Ok(summary)
    }

    /// Build the text and attribute value indexes in parallel and install
    /// both, or neither if one fails
    pub fn build_value_indexes(&self, data: &dyn Data) -> Result<(SinkSummary, SinkSummary)> {
        let text_files = value_files(&self.dir, IndexKind::Text);
        let attr_files = value_files(&self.dir, IndexKind::Attribute);

        let (text, attr) = rayon::join(
            || self.write_values(data, IndexKind::Text),
            || self.write_values(data, IndexKind::Attribute),
        );
        let (text, attr) = match (text, attr) {
            (Ok(text), Ok(attr)) => (text, attr),
            (Err(e), _) | (_, Err(e)) => {
                self.discard(IndexKind::Text, &text_files, &e);
                self.discard(IndexKind::Attribute, &attr_files, &e);
                return Err(e);
            }
        };

        let finals: Vec<PathBuf> = text_files.into_iter().chain(attr_files).collect();
        self.install(&finals, |meta| {
            for (kind, summary) in [(IndexKind::Text, text), (IndexKind::Attribute, attr)] {
                meta.set_available(kind, true, summary.entries);
                meta.set_config(kind, Some(self.config.clone()));
            }
        })
        .inspect_err(|e| self.discard(IndexKind::Text, &finals, e))?;
        Ok((text, attr))
    }

    /// Build and install the full-text index in the configured layout
    pub fn build_fulltext(&self, data: &dyn Data) -> Result<SinkSummary> {
        let layout = self.config.ft_layout;
        let finals: Vec<PathBuf> = layout
            .suffixes()
            .iter()
            .map(|&s| index_file(&self.dir, IndexKind::FullText, s))
            .collect();

        let summary = self
            .write_fulltext(data, layout)
            .inspect_err(|e| self.discard(IndexKind::FullText, &finals, e))?;

        self.install(&finals, |meta| {
            meta.set_available(IndexKind::FullText, true, summary.entries);
            meta.set_config(IndexKind::FullText, Some(self.config.clone()));
            meta.ft_layout = layout;
            let (min, max) = summary.scores.unwrap_or((0.0, 0.0));
            meta.score_min = min;
            meta.score_max = max;
        })
        .inspect_err(|e| self.discard(IndexKind::FullText, &finals, e))?;

        // Files of the other layout are stale once this one is installed
        for path in owned_files(&self.dir, IndexKind::FullText) {
            if !finals.contains(&path) {
                remove_if_exists(&path)?;
            }
        }
        Ok(summary)
    }

    /// Discard everything a build of `kind` left in the directory, including
    /// the installed index, and clear its flag
    pub fn abort(&self, kind: IndexKind) -> Result<()> {
        for path in owned_files(&self.dir, kind) {
            remove_if_exists(&pending_file(&path))?;
        }
        for path in spill::spill_files(&self.dir, kind) {
            remove_if_exists(&path)?;
        }
        log::info!("{} build aborted", kind.label());
        drop_index(&self.dir, kind)
    }

    fn write_values(&self, data: &dyn Data, kind: IndexKind) -> Result<SinkSummary> {
        let node_kind = if kind.reads_text() { NodeKind::Text } else { NodeKind::Attr };
        let total = data.total_size();
        let max_len = self.config.max_token_len;
        let mut run = BuildRun::new(self, kind, total, true);

        for pre in 0..total {
            run.checkpoint(pre)?;
            if data.kind(pre) != node_kind {
                continue;
            }
            let value = data.text(pre, kind.reads_text());
            if value.is_empty() || value.len() > max_len {
                continue;
            }
            run.add(&value, (pre, 0))?;
        }

        let mut sink = ValueWriter::new(&self.dir, kind)?;
        run.finish(&mut sink)
    }

    fn write_fulltext(&self, data: &dyn Data, layout: FtLayout) -> Result<SinkSummary> {
        let config = &self.config;
        let lexer = Lexer::new(config.case_sensitive, config.max_token_len, &config.stopwords);
        let total = data.total_size();
        let mut stats = config.scoring.then(UnitStats::default);
        let mut run = BuildRun::new(self, IndexKind::FullText, total, stats.is_none());

        for pre in 0..total {
            run.checkpoint(pre)?;
            if data.kind(pre) != NodeKind::Text {
                continue;
            }
            let text = data.text(pre, true);
            let tokens = lexer.tokens(&text);
            if tokens.is_empty() {
                continue;
            }
            if let Some(stats) = stats.as_mut() {
                let mut words: Vec<&[u8]> = tokens.iter().map(|t| t.bytes.as_ref()).collect();
                words.sort_unstable();
                let max_tf = words.chunk_by(|a, b| a == b).map(|c| c.len()).max().unwrap_or(0);
                stats.record_unit(pre, max_tf as u32);
                run.overhead = stats.memory();
            }
            for token in &tokens {
                run.add(&token.bytes, (pre, token.pos))?;
            }
        }

        let mut sink: Box<dyn IndexSink> = match layout {
            FtLayout::Trie => Box::new(TrieWriter::create(&self.dir, stats)?),
            FtLayout::Buckets => Box::new(BucketWriter::create(&self.dir, config.max_token_len, stats)?),
        };
        run.finish(sink.as_mut())
    }

    /// Rename the pending files over `finals` and record the new state
    fn install<F: FnOnce(&mut IndexMeta)>(&self, finals: &[PathBuf], update: F) -> Result<()> {
        for path in finals {
            fs::rename(pending_file(path), path)?;
        }
        let mut meta = IndexMeta::load_or_default(&self.dir)?;
        update(&mut meta);
        meta.save(&self.dir)?;
        log::info!("Installed {} files in {}", finals.len(), self.dir.display());
        Ok(())
    }

    /// Remove the pending files of a failed build
    fn discard(&self, kind: IndexKind, finals: &[PathBuf], cause: &IndexError) {
        for path in finals {
            let _ = fs::remove_file(pending_file(path));
        }
        if cause.is_build_abort() {
            log::info!("{} build stopped: {}", kind.label(), cause);
        } else {
            log::warn!("{} build failed: {}", kind.label(), cause);
        }
    }
}

fn value_files(dir: &Path, kind: IndexKind) -> Vec<PathBuf> {
    VALUE_SUFFIXES.iter().map(|&s| index_file(dir, kind, s)).collect()
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Remove the files of the `kind` index in `dir` and mark it unavailable
pub fn drop_index(dir: &Path, kind: IndexKind) -> Result<()> {
    for path in owned_files(dir, kind) {
        remove_if_exists(&path)?;
    }
    let mut meta = IndexMeta::load_or_default(dir)?;
    meta.set_available(kind, false, 0);
    meta.set_config(kind, None);
    if kind == IndexKind::FullText {
        meta.score_min = 0.0;
        meta.score_max = 0.0;
    }
    meta.save(dir)?;
    log::debug!("Dropped {} in {}", kind.label(), dir.display());
    Ok(())
}
