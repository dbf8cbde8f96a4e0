use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Version written to meta.json; readers refuse other versions
pub const FORMAT_VERSION: u32 = 2;

/// Metadata file name inside the index directory
pub const META_FILE: &str = "meta.json";

/// Suffix of files written by a running build
pub const NEW_SUFFIX: &str = ".new";

/// Extension of spill files
pub const SPILL_EXT: &str = "spill";

/// Which table content an index covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Text,
    Attribute,
    FullText,
}

impl IndexKind {
    /// File name prefix of the index files
    pub fn prefix(self) -> &'static str {
        match self {
            IndexKind::Text => "txt",
            IndexKind::Attribute => "atv",
            IndexKind::FullText => "ftx",
        }
    }

    /// Whether the index reads text nodes (as opposed to attribute values)
    pub fn reads_text(self) -> bool {
        !matches!(self, IndexKind::Attribute)
    }

    pub fn label(self) -> &'static str {
        match self {
            IndexKind::Text => "TEXT INDEX",
            IndexKind::Attribute => "ATTRIBUTE INDEX",
            IndexKind::FullText => "FULLTEXT INDEX",
        }
    }
}

/// On-disk organisation of the full-text index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtLayout {
    /// Compressed trie (`ftxa`, `ftxb`, `ftxc`)
    #[default]
    Trie,
    /// Length buckets (`ftxx`, `ftxy`, `ftxz`)
    Buckets,
}

impl FtLayout {
    pub fn suffixes(self) -> &'static [char] {
        match self {
            FtLayout::Trie => &['a', 'b', 'c'],
            FtLayout::Buckets => &['x', 'y', 'z'],
        }
    }
}

/// File suffixes of a value index
pub const VALUE_SUFFIXES: &[char] = &['l', 'r'];

/// Path of an index file: `{dir}/{prefix}{suffix}`
pub fn index_file(dir: &Path, kind: IndexKind, suffix: char) -> PathBuf {
    dir.join(format!("{}{}", kind.prefix(), suffix))
}

/// Path a build writes before installing `path`
pub fn pending_file(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(NEW_SUFFIX);
    PathBuf::from(name)
}

/// All final file names an index kind may own, across layouts
pub fn owned_files(dir: &Path, kind: IndexKind) -> Vec<PathBuf> {
    let suffixes: Vec<char> = match kind {
        IndexKind::FullText => FtLayout::Trie
            .suffixes()
            .iter()
            .chain(FtLayout::Buckets.suffixes())
            .copied()
            .collect(),
        _ => VALUE_SUFFIXES.to_vec(),
    };
    suffixes
        .into_iter()
        .map(|s| index_file(dir, kind, s))
        .collect()
}

/// Configuration for building and querying indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Tokens and values longer than this are not indexed
    pub max_token_len: usize,
    pub ft_layout: FtLayout,
    /// Compute TF-IDF scores for full-text hits
    pub scoring: bool,
    pub case_sensitive: bool,
    pub stopwords: Vec<String>,
    /// Maximum edit distance for fuzzy queries, 0 = token length / 4
    pub fuzzy_errors: u32,
    pub cache_initial_capacity: usize,
    pub cache_max_entries: usize,
    /// Tokens between memory checks
    pub memory_check_interval: usize,
    /// Table positions between cancellation checks
    pub stop_check_interval: u32,
    /// Memory ceiling as a fraction of physical memory
    pub memory_ratio: f64,
    /// Explicit memory ceiling in bytes, overrides `memory_ratio`
    pub memory_limit: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_token_len: 96,
            ft_layout: FtLayout::Trie,
            scoring: true,
            case_sensitive: false,
            stopwords: Vec::new(),
            fuzzy_errors: 0,
            cache_initial_capacity: 64,
            cache_max_entries: 4096,
            memory_check_interval: 4096,
            stop_check_interval: 1 << 21,
            memory_ratio: 0.8,
            memory_limit: None,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=255).contains(&self.max_token_len) {
            return Err(IndexError::invalid_config(format!(
                "max_token_len must be in 1..=255, got {}",
                self.max_token_len
            )));
        }
        if self.cache_initial_capacity == 0 || self.cache_max_entries < self.cache_initial_capacity {
            return Err(IndexError::invalid_config(
                "cache capacities must satisfy 0 < initial <= max",
            ));
        }
        if self.memory_check_interval == 0 || self.stop_check_interval == 0 {
            return Err(IndexError::invalid_config("check intervals must be positive"));
        }
        if !(self.memory_ratio > 0.0 && self.memory_ratio <= 1.0) {
            return Err(IndexError::invalid_config(format!(
                "memory_ratio must be in (0, 1], got {}",
                self.memory_ratio
            )));
        }
        Ok(())
    }

    /// Fuzzy error budget for a query token of `len` bytes
    pub fn fuzzy_budget(&self, len: usize, requested: Option<u32>) -> u32 {
        match requested {
            Some(k) => k,
            None if self.fuzzy_errors > 0 => self.fuzzy_errors,
            None => (len >> 2) as u32,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = serde_json::from_slice(&fs::read(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_vec_pretty(self)?)
    }
}

/// Index metadata stored in meta.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    /// Config each index was built with; its readers depend on it
    #[serde(default)]
    pub text_config: Option<IndexConfig>,
    #[serde(default)]
    pub attribute_config: Option<IndexConfig>,
    #[serde(default)]
    pub fulltext_config: Option<IndexConfig>,
    pub text: bool,
    pub attribute: bool,
    pub fulltext: bool,
    pub ft_layout: FtLayout,
    /// Range of full-text scores seen during the build
    pub score_min: f32,
    pub score_max: f32,
    pub text_entries: u32,
    pub attribute_entries: u32,
    pub fulltext_entries: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for IndexMeta {
    fn default() -> Self {
        let now = unix_now();
        Self {
            version: FORMAT_VERSION,
            text_config: None,
            attribute_config: None,
            fulltext_config: None,
            text: false,
            attribute: false,
            fulltext: false,
            ft_layout: FtLayout::Trie,
            score_min: 0.0,
            score_max: 0.0,
            text_entries: 0,
            attribute_entries: 0,
            fulltext_entries: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl IndexMeta {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(META_FILE)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let meta: Self = serde_json::from_slice(&fs::read(Self::path(dir))?)?;
        if meta.version != FORMAT_VERSION {
            return Err(IndexError::malformed(format!(
                "unsupported index version {}",
                meta.version
            )));
        }
        Ok(meta)
    }

    /// Metadata of `dir`, or defaults when none was written yet
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        if Self::path(dir).exists() {
            Self::load(dir)
        } else {
            Ok(Self::default())
        }
    }

    /// Write meta.json through a temporary file and rename
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        self.updated_at = unix_now();
        write_atomic(&Self::path(dir), &serde_json::to_vec_pretty(self)?)
    }

    pub fn available(&self, kind: IndexKind) -> bool {
        match kind {
            IndexKind::Text => self.text,
            IndexKind::Attribute => self.attribute,
            IndexKind::FullText => self.fulltext,
        }
    }

    pub fn set_available(&mut self, kind: IndexKind, available: bool, entries: u32) {
        match kind {
            IndexKind::Text => {
                self.text = available;
                self.text_entries = entries;
            }
            IndexKind::Attribute => {
                self.attribute = available;
                self.attribute_entries = entries;
            }
            IndexKind::FullText => {
                self.fulltext = available;
                self.fulltext_entries = entries;
            }
        }
    }

    /// Config the `kind` index was built with, defaults if it was never built
    pub fn config(&self, kind: IndexKind) -> IndexConfig {
        self.config_slot(kind).clone().unwrap_or_default()
    }

    /// Record the build config of `kind`; `None` when the index is dropped
    pub fn set_config(&mut self, kind: IndexKind, config: Option<IndexConfig>) {
        *self.config_slot_mut(kind) = config;
    }

    fn config_slot(&self, kind: IndexKind) -> &Option<IndexConfig> {
        match kind {
            IndexKind::Text => &self.text_config,
            IndexKind::Attribute => &self.attribute_config,
            IndexKind::FullText => &self.fulltext_config,
        }
    }

    fn config_slot_mut(&mut self, kind: IndexKind) -> &mut Option<IndexConfig> {
        match kind {
            IndexKind::Text => &mut self.text_config,
            IndexKind::Attribute => &mut self.attribute_config,
            IndexKind::FullText => &mut self.fulltext_config,
        }
    }

    pub fn entries(&self, kind: IndexKind) -> u32 {
        match kind {
            IndexKind::Text => self.text_entries,
            IndexKind::Attribute => self.attribute_entries,
            IndexKind::FullText => self.fulltext_entries,
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = pending_file(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults_validate() {
        let config = IndexConfig::default();
        config.validate().unwrap();
        assert_eq!(config.fuzzy_budget(8, None), 2);
        assert_eq!(config.fuzzy_budget(8, Some(0)), 0);
    }

    #[test]
    fn test_config_rejects_long_tokens() {
        let config = IndexConfig {
            max_token_len: 300,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_round_trip_with_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, br#"{"ft_layout":"buckets","fuzzy_errors":1}"#).unwrap();
        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.ft_layout, FtLayout::Buckets);
        assert_eq!(config.max_token_len, 96);

        config.save(&path).unwrap();
        assert_eq!(IndexConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_meta_save_load() {
        let dir = tempdir().unwrap();
        let mut meta = IndexMeta::load_or_default(dir.path()).unwrap();
        assert!(!meta.available(IndexKind::Text));
        meta.set_available(IndexKind::Text, true, 12);
        meta.save(dir.path()).unwrap();

        let loaded = IndexMeta::load(dir.path()).unwrap();
        assert!(loaded.available(IndexKind::Text));
        assert_eq!(loaded.entries(IndexKind::Text), 12);
        assert!(!pending_file(&IndexMeta::path(dir.path())).exists());
    }

    #[test]
    fn test_meta_keeps_config_per_index() {
        let dir = tempdir().unwrap();
        let scored = IndexConfig::default();
        let plain = IndexConfig {
            scoring: false,
            max_token_len: 12,
            ..Default::default()
        };
        let mut meta = IndexMeta::default();
        meta.set_config(IndexKind::FullText, Some(scored.clone()));
        meta.set_config(IndexKind::Text, Some(plain.clone()));
        meta.save(dir.path()).unwrap();

        let mut loaded = IndexMeta::load(dir.path()).unwrap();
        assert_eq!(loaded.config(IndexKind::FullText), scored);
        assert_eq!(loaded.config(IndexKind::Text), plain);
        assert_eq!(loaded.config(IndexKind::Attribute), IndexConfig::default());

        loaded.set_config(IndexKind::Text, None);
        assert_eq!(loaded.config(IndexKind::Text), IndexConfig::default());
        assert_eq!(loaded.config(IndexKind::FullText), scored);
    }

    #[test]
    fn test_file_names() {
        let dir = Path::new("/db");
        assert_eq!(index_file(dir, IndexKind::Attribute, 'r'), Path::new("/db/atvr"));
        assert_eq!(pending_file(Path::new("/db/ftxa")), Path::new("/db/ftxa.new"));
        assert_eq!(owned_files(dir, IndexKind::FullText).len(), 6);
    }
}
