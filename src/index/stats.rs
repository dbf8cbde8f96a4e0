use crate::index::types::IndexKind;
use crate::utils::Lexer;
use std::fmt;
use std::path::Path;

/// Number of most frequent tokens listed by `info()`
pub const TOP_TOKENS: usize = 15;

/// Statistics reported by `Index::info`
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub kind: IndexKind,
    pub structure: &'static str,
    pub entries: usize,
    pub disk_size: u64,
    /// Most frequent tokens with their counts
    pub top: Vec<(Vec<u8>, u32)>,
    pub lexer: Option<LexerFlags>,
}

#[derive(Debug, Clone, Copy)]
pub struct LexerFlags {
    pub case_sensitive: bool,
    pub stopwords: usize,
    pub scoring: bool,
}

impl IndexStats {
    pub fn collect<I>(kind: IndexKind, structure: &'static str, disk_size: u64, tokens: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, u32)>,
    {
        let mut all: Vec<(Vec<u8>, u32)> = tokens.into_iter().collect();
        let entries = all.len();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(TOP_TOKENS);
        Self {
            kind,
            structure,
            entries,
            disk_size,
            top: all,
            lexer: None,
        }
    }

    pub fn with_lexer(mut self, lexer: &Lexer, scoring: bool) -> Self {
        self.lexer = Some(LexerFlags {
            case_sensitive: lexer.case_sensitive(),
            stopwords: lexer.stopword_count(),
            scoring,
        });
        self
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind.label())?;
        writeln!(f, "- Structure:      {}", self.structure)?;
        if let Some(lexer) = self.lexer {
            writeln!(f, "- Case sensitive: {}", lexer.case_sensitive)?;
            writeln!(f, "- Stopwords:      {}", lexer.stopwords)?;
            writeln!(f, "- Scoring:        {}", lexer.scoring)?;
        }
        writeln!(f, "- Entries:        {}", self.entries)?;
        writeln!(f, "- Size:           {}", format_size(self.disk_size))?;
        if !self.top.is_empty() {
            writeln!(f, "- Most frequent:")?;
            for (token, count) in &self.top {
                writeln!(f, "  {:20} {}", String::from_utf8_lossy(token), count)?;
            }
            if self.entries > self.top.len() {
                writeln!(f, "  ... and {} more", self.entries - self.top.len())?;
            }
        }
        Ok(())
    }
}

/// Total size of the existing files among `paths`
pub fn files_size<'a, I: IntoIterator<Item = &'a Path>>(paths: I) -> u64 {
    paths
        .into_iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum()
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_tokens() {
        let tokens = (0..20u32).map(|i| (format!("t{:02}", i).into_bytes(), i % 7));
        let stats = IndexStats::collect(IndexKind::Text, "Sorted list", 2048, tokens);
        assert_eq!(stats.entries, 20);
        assert_eq!(stats.top.len(), TOP_TOKENS);
        assert_eq!(stats.top[0], (b"t06".to_vec(), 6));
        assert_eq!(stats.top[1], (b"t13".to_vec(), 6));

        let text = stats.to_string();
        assert!(text.starts_with("TEXT INDEX"));
        assert!(text.contains("2.00 KB"));
        assert!(text.contains("... and 5 more"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
