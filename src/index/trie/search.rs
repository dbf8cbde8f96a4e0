//! Pattern and edit-distance walks over the trie. Both visit nodes in
//! pre-order and prune a subtree as soon as no extension can match.

use super::reader::{NodeView, TrieFiles};
use crate::error::Result;
use crate::index::fulltext::DistanceRow;
use crate::index::postings::Posting;
use crate::index::wildcard::{StateSet, WildcardPattern};

pub(super) fn wildcard(files: &TrieFiles, pattern: &WildcardPattern, out: &mut Vec<Posting>) -> Result<()> {
    let root = files.root()?;
    walk_pattern(files, root, pattern.start(), pattern, out)
}

fn walk_pattern(
    files: &TrieFiles,
    node: NodeView<'_>,
    mut states: StateSet,
    pattern: &WildcardPattern,
    out: &mut Vec<Posting>,
) -> Result<()> {
    for &byte in node.label {
        states = pattern.advance(&states, byte);
        if states.is_empty() {
            return Ok(());
        }
    }
    if pattern.accepts(&states) {
        out.extend(node.posting());
    }
    for i in 0..node.child_count() {
        let child = files.node(node.child(i).0)?;
        walk_pattern(files, child, states.clone(), pattern, out)?;
    }
    Ok(())
}

pub(super) fn fuzzy(files: &TrieFiles, token: &[u8], max_errors: u32, out: &mut Vec<Posting>) -> Result<()> {
    let root = files.root()?;
    walk_distance(files, root, DistanceRow::start(token), token, max_errors, out)
}

fn walk_distance(
    files: &TrieFiles,
    node: NodeView<'_>,
    mut row: DistanceRow,
    token: &[u8],
    k: u32,
    out: &mut Vec<Posting>,
) -> Result<()> {
    for &byte in node.label {
        row = row.advance(token, byte);
        if row.exceeds(k) {
            return Ok(());
        }
    }
    if row.distance() <= k {
        out.extend(node.posting());
    }
    for i in 0..node.child_count() {
        let child = files.node(node.child(i).0)?;
        walk_distance(files, child, row.clone(), token, k, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::IndexSink;
    use crate::index::trie::TrieWriter;
    use crate::index::types::{index_file, pending_file, IndexKind};
    use tempfile::tempdir;

    /// Trie where token `i` of the sorted input points at position `i`
    fn build(tokens: &[&str]) -> (tempfile::TempDir, TrieFiles, Vec<String>) {
        let dir = tempdir().unwrap();
        let mut sorted: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        sorted.sort();
        let mut writer = TrieWriter::create(dir.path(), None).unwrap();
        for (i, token) in sorted.iter().enumerate() {
            writer.write_entry(token.as_bytes(), &[(i as u32, 0)]).unwrap();
        }
        writer.finish().unwrap();
        for s in ['a', 'b', 'c'] {
            let path = index_file(dir.path(), IndexKind::FullText, s);
            std::fs::rename(pending_file(&path), &path).unwrap();
        }
        let files = TrieFiles::open(dir.path()).unwrap();
        (dir, files, sorted)
    }

    fn matched(files: &TrieFiles, sorted: &[String], postings: &[Posting]) -> Vec<String> {
        let mut all = Vec::new();
        crate::index::fulltext::FtStructure::tokens(files, b"", &mut all).unwrap();
        postings
            .iter()
            .map(|p| {
                let i = all.iter().position(|(_, q)| q == p).unwrap();
                sorted[i].clone()
            })
            .collect()
    }

    #[test]
    fn test_wildcard_walk() {
        let (_dir, files, sorted) = build(&["cat", "cot", "cut", "cast", "dog"]);
        let mut out = Vec::new();
        wildcard(&files, &WildcardPattern::parse(b"c.t"), &mut out).unwrap();
        assert_eq!(matched(&files, &sorted, &out), vec!["cat", "cot", "cut"]);

        out.clear();
        wildcard(&files, &WildcardPattern::parse(b"c.*t"), &mut out).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_fuzzy_walk() {
        let (_dir, files, sorted) = build(&["house", "mouse", "hose", "horse", "mice"]);
        let mut out = Vec::new();
        fuzzy(&files, b"house", 1, &mut out).unwrap();
        let mut found = matched(&files, &sorted, &out);
        found.sort();
        assert_eq!(found, vec!["horse", "hose", "house", "mouse"]);

        out.clear();
        fuzzy(&files, b"house", 0, &mut out).unwrap();
        assert_eq!(matched(&files, &sorted, &out), vec!["house"]);
    }
}
