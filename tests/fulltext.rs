//! Full-text lookups over both layouts

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::bytes::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use xmlidx::data::{Data, MemData};
use xmlidx::index::wildcard::WildcardPattern;
use xmlidx::index::{open_index, EntrySpec, FtLayout, Index, IndexBuild, IndexConfig, IndexKind, IndexMeta, IndexToken};

const LAYOUTS: [FtLayout; 2] = [FtLayout::Trie, FtLayout::Buckets];

fn build(dir: &Path, data: &Arc<dyn Data>, config: IndexConfig) -> Result<Box<dyn Index>> {
    IndexBuild::new(dir, config)?.build_fulltext(data.as_ref())?;
    Ok(open_index(dir, IndexKind::FullText, data.clone())?.expect("index was built"))
}

fn config(layout: FtLayout) -> IndexConfig {
    IndexConfig {
        ft_layout: layout,
        ..IndexConfig::default()
    }
}

fn levenshtein(a: &[u8], b: &[u8]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, &x) in a.iter().enumerate() {
        let mut row = vec![i + 1];
        for (j, &y) in b.iter().enumerate() {
            let cost = usize::from(x != y);
            row.push((prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost));
        }
        prev = row;
    }
    prev[b.len()]
}

fn random_word(rng: &mut StdRng) -> String {
    let len = rng.random_range(1..8);
    (0..len).map(|_| rng.random_range(b'a'..=b'e') as char).collect()
}

#[test]
fn test_wildcard_single_any() -> Result<()> {
    for layout in LAYOUTS {
        let dir = tempdir()?;
        let data: Arc<dyn Data> = Arc::new(MemData::texts(["cat", "cot", "cut", "cast"]));
        let index = build(dir.path(), &data, config(layout))?;

        let hits = index.lookup(&IndexToken::wildcard("c.t"))?;
        assert_eq!(hits.into_pres(), vec![0, 1, 2], "{:?}", layout);
        let hits = index.lookup(&IndexToken::wildcard("c.+t"))?;
        assert_eq!(hits.into_pres(), vec![0, 1, 2, 3], "{:?}", layout);
        let hits = index.lookup(&IndexToken::wildcard("c.{2,2}t"))?;
        assert_eq!(hits.into_pres(), vec![3], "{:?}", layout);
    }
    Ok(())
}

#[test]
fn test_wildcard_agrees_with_regex() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let texts: Vec<String> = (0..300)
        .map(|_| (0..4).map(|_| random_word(&mut rng)).collect::<Vec<_>>().join(" "))
        .collect();
    let patterns = ["a.*", "b.c", ".?d.?", "a.{1,3}e", "e.+", "c\\.d", "ab"];

    for layout in LAYOUTS {
        let dir = tempdir()?;
        let data: Arc<dyn Data> = Arc::new(MemData::texts(&texts));
        let index = build(dir.path(), &data, config(layout))?;

        for pattern in patterns {
            let regex = Regex::new(&WildcardPattern::parse(pattern.as_bytes()).to_regex())?;
            let expected: BTreeSet<(u32, u32)> = texts
                .iter()
                .enumerate()
                .flat_map(|(pre, text)| {
                    text.split(' ')
                        .enumerate()
                        .filter(|(_, w)| regex.is_match(w.as_bytes()))
                        .map(move |(pos, _)| (pre as u32, pos as u32))
                })
                .collect();
            let got: BTreeSet<(u32, u32)> = index
                .lookup(&IndexToken::wildcard(pattern))?
                .into_iter()
                .map(|h| (h.pre, h.pos))
                .collect();
            assert_eq!(got, expected, "{:?} {}", layout, pattern);
        }
    }
    Ok(())
}

#[test]
fn test_fuzzy_matches_brute_force() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(5);
    let texts: Vec<String> = (0..200)
        .map(|_| (0..3).map(|_| random_word(&mut rng)).collect::<Vec<_>>().join(" "))
        .collect();
    let vocabulary: BTreeSet<&str> = texts.iter().flat_map(|t| t.split(' ')).collect();
    let queries: Vec<String> = (0..20).map(|_| random_word(&mut rng)).collect();

    for layout in LAYOUTS {
        let dir = tempdir()?;
        let data: Arc<dyn Data> = Arc::new(MemData::texts(&texts));
        let index = build(dir.path(), &data, config(layout))?;

        for query in &queries {
            for k in 0..=2u32 {
                let expected: BTreeSet<u32> = texts
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.split(' ').any(|w| levenshtein(w.as_bytes(), query.as_bytes()) <= k as usize))
                    .map(|(pre, _)| pre as u32)
                    .collect();
                let got: BTreeSet<u32> = index
                    .lookup(&IndexToken::fuzzy(query, Some(k)))?
                    .into_pres()
                    .into_iter()
                    .collect();
                assert_eq!(got, expected, "{:?} {} k={}", layout, query, k);
            }
        }
        assert_eq!(index.entries(&EntrySpec::All)?.len(), vocabulary.len());
    }
    Ok(())
}

#[test]
fn test_layouts_agree_on_exact_hits() -> Result<()> {
    let texts = ["The quick brown fox", "jumps over the lazy dog", "THE END"];
    let mut results = Vec::new();
    for layout in LAYOUTS {
        let dir = tempdir()?;
        let data: Arc<dyn Data> = Arc::new(MemData::texts(texts));
        let index = build(dir.path(), &data, config(layout))?;

        let hits = index.lookup(&IndexToken::exact("the"))?;
        let pairs: Vec<(u32, u32)> = hits.hits().iter().map(|h| (h.pre, h.pos)).collect();
        assert_eq!(pairs, vec![(0, 0), (1, 2), (2, 0)]);
        // Query tokens are folded like indexed ones
        assert_eq!(index.lookup(&IndexToken::exact("Lazy"))?.pres(), vec![1]);
        assert_eq!(index.approx_count(&IndexToken::exact("the"))?, 3);
        assert_eq!(index.approx_count(&IndexToken::fuzzy("the", None))?, 1);
        results.push(index.entries(&EntrySpec::Prefix(b"t".to_vec()))?);
    }
    assert_eq!(results[0], results[1]);
    Ok(())
}

#[test]
fn test_scores_within_meta_range() -> Result<()> {
    let dir = tempdir()?;
    let data: Arc<dyn Data> = Arc::new(MemData::texts([
        "rare word here",
        "common common word",
        "common thing",
        "another common thing",
    ]));
    let index = build(dir.path(), &data, config(FtLayout::Trie))?;
    let meta = IndexMeta::load(dir.path())?;
    assert!(meta.fulltext);
    assert!(meta.score_min <= meta.score_max);

    let rare = index.lookup(&IndexToken::exact("rare"))?;
    let common = index.lookup(&IndexToken::exact("common"))?;
    let rare_score = rare.hits()[0].score.expect("scored");
    for hit in common.hits() {
        let score = hit.score.expect("scored");
        assert!(score >= meta.score_min && score <= meta.score_max);
        assert!(score < rare_score);
    }
    Ok(())
}

#[test]
fn test_unscored_and_stopwords() -> Result<()> {
    let dir = tempdir()?;
    let data: Arc<dyn Data> = Arc::new(MemData::texts(["a cat and a dog"]));
    let config = IndexConfig {
        scoring: false,
        stopwords: vec!["a".into(), "and".into()],
        ..IndexConfig::default()
    };
    let index = build(dir.path(), &data, config)?;

    assert!(index.lookup(&IndexToken::exact("and"))?.is_empty());
    let dog = index.lookup(&IndexToken::exact("dog"))?;
    // Stopwords still count as positions
    assert_eq!(dog.hits()[0].pos, 4);
    assert_eq!(dog.hits()[0].score, None);
    assert!(index.info()?.contains("Stopwords:      2"));
    Ok(())
}

#[test]
fn test_rebuild_switches_layout() -> Result<()> {
    let dir = tempdir()?;
    let data: Arc<dyn Data> = Arc::new(MemData::texts(["one two"]));
    build(dir.path(), &data, config(FtLayout::Trie))?;
    let index = build(dir.path(), &data, config(FtLayout::Buckets))?;

    assert!(dir.path().join("ftxy").exists());
    assert!(!dir.path().join("ftxa").exists());
    assert_eq!(IndexMeta::load(dir.path())?.ft_layout, FtLayout::Buckets);
    assert_eq!(index.lookup(&IndexToken::exact("two"))?.pres(), vec![0]);
    Ok(())
}
