//! Lookup benchmarks over generated tables
//!
//! Run with: cargo bench --bench lookups

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tempfile::TempDir;
use xmlidx::data::{Data, MemData};
use xmlidx::index::{open_index, FtLayout, IndexBuild, IndexConfig, IndexKind, IndexToken};

const WORDS: &[&str] = &[
    "river", "stone", "harbor", "lantern", "meadow", "copper", "violet", "orchard", "signal", "timber",
    "anchor", "falcon", "garnet", "hollow", "island", "jasper", "kettle", "lumber", "marble", "nickel",
];

fn sentences(n: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|_| {
            let len = rng.random_range(3..12);
            (0..len)
                .map(|_| WORDS[rng.random_range(0..WORDS.len())])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn fixture(layout: FtLayout) -> (TempDir, Arc<dyn Data>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let data: Arc<dyn Data> = Arc::new(MemData::texts(sentences(20_000)));
    let config = IndexConfig {
        ft_layout: layout,
        ..IndexConfig::default()
    };
    let build = IndexBuild::new(dir.path(), config).expect("Failed to create build");
    build.build_values(data.as_ref(), IndexKind::Text).expect("Failed to build values");
    build.build_fulltext(data.as_ref()).expect("Failed to build full-text");
    (dir, data)
}

fn bench_value_lookup(c: &mut Criterion) {
    let (dir, data) = fixture(FtLayout::Trie);
    let index = open_index(dir.path(), IndexKind::Text, data)
        .expect("Failed to open")
        .expect("Index missing");
    let probe = sentences(1).remove(0);

    c.bench_function("value_exact", |b| {
        b.iter(|| index.lookup(black_box(&IndexToken::exact(&probe))).unwrap())
    });
    c.bench_function("value_string_range", |b| {
        let token = IndexToken::StringRange {
            min: b"h".to_vec(),
            min_inclusive: true,
            max: b"j".to_vec(),
            max_inclusive: false,
        };
        b.iter(|| index.lookup(black_box(&token)).unwrap())
    });
}

fn bench_fulltext(c: &mut Criterion) {
    let mut group = c.benchmark_group("fulltext");
    for layout in [FtLayout::Trie, FtLayout::Buckets] {
        let (dir, data) = fixture(layout);
        let index = open_index(dir.path(), IndexKind::FullText, data)
            .expect("Failed to open")
            .expect("Index missing");
        let name = format!("{:?}", layout);

        let queries = [
            ("exact", IndexToken::exact("lantern")),
            ("wildcard", IndexToken::wildcard("m.*e")),
            ("fuzzy", IndexToken::fuzzy("lanturn", Some(1))),
        ];
        for (label, token) in &queries {
            group.bench_with_input(BenchmarkId::new(*label, &name), token, |b, token| {
                b.iter(|| index.lookup(black_box(token)).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_value_lookup, bench_fulltext);
criterion_main!(benches);
