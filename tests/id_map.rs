//! Id map against a replayed array of ids

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;
use xmlidx::data::IdPositionMap;

fn check(map: &IdPositionMap, model: &[u32], next_id: u32) {
    assert_eq!(map.table_len() as usize, model.len());
    for (pre, &id) in model.iter().enumerate() {
        assert_eq!(map.position_of(id), Some(pre as u32), "id {}", id);
        assert_eq!(map.id_at(pre as u32), Some(id), "pre {}", pre);
    }
    assert_eq!(map.id_at(model.len() as u32), None);
    assert_eq!(map.position_of(next_id), None);
}

#[test]
fn test_random_updates_match_model() -> Result<()> {
    let dir = tempdir()?;
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let base = rng.random_range(0..50u32);
        let mut map = IdPositionMap::new(base);
        let mut model: Vec<u32> = (0..=base).collect();
        let mut next_id = base + 1;

        for _ in 0..60 {
            if model.is_empty() || rng.random_bool(0.55) {
                let at = rng.random_range(0..=model.len());
                let count = rng.random_range(1..5u32);
                map.record_insert(at as u32, next_id, count);
                model.splice(at..at, next_id..next_id + count);
                next_id += count;
            } else {
                let at = rng.random_range(0..model.len());
                let count = rng.random_range(1..=(model.len() - at).min(6));
                map.record_delete(at as u32, model[at], count as u32);
                model.drain(at..at + count);
            }
            check(&map, &model, next_id);
        }
        // Runs grow with updates, never with nodes
        assert!(map.runs() <= 3 * 60 + 2, "seed {} has {} runs", seed, map.runs());

        let path = dir.path().join(format!("idp{}", seed));
        map.save(&path)?;
        let loaded = IdPositionMap::load(&path)?;
        assert_eq!(loaded.runs(), map.runs());
        check(&loaded, &model, next_id);
    }
    Ok(())
}

#[test]
fn test_append_keeps_identity() {
    let mut map = IdPositionMap::new(99);
    map.record_insert(100, 100, 3);
    assert_eq!(map.base_id(), Some(102));
    assert_eq!(map.runs(), 0);
    assert_eq!(map.position_of(50), Some(50));
    assert_eq!(map.position_of(102), Some(102));
}

#[test]
fn test_deleted_ids_resolve_to_none() {
    let mut map = IdPositionMap::new(9);
    map.record_delete(2, 2, 3);
    map.record_insert(0, 10, 2);
    for id in 2..5 {
        assert_eq!(map.position_of(id), None);
    }
    assert_eq!(map.positions_of(&[10, 5, 3, 11]), vec![0, 1, 4]);
}

#[test]
fn test_empty_table() -> Result<()> {
    let dir = tempdir()?;
    let mut map = IdPositionMap::empty();
    assert_eq!(map.table_len(), 0);
    map.record_insert(0, 0, 4);
    assert_eq!(map.runs(), 0);
    assert_eq!(map.table_len(), 4);

    let path = dir.path().join("idp");
    IdPositionMap::empty().save(&path)?;
    assert_eq!(IdPositionMap::load(&path)?.base_id(), None);
    Ok(())
}
