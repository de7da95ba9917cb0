//! End-to-end flow over files: balances -> hint.bin -> updates -> delta files -> client

use std::sync::Arc;

use plinko_core::delta::{decode_deltas, encode_deltas};
use plinko_core::source::encode_balances;
use plinko_core::{
    Database, DbUpdate, HintSnapshot, PlinkoParams, PrSet, QueryEngine, UpdateManager,
};
use plinko_hintgen::generate_hint;
use plinko_updater::DeltaWriter;
use tempfile::tempdir;

fn small_engine() -> QueryEngine {
    let db = Arc::new(Database::new((0..16).collect(), 16));
    QueryEngine::new(db, 4, 4)
}

#[test]
fn test_small_database_queries() {
    let engine = small_engine();

    assert_eq!(engine.plaintext_query(5).value, 5);
    assert_eq!(engine.plaintext_query(16).value, 0);
    assert_eq!(engine.plaintext_query(u64::MAX).value, 0);

    assert_eq!(engine.set_parity_query(&[0, 1, 2, 3]).value, 0);
    assert_eq!(engine.set_parity_query(&[1, 2]).value, 3);
    assert_eq!(engine.set_parity_query(&[4, 100, 4]).value, 0);
}

#[test]
fn test_full_set_one_index_per_chunk() {
    let engine = small_engine();
    let key = [0xA5u8; 16];

    let indices = PrSet::new(key).expand(4, 4);
    assert_eq!(indices.len(), 4);
    for (chunk, &index) in indices.iter().enumerate() {
        assert_eq!(index / 4, chunk as u64);
    }

    let first = engine.full_set_query(&key).unwrap().value;
    let second = engine.full_set_query(&key).unwrap().value;
    assert_eq!(first, second);
    assert_eq!(first, indices.iter().fold(0, |acc, &i| acc ^ i));
}

#[test]
fn test_update_flows_to_client_snapshot() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("database.bin");
    let hint_path = dir.path().join("hint.bin");

    let balances: Vec<u64> = (0..16).map(|i| i * 10).collect();
    std::fs::write(&db_path, encode_balances(&balances)).unwrap();
    let params = generate_hint(&db_path, &hint_path).unwrap();
    assert_eq!(params, PlinkoParams::new(16));

    // Server side
    let server_snapshot = HintSnapshot::load(&hint_path).unwrap();
    let database = Arc::new(server_snapshot.into_database());
    let mut manager = UpdateManager::new(database.clone(), params.chunk_size, params.set_size);
    manager.enable_cache_mode();

    let old = database.get(5);
    let (deltas, _) = manager.apply_updates(&[
        DbUpdate { index: 5, old_value: old, new_value: old ^ 0xFF },
        DbUpdate { index: 16, old_value: 0, new_value: 1 },
    ]);
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].delta, 0xFF);
    assert_eq!(database.get(5), old ^ 0xFF);
    assert_eq!(database.get(16), 0);

    let writer = DeltaWriter::new(dir.path().join("deltas"));
    writer.ensure_dir().unwrap();
    let path = writer.write(1, &deltas).unwrap();
    assert!(path.ends_with("delta-000001.bin"));

    // Client side
    let received = decode_deltas(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(received, deltas);

    let mut client_snapshot = HintSnapshot::load(&hint_path).unwrap();
    let target = (received[0].hint_set_id * params.chunk_size) as usize;
    let before = client_snapshot.entries[target];
    for delta in &received {
        assert!(client_snapshot.apply_delta(delta));
    }
    assert_eq!(client_snapshot.entries[target], before ^ 0xFF);
}

#[test]
fn test_cached_and_direct_managers_agree() {
    let params = PlinkoParams::new(2_000);
    let entries = vec![0u64; params.total_entries() as usize];
    let updates: Vec<DbUpdate> = (0..200)
        .map(|i| DbUpdate { index: i * 9, old_value: 0, new_value: i + 1 })
        .collect();

    let direct = UpdateManager::new(
        Arc::new(Database::new(entries.clone(), params.db_size)),
        params.chunk_size,
        params.set_size,
    );
    let mut cached = UpdateManager::new(
        Arc::new(Database::new(entries, params.db_size)),
        params.chunk_size,
        params.set_size,
    );
    cached.enable_cache_mode();

    let (a, _) = direct.apply_updates(&updates);
    let (b, _) = cached.apply_updates(&updates);
    assert_eq!(a, b);
    assert!(a.iter().all(|d| d.hint_set_id < params.set_size));
}

#[test]
fn test_empty_delta_file() {
    let bytes = encode_deltas(&[]);
    assert_eq!(bytes.len(), 16);
    assert!(decode_deltas(&bytes).unwrap().is_empty());
}
