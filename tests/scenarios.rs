//! End-to-end scenarios exercising insert/get/delete, rotation,
//! recovery, CRC detection, and boundary sizes.

use bitcask::Engine;
use test_log::test;

fn get(engine: &Engine, key: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    if engine.get(key, &mut out).unwrap() {
        Some(out)
    } else {
        None
    }
}

#[test]
fn scenario_1_insert_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();

    engine.insert(b"a", b"1").unwrap();
    assert_eq!(get(&engine, b"a"), Some(b"1".to_vec()));
}

#[test]
fn scenario_2_overwrite_returns_latest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();

    engine.insert(b"a", b"1").unwrap();
    engine.insert(b"a", b"2").unwrap();
    assert_eq!(get(&engine, b"a"), Some(b"2".to_vec()));
}

#[test]
fn scenario_3_delete_then_get_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();

    engine.insert(b"a", b"1").unwrap();
    engine.delete(b"a").unwrap();
    assert_eq!(get(&engine, b"a"), None);
}

#[test]
fn scenario_4_rotation_produces_multiple_segments() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 10, false).unwrap();

    engine.insert(b"k1", b"vvvv").unwrap();
    engine.insert(b"k2", b"vvvv").unwrap();
    engine.insert(b"k3", b"vvvv").unwrap();

    assert_eq!(get(&engine, b"k1"), Some(b"vvvv".to_vec()));
    assert_eq!(get(&engine, b"k2"), Some(b"vvvv".to_vec()));
    assert_eq!(get(&engine, b"k3"), Some(b"vvvv".to_vec()));

    let log_files = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .count();
    assert!(log_files >= 2, "expected rotation to produce >= 2 segments, got {log_files}");
}

#[test]
fn scenario_5_reopen_after_rotation_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = Engine::open(dir.path(), 10, false).unwrap();
        engine.insert(b"k1", b"vvvv").unwrap();
        engine.insert(b"k2", b"vvvv").unwrap();
        engine.insert(b"k3", b"vvvv").unwrap();
    }

    let engine = Engine::open(dir.path(), 10, false).unwrap();
    assert_eq!(get(&engine, b"k1"), Some(b"vvvv".to_vec()));
    assert_eq!(get(&engine, b"k2"), Some(b"vvvv".to_vec()));
    assert_eq!(get(&engine, b"k3"), Some(b"vvvv".to_vec()));
}

#[test]
fn scenario_6_bitflip_is_detected_with_checksums_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();
    engine.insert(b"k", b"value").unwrap();
    drop(engine);

    // Flip one byte inside the lone segment's value bytes.
    let log_path = dir.path().join("1.log");
    let mut bytes = std::fs::read(&log_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&log_path, bytes).unwrap();

    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();
    let mut out = Vec::new();
    let err = engine.get(b"k", &mut out).unwrap_err();
    assert!(matches!(err, bitcask::Error::BadEntry(_)));
}

#[test]
fn scenario_7_many_random_pairs_with_deletes_survive_reopen() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    let mut keys = Vec::new();

    {
        let engine = Engine::open(dir.path(), 4096, true).unwrap();

        for i in 0..100 {
            let key = format!("key-{i}").into_bytes();
            let value: Vec<u8> = (0..rng.gen_range(1..32)).map(|_| rng.gen()).collect();
            engine.insert(&key, &value).unwrap();
            model.insert(key.clone(), value);
            keys.push(key);
        }

        for key in keys.iter().take(50) {
            engine.delete(key).unwrap();
            model.remove(key);
        }
    }

    let engine = Engine::open(dir.path(), 4096, true).unwrap();
    for key in &keys {
        match (get(&engine, key), model.get(key)) {
            (Some(actual), Some(expected)) => assert_eq!(&actual, expected),
            (None, None) => {}
            (actual, expected) => panic!("mismatch for {key:?}: {actual:?} vs {expected:?}"),
        }
    }
}

#[test]
fn boundary_key_and_value_sizes_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();

    let key_1 = vec![b'k'; 1];
    let key_255 = vec![b'k'; 255];
    engine.insert(&key_1, b"v").unwrap();
    engine.insert(&key_255, b"v").unwrap();
    assert_eq!(get(&engine, &key_1), Some(b"v".to_vec()));
    assert_eq!(get(&engine, &key_255), Some(b"v".to_vec()));

    let value_1 = vec![b'v'; 1];
    let value_max = vec![b'v'; 0xFFFE];
    engine.insert(b"a", &value_1).unwrap();
    engine.insert(b"b", &value_max).unwrap();
    assert_eq!(get(&engine, b"a"), Some(value_1));
    assert_eq!(get(&engine, b"b"), Some(value_max));
}

#[test]
fn boundary_key_and_value_sizes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 1024 * 1024, true).unwrap();

    let key_0: Vec<u8> = vec![];
    let key_256 = vec![b'k'; 256];
    assert!(matches!(
        engine.insert(&key_0, b"v"),
        Err(bitcask::Error::BadKeyLength(0))
    ));
    assert!(matches!(
        engine.insert(&key_256, b"v"),
        Err(bitcask::Error::BadKeyLength(256))
    ));

    let value_0: Vec<u8> = vec![];
    let value_0xffff = vec![b'v'; 0xFFFF];
    assert!(matches!(
        engine.insert(b"a", &value_0),
        Err(bitcask::Error::BadValueLength(0))
    ));
    assert!(matches!(
        engine.insert(b"a", &value_0xffff),
        Err(bitcask::Error::BadValueLength(0xFFFF))
    ));
}
