//! Tests for Engine::merge
//!
//! These tests verify:
//! - The compacted log holds one SET per live key
//! - Merge does not change what reads return
//! - Merging twice is idempotent
//! - The engine keeps appending to the new log
//! - Optional eviction of expired entries

use std::fs;
use std::thread;
use std::time::Duration;

use emberkv::compaction::Compactor;
use emberkv::config::Config;
use emberkv::engine::Engine;
use emberkv::{EmberError, Lookup};
use tempfile::TempDir;

use super::{restart, setup_temp_engine, setup_temp_engine_with_ttl};

fn line_count(path: &std::path::Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

#[test]
fn test_merge_collapses_history() {
    let (_temp, log_path, engine) = setup_temp_engine();

    for i in 0..10 {
        engine.set("users", "1", &format!("v{}", i)).unwrap();
    }
    engine.set("users", "2", "Bob").unwrap();
    engine.set("users", "3", "Carol").unwrap();
    engine.delete("users", "3").unwrap();
    engine
        .update(|tx| {
            tx.set("orders", "1", "pending");
            Ok::<_, EmberError>(())
        })
        .unwrap();
    assert_eq!(line_count(&log_path), 16);

    let stats = engine.merge().unwrap();

    assert_eq!(stats.records_written, 3);
    assert_eq!(line_count(&log_path), 3);
    assert!(fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .all(|l| l.starts_with("SET,")));
    assert!(!Compactor::temp_path(&log_path).exists());

    assert_eq!(engine.get("users", "1").unwrap(), Lookup::Value("v9".into()));
}

#[test]
fn test_merge_twice_is_idempotent() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("a", "1", "x").unwrap();
    engine.set("b", "2", "y,z").unwrap();

    engine.merge().unwrap();
    let first = restart_snapshot(&log_path);
    engine.merge().unwrap();
    let second = restart_snapshot(&log_path);

    assert_eq!(first, second);
    assert_eq!(first, vec![
        ("a".to_string(), "1".to_string(), "x".to_string()),
        ("b".to_string(), "2".to_string(), "y,z".to_string()),
    ]);
}

fn restart_snapshot(log_path: &std::path::Path) -> Vec<(String, String, String)> {
    let (index, _) = emberkv::wal::WalRecovery::replay(log_path, chrono::Utc::now()).unwrap();
    let mut rows: Vec<_> = index
        .iter()
        .map(|(b, k, e)| (b.to_string(), k.to_string(), e.value.clone()))
        .collect();
    rows.sort();
    rows
}

#[test]
fn test_writes_after_merge_go_to_new_log() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("a", "1", "x").unwrap();
    engine.merge().unwrap();

    engine.set("a", "2", "y").unwrap();
    engine
        .update(|tx| {
            tx.set("a", "3", "z");
            Ok::<_, EmberError>(())
        })
        .unwrap();
    drop(engine);

    let engine = restart(&log_path);
    assert_eq!(engine.get("a", "1").unwrap(), Lookup::Value("x".into()));
    assert_eq!(engine.get("a", "2").unwrap(), Lookup::Value("y".into()));
    assert_eq!(engine.get("a", "3").unwrap(), Lookup::Value("z".into()));
}

#[test]
fn test_merge_drops_expired_from_log_but_not_memory() {
    let (_temp, log_path, engine) = setup_temp_engine_with_ttl(Duration::from_millis(50));
    engine.set("users", "1", "Alice").unwrap();
    thread::sleep(Duration::from_millis(120));

    let stats = engine.merge().unwrap();

    assert_eq!(stats.records_written, 0);
    assert_eq!(stats.expired_skipped, 1);
    assert_eq!(stats.evicted, 0);
    assert_eq!(line_count(&log_path), 0);
    assert_eq!(engine.get("users", "1").unwrap(), Lookup::Expired);
}

#[test]
fn test_merge_with_eviction() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("db.log");
    let config = Config::builder()
        .log_path(&log_path)
        .ttl(Duration::from_millis(50))
        .evict_expired_on_merge(true)
        .build();
    let engine = Engine::start(config).unwrap();

    engine.set("users", "1", "Alice").unwrap();
    thread::sleep(Duration::from_millis(120));

    let stats = engine.merge().unwrap();

    assert_eq!(stats.evicted, 1);
    assert_eq!(engine.key_count(), 0);
    assert!(matches!(
        engine.get("users", "1"),
        Err(EmberError::KeyNotFound { .. })
    ));
}

#[test]
fn test_merge_aborts_when_temp_file_cannot_be_created() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("a", "1", "x").unwrap();
    let before = fs::read(&log_path).unwrap();

    // A directory where the temp file should go makes File::create fail
    fs::create_dir(Compactor::temp_path(&log_path)).unwrap();

    assert!(engine.merge().is_err());
    assert_eq!(fs::read(&log_path).unwrap(), before);

    // Still writable through the original handle
    engine.set("a", "2", "y").unwrap();
    drop(engine);
    fs::remove_dir(Compactor::temp_path(&log_path)).unwrap();
    assert_eq!(restart(&log_path).key_count(), 2);
}

#[cfg(unix)]
#[test]
fn test_merge_failure_after_closing_log_is_fatal() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("a", "1", "x").unwrap();

    // A non-empty directory in place of the log: the rename and the
    // reopen both fail
    fs::remove_file(&log_path).unwrap();
    fs::create_dir(&log_path).unwrap();
    fs::write(log_path.join("occupied"), b"x").unwrap();

    assert!(matches!(engine.merge(), Err(EmberError::Compaction(_))));
    assert!(!Compactor::temp_path(&log_path).exists());

    // Memory is intact but the log handle is gone
    assert_eq!(engine.get("a", "1").unwrap(), Lookup::Value("x".into()));
    assert!(matches!(
        engine.set("a", "2", "y"),
        Err(EmberError::WalUnavailable)
    ));
    assert!(matches!(
        engine.update(|tx| {
            tx.set("a", "3", "z");
            Ok::<_, EmberError>(())
        }),
        Err(EmberError::WalUnavailable)
    ));
    assert!(matches!(engine.merge(), Err(EmberError::Compaction(_))));
}
