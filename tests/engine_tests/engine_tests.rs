//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/set/delete operations
//! - Bucket and key not-found errors
//! - Lazy expiry without eviction
//! - Crash recovery from the WAL, including tail repair
//! - Concurrent access patterns

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use emberkv::config::Config;
use emberkv::engine::Engine;
use emberkv::wal::Record;
use emberkv::{EmberError, Lookup};
use tempfile::TempDir;

use super::{restart, setup_temp_engine, setup_temp_engine_with_ttl};

fn value(s: &str) -> Lookup {
    Lookup::Value(s.to_string())
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_open_creates_log_and_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("nested").join("dir").join("db.log");

    let config = Config::builder().log_path(&log_path).build();
    let engine = Engine::open(config).unwrap();

    assert!(log_path.exists());
    assert_eq!(engine.log_path(), log_path.as_path());
    assert!(!engine.is_loaded());
}

#[test]
fn test_engine_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .log_path(temp_dir.path().join("db.log"))
        .ttl(Duration::ZERO)
        .build();

    assert!(matches!(Engine::open(config), Err(EmberError::Config(_))));
}

#[test]
fn test_engine_rejects_ttl_past_timestamp_range() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .log_path(temp_dir.path().join("db.log"))
        .ttl(Duration::from_secs(10_000_000_000_000))
        .build();

    assert!(matches!(Engine::open(config), Err(EmberError::Config(_))));
}

#[test]
fn test_engine_close_syncs() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("users", "1", "Alice").unwrap();
    engine.close().unwrap();

    let engine = restart(&log_path);
    assert_eq!(engine.get("users", "1").unwrap(), value("Alice"));
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_set_get() {
    let (_temp, _path, engine) = setup_temp_engine();

    engine.set("users", "1", "Alice").unwrap();

    assert_eq!(engine.get("users", "1").unwrap(), value("Alice"));
}

#[test]
fn test_engine_get_unknown_bucket() {
    let (_temp, _path, engine) = setup_temp_engine();

    let err = engine.get("nope", "1").unwrap_err();

    assert!(matches!(err, EmberError::BucketNotFound { .. }));
    assert!(err.is_not_found());
}

#[test]
fn test_engine_get_unknown_key() {
    let (_temp, _path, engine) = setup_temp_engine();
    engine.set("users", "1", "Alice").unwrap();

    let err = engine.get("users", "2").unwrap_err();

    assert!(matches!(err, EmberError::KeyNotFound { .. }));
    assert!(err.is_not_found());
}

#[test]
fn test_engine_set_overwrite() {
    let (_temp, _path, engine) = setup_temp_engine();

    engine.set("users", "1", "Alice").unwrap();
    engine.set("users", "1", "Alicia").unwrap();

    assert_eq!(engine.get("users", "1").unwrap(), value("Alicia"));
    assert_eq!(engine.key_count(), 1);
}

#[test]
fn test_engine_value_with_delimiters() {
    let (_temp, log_path, engine) = setup_temp_engine();
    let tricky = "a,b\\c\nd,,";

    engine.set("b,1", "k,2", tricky).unwrap();
    assert_eq!(engine.get("b,1", "k,2").unwrap(), value(tricky));

    drop(engine);
    let engine = restart(&log_path);
    assert_eq!(engine.get("b,1", "k,2").unwrap(), value(tricky));
}

#[test]
fn test_engine_delete() {
    let (_temp, _path, engine) = setup_temp_engine();

    engine.set("users", "1", "Alice").unwrap();
    engine.delete("users", "1").unwrap();

    // The bucket remains, so this is a missing key, not a missing bucket
    assert!(matches!(
        engine.get("users", "1"),
        Err(EmberError::KeyNotFound { .. })
    ));
    assert_eq!(engine.bucket_count(), 1);
}

#[test]
fn test_engine_delete_nonexistent_key_still_logged() {
    let (_temp, log_path, engine) = setup_temp_engine();

    engine.delete("ghost", "1").unwrap();

    let text = fs::read_to_string(&log_path).unwrap();
    assert!(text.starts_with("DELETE,ghost,1,"));
    assert!(matches!(
        engine.get("ghost", "1"),
        Err(EmberError::BucketNotFound { .. })
    ));
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_engine_expired_key_is_reported_not_removed() {
    let (_temp, _path, engine) = setup_temp_engine_with_ttl(Duration::from_millis(50));

    engine.set("users", "1", "Alice").unwrap();
    assert_eq!(engine.get("users", "1").unwrap(), value("Alice"));

    thread::sleep(Duration::from_millis(120));

    assert_eq!(engine.get("users", "1").unwrap(), Lookup::Expired);
    assert_eq!(engine.get("users", "1").unwrap(), Lookup::Expired);
    assert_eq!(engine.key_count(), 1);
}

#[test]
fn test_engine_expired_key_dropped_on_restart() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("db.log");
    {
        let engine = Engine::start(super::config_for(&log_path, Duration::from_millis(50))).unwrap();
        engine.set("users", "1", "Alice").unwrap();
        engine.set("users", "2", "Bob").unwrap();
    }
    thread::sleep(Duration::from_millis(120));

    let engine = restart(&log_path);
    assert_eq!(engine.key_count(), 0);
    assert!(engine.get("users", "1").unwrap_err().is_not_found());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_engine_recovery_from_wal() {
    let (_temp, log_path, engine) = setup_temp_engine();

    engine.set("users", "1", "Alice").unwrap();
    engine.set("users", "2", "Bob").unwrap();
    engine.delete("users", "1").unwrap();
    engine.set("orders", "9", "pending").unwrap();

    // Don't call close() - simulating crash
    drop(engine);

    let engine = restart(&log_path);
    assert!(matches!(
        engine.get("users", "1"),
        Err(EmberError::KeyNotFound { .. })
    ));
    assert_eq!(engine.get("users", "2").unwrap(), value("Bob"));
    assert_eq!(engine.get("orders", "9").unwrap(), value("pending"));
}

#[test]
fn test_engine_no_data_loss_after_repeated_recovery() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("k", "k", "v").unwrap();
    drop(engine);

    let engine = restart(&log_path);
    assert_eq!(engine.get("k", "k").unwrap(), value("v"));
    drop(engine);

    let engine = restart(&log_path);
    assert_eq!(engine.get("k", "k").unwrap(), value("v"));
}

#[test]
fn test_engine_load_repairs_torn_tail() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("users", "1", "Alice").unwrap();
    drop(engine);

    // Crash in the middle of writing a record
    let good_len = fs::metadata(&log_path).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(b"SET,users,2,Bo").unwrap();
    drop(file);

    let engine = restart(&log_path);
    assert_eq!(fs::metadata(&log_path).unwrap().len(), good_len);

    // New appends start on a clean line
    engine.set("users", "3", "Carol").unwrap();
    drop(engine);

    let engine = restart(&log_path);
    assert_eq!(engine.get("users", "1").unwrap(), value("Alice"));
    assert_eq!(engine.get("users", "3").unwrap(), value("Carol"));
}

#[test]
fn test_engine_load_drops_dangling_transaction_so_later_writes_survive() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("users", "1", "Alice").unwrap();
    drop(engine);

    let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(Record::TxBegin.encode().as_bytes()).unwrap();
    file.write_all(Record::delete("users", "1").encode().as_bytes()).unwrap();
    drop(file);

    let engine = restart(&log_path);
    assert_eq!(engine.get("users", "1").unwrap(), value("Alice"));
    engine.set("users", "2", "Bob").unwrap();
    drop(engine);

    // Without the repair, "2" would be folded into the abandoned bracket
    let engine = restart(&log_path);
    assert_eq!(engine.get("users", "2").unwrap(), value("Bob"));
    assert_eq!(engine.get("users", "1").unwrap(), value("Alice"));
}

#[test]
fn test_engine_load_reports_stats() {
    let (_temp, log_path, engine) = setup_temp_engine();
    engine.set("a", "1", "x").unwrap();
    engine
        .update(|tx| {
            tx.set("a", "2", "y");
            Ok::<_, EmberError>(())
        })
        .unwrap();
    drop(engine);

    let engine = Engine::open(super::config_for(&log_path, Duration::from_secs(600))).unwrap();
    let result = engine.load().unwrap();

    assert_eq!(result.records_applied, 2);
    assert_eq!(result.transactions_committed, 1);
    assert!(!result.was_truncated);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_engine_concurrent_reads() {
    let (_temp, _path, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    for i in 0..100 {
        engine.set("bucket", &format!("key{}", i), &format!("value{}", i)).unwrap();
    }

    let mut handles = vec![];
    for _ in 0..4 {
        let engine_clone = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let result = engine_clone.get("bucket", &format!("key{}", i)).unwrap();
                assert_eq!(result, Lookup::Value(format!("value{}", i)));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_engine_concurrent_writes_same_key() {
    let (_temp, log_path, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    let writers = 8;

    let mut handles = vec![];
    for t in 0..writers {
        let engine_clone = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let value = format!("writer-{}-{}", t, "x".repeat(256));
            engine_clone.set("shared", "key", &value).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<String> = (0..writers)
        .map(|t| format!("writer-{}-{}", t, "x".repeat(256)))
        .collect();

    let got = match engine.get("shared", "key").unwrap() {
        Lookup::Value(v) => v,
        Lookup::Expired => panic!("unexpected expiry"),
    };
    assert!(expected.contains(&got));

    // The log agrees with memory: the last record written is the winner
    drop(engine);
    let engine = restart(&log_path);
    assert_eq!(engine.get("shared", "key").unwrap(), Lookup::Value(got));
}

#[test]
fn test_engine_concurrent_mixed_workload() {
    let (_temp, log_path, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let mut handles = vec![];
    for t in 0..4 {
        let engine_clone = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let bucket = format!("b{}", t);
            for i in 0..50 {
                engine_clone.set(&bucket, &i.to_string(), "v").unwrap();
                if i % 5 == 0 {
                    engine_clone.delete(&bucket, &i.to_string()).unwrap();
                }
                let _ = engine_clone.get(&bucket, &i.to_string());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.key_count(), 4 * 40);
    drop(engine);
    assert_eq!(restart(&log_path).key_count(), 4 * 40);
}
