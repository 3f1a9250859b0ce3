//! Tests for the record store
//!
//! These tests verify:
//! - Basic CRUD and search operations
//! - Student-code uniqueness under concurrent creates
//! - Keep-if-absent update merge semantics
//! - ID monotonicity and uniqueness invariants
//! - Reader consistency during concurrent mutation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rosterdb::table::Table;
use rosterdb::{
    Config, DeleteConfirmation, RecordDraft, RecordPatch, RosterError, Store,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .lock_timeout(Duration::from_secs(5))
        .lock_poll_interval(Duration::from_millis(10))
        .build();
    let store = Store::open(config).unwrap();
    (temp, store)
}

fn draft(code: &str, first: &str, last: &str) -> RecordDraft {
    RecordDraft {
        student_code: code.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}.{}@example.edu", first.to_lowercase(), last.to_lowercase()),
        phone: "5550100".to_string(),
        gpa: 16.5,
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_initializes_header_only_table() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("roster");

    let store = Store::open_path(&data_dir).unwrap();

    assert!(store.table_path().exists());
    assert!(store.list().unwrap().is_empty());
    assert_eq!(store.next_id_preview().unwrap(), 1);
}

#[test]
fn test_reopen_preserves_records() {
    let temp = TempDir::new().unwrap();

    {
        let store = Store::open_path(temp.path()).unwrap();
        store.create(draft("12345678", "Ada", "Lovelace")).unwrap();
    }

    let store = Store::open_path(temp.path()).unwrap();
    assert_eq!(store.list().unwrap().len(), 1);
}

// =============================================================================
// Create / Read Tests
// =============================================================================

#[test]
fn test_create_assigns_sequential_ids() {
    let (_temp, store) = setup_temp_store();

    let a = store.create(draft("11111111", "Ada", "Lovelace")).unwrap();
    let b = store.create(draft("22222222", "Grace", "Hopper")).unwrap();

    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert!(!a.registered_at.is_empty());
}

#[test]
fn test_create_then_read_roundtrip_with_delimiter_in_name() {
    // Scenario: a name containing the delimiter must survive intact
    let (_temp, store) = setup_temp_store();

    let mut d = draft("12345678", "Ada", "Lovelace");
    d.first_name = "Ada,Lovelace".to_string();
    let created = store.create(d).unwrap();

    // Encoded row carries the name quoted
    let raw = std::fs::read_to_string(store.table_path()).unwrap();
    assert!(raw.contains("\"Ada,Lovelace\""));

    let read = store.read(created.id).unwrap();
    assert_eq!(read.first_name, "Ada,Lovelace");
    assert_eq!(read, created);
}

#[test]
fn test_create_duplicate_code_rejected() {
    let (_temp, store) = setup_temp_store();

    store.create(draft("12345678", "Ada", "Lovelace")).unwrap();
    let err = store.create(draft("12345678", "Grace", "Hopper")).unwrap_err();

    assert!(matches!(err, RosterError::DuplicateCode { .. }));
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_create_sanitizes_student_code() {
    let (_temp, store) = setup_temp_store();

    let created = store.create(draft("  12345678\t", "Ada", "Lovelace")).unwrap();
    assert_eq!(created.student_code, "12345678");

    // The sanitized code participates in uniqueness
    let err = store.create(draft("12345678", "Grace", "Hopper")).unwrap_err();
    assert!(matches!(err, RosterError::DuplicateCode { .. }));
}

#[test]
fn test_create_rejects_malformed_student_code() {
    let (_temp, store) = setup_temp_store();

    for bad in ["abc", "1234567", "12345678901", "12 345 678", ""] {
        let err = store.create(draft(bad, "Ada", "Lovelace")).unwrap_err();
        assert!(
            matches!(err, RosterError::InvalidCode { .. }),
            "code {:?} must be rejected before commit",
            bad
        );
    }
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_read_missing_id_is_not_found() {
    let (_temp, store) = setup_temp_store();
    let err = store.read(42).unwrap_err();
    assert!(matches!(err, RosterError::NotFound { id: 42 }));
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_keeps_unspecified_fields() {
    let (_temp, store) = setup_temp_store();
    let created = store.create(draft("12345678", "Ada", "Lovelace")).unwrap();

    let updated = store
        .update(
            created.id,
            RecordPatch {
                email: Some("countess@example.edu".to_string()),
                gpa: Some(19.5),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.email, "countess@example.edu");
    assert_eq!(updated.gpa, 19.5);
    // Everything else untouched
    assert_eq!(updated.first_name, "Ada");
    assert_eq!(updated.student_code, "12345678");
    assert_eq!(updated.registered_at, created.registered_at);
    assert_eq!(store.read(created.id).unwrap(), updated);
}

#[test]
fn test_update_own_code_unchanged_is_allowed() {
    let (_temp, store) = setup_temp_store();
    let created = store.create(draft("12345678", "Ada", "Lovelace")).unwrap();

    // Re-submitting the same code must not trip the uniqueness check
    store
        .update(
            created.id,
            RecordPatch {
                student_code: Some("12345678".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
}

#[test]
fn test_update_to_taken_code_rejected() {
    let (_temp, store) = setup_temp_store();
    store.create(draft("11111111", "Ada", "Lovelace")).unwrap();
    let second = store.create(draft("22222222", "Grace", "Hopper")).unwrap();

    let err = store
        .update(
            second.id,
            RecordPatch {
                student_code: Some("11111111".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, RosterError::DuplicateCode { .. }));
    assert_eq!(store.read(second.id).unwrap().student_code, "22222222");
}

#[test]
fn test_update_rejects_malformed_student_code() {
    let (_temp, store) = setup_temp_store();
    let created = store.create(draft("12345678", "Ada", "Lovelace")).unwrap();

    let err = store
        .update(
            created.id,
            RecordPatch {
                student_code: Some("not-a-code".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, RosterError::InvalidCode { .. }));
    assert_eq!(store.read(created.id).unwrap().student_code, "12345678");
}

#[test]
fn test_update_missing_id_is_not_found() {
    let (_temp, store) = setup_temp_store();
    let err = store.update(7, RecordPatch::default()).unwrap_err();
    assert!(matches!(err, RosterError::NotFound { id: 7 }));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_removes_record() {
    let (_temp, store) = setup_temp_store();
    let created = store.create(draft("12345678", "Ada", "Lovelace")).unwrap();

    let removed = store.delete(created.id, DeleteConfirmation::confirmed()).unwrap();
    assert_eq!(removed.id, created.id);
    assert!(matches!(
        store.read(created.id).unwrap_err(),
        RosterError::NotFound { .. }
    ));
}

#[test]
fn test_delete_missing_id_leaves_table_unchanged() {
    // Scenario: delete(5) on a 3-record table with no ID 5
    let (_temp, store) = setup_temp_store();
    store.create(draft("11111111", "Ada", "Lovelace")).unwrap();
    store.create(draft("22222222", "Grace", "Hopper")).unwrap();
    store.create(draft("33333333", "Edsger", "Dijkstra")).unwrap();

    let before = std::fs::read_to_string(store.table_path()).unwrap();
    let err = store.delete(5, DeleteConfirmation::confirmed()).unwrap_err();

    assert!(matches!(err, RosterError::NotFound { id: 5 }));
    assert_eq!(std::fs::read_to_string(store.table_path()).unwrap(), before);
}

// =============================================================================
// List / Search Tests
// =============================================================================

#[test]
fn test_search_is_case_insensitive_over_searchable_fields() {
    let (_temp, store) = setup_temp_store();
    store.create(draft("11111111", "Ada", "Lovelace")).unwrap();
    store.create(draft("22222222", "Grace", "Hopper")).unwrap();

    assert_eq!(store.search("LOVELACE").unwrap().len(), 1);
    assert_eq!(store.search("grace.hopper@").unwrap().len(), 1);
    assert_eq!(store.search("2222").unwrap().len(), 1);
    assert_eq!(store.search("example.edu").unwrap().len(), 2);
    assert!(store.search("turing").unwrap().is_empty());
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
fn test_ids_and_codes_stay_unique_over_mixed_operations() {
    let (_temp, store) = setup_temp_store();

    for i in 0..6u64 {
        store
            .create(draft(&format!("1000000{}", i), "First", "Last"))
            .unwrap();
    }
    store.delete(2, DeleteConfirmation::confirmed()).unwrap();
    store.delete(4, DeleteConfirmation::confirmed()).unwrap();
    store
        .update(
            5,
            RecordPatch {
                student_code: Some("99999999".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    store.create(draft("88888888", "New", "Comer")).unwrap();

    let records = store.list().unwrap();
    let mut ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    let mut codes: Vec<&str> = records.iter().map(|r| r.student_code.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(ids.len(), records.len());
    assert_eq!(codes.len(), records.len());
}

#[test]
fn test_max_id_never_decreases_after_create() {
    let (_temp, store) = setup_temp_store();

    let mut max_seen = 0;
    for i in 0..5u64 {
        let record = store
            .create(draft(&format!("2000000{}", i), "First", "Last"))
            .unwrap();
        assert!(record.id > max_seen);
        max_seen = record.id;
    }
    assert_eq!(store.next_id_preview().unwrap(), max_seen + 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_creates_with_same_code_one_wins() {
    // Scenario: two writers race on the same student code within the lock
    // timeout window; exactly one commits
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store.create(draft("31415926", "Race", "Runner"))
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(RosterError::DuplicateCode { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(duplicates, 1);
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_concurrent_creates_assign_distinct_ids() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store
                .create(draft(&format!("4000000{}", i), "Par", "Allel"))
                .unwrap()
                .id
        }));
    }

    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[test]
fn test_reader_sees_consistent_table_during_mutations() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                // Every observed file state must parse as a complete table
                let table = Table::load(store.table_path()).unwrap();
                for record in table.records() {
                    assert!(!record.student_code.is_empty());
                }
            }
        })
    };

    for i in 0..20u64 {
        store
            .create(draft(&format!("5000{:04}", i), "Bulk", "Writer"))
            .unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();
    assert_eq!(store.list().unwrap().len(), 20);
}
