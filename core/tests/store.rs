mod common;

use common::{day, init_logging};
use dealfeed_core::{
    store::{
        anonymous_user_id, ClientStorage, DailyIdSet, MemoryStorage, PersistedSet, SqliteStorage,
        ANON_USER_KEY, DISMISSED_KEY, SAVED_KEY,
    },
};
use std::rc::Rc;

// ── Test helpers ────────────────────────────────────────────────────────────

fn set_for(d: u32, ids: &[&str]) -> DailyIdSet {
    let mut set = DailyIdSet::for_day(day(d));
    for id in ids {
        set.insert(id);
    }
    set
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn sqlite_file_survives_reopen() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.db");
    let path = path.to_str().unwrap();

    {
        let storage = SqliteStorage::open(path).unwrap();
        storage.migrate().unwrap();
        let set = PersistedSet::new(Box::new(storage), DISMISSED_KEY);
        set.save(&set_for(16, &["a", "b"])).unwrap();
        // Upsert, not insert.
        set.save(&set_for(16, &["a", "b", "c"])).unwrap();
    }

    let storage = SqliteStorage::open(path).unwrap();
    storage.migrate().unwrap();
    let set = PersistedSet::new(Box::new(storage), DISMISSED_KEY);
    let loaded = set.load(day(16));
    assert_eq!(loaded.ids, vec!["a", "b", "c"]);
}

#[test]
fn keys_are_independent() {
    let storage = Rc::new(SqliteStorage::in_memory().unwrap());
    storage.migrate().unwrap();
    let dismissed = PersistedSet::new(Box::new(Rc::clone(&storage)), DISMISSED_KEY);
    let saved = PersistedSet::new(Box::new(Rc::clone(&storage)), SAVED_KEY);

    dismissed.save(&set_for(16, &["x"])).unwrap();
    assert!(saved.load(day(16)).is_empty());
    assert_eq!(dismissed.load(day(16)).len(), 1);
}

#[test]
fn missing_record_loads_empty_for_today() {
    let set = PersistedSet::new(Box::new(MemoryStorage::new()), DISMISSED_KEY);
    let loaded = set.load(day(16));
    assert!(loaded.is_empty());
    assert!(loaded.is_for(day(16)));
}

#[test]
fn malformed_record_loads_empty() {
    let storage = MemoryStorage::new();
    for raw in ["not json", "{\"date\": 5}", "[]", "{\"ids\": [\"a\"]}"] {
        storage.put_raw(DISMISSED_KEY, raw);
        let set = PersistedSet::new(Box::new(storage.clone()), DISMISSED_KEY);
        assert!(set.load(day(16)).is_empty(), "{raw} did not load as empty");
    }
}

#[test]
fn stale_or_undated_record_loads_empty() {
    let storage = MemoryStorage::new();
    let set = PersistedSet::new(Box::new(storage.clone()), DISMISSED_KEY);

    set.save(&set_for(15, &["old"])).unwrap();
    assert!(set.load(day(16)).is_empty());

    storage.put_raw(DISMISSED_KEY, r#"{"date":"yesterday","ids":["old"]}"#);
    assert!(set.load(day(16)).is_empty());
    assert!(DailyIdSet { date: "yesterday".into(), ids: vec![] }.day().is_err());
}

#[test]
fn daily_set_ignores_duplicate_inserts() {
    let mut set = DailyIdSet::for_day(day(16));
    assert!(set.insert("a"));
    assert!(!set.insert("a"));
    assert_eq!(set.len(), 1);
    assert!(set.remove("a"));
    assert!(!set.remove("a"));
}

#[test]
fn anonymous_id_is_generated_once() {
    let storage = MemoryStorage::new();
    let first = anonymous_user_id(&storage);
    assert!(first.starts_with("anon-"));
    assert_eq!(anonymous_user_id(&storage), first);
    assert_eq!(storage.read(ANON_USER_KEY).unwrap().as_deref(), Some(first.as_str()));

    let other = anonymous_user_id(&MemoryStorage::new());
    assert_ne!(first, other);
}
