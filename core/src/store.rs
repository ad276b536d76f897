//! Client-state persistence.
//!
//! RULE: Only store.rs talks to storage backends.
//! The deck and saved-deal set receive a PersistedSet; they never read or
//! write raw keys themselves, and nothing here is a process-wide singleton.
//!
//! Every stored record is a daily id set `{ "date": "YYYY-MM-DD", "ids": [..] }`.
//! A record from another day, or one that fails to parse, loads as empty.

use crate::{
    error::{FeedError, FeedResult},
    types::DealId,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const DISMISSED_KEY: &str = "dismissed_deals";
pub const SAVED_KEY: &str = "saved_deals";
pub const ANON_USER_KEY: &str = "anon_user_id";

/// Narrow key-value contract the engine needs from durable client storage.
pub trait ClientStorage {
    fn read(&self, key: &str) -> FeedResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> FeedResult<()>;
}

impl<S: ClientStorage + ?Sized> ClientStorage for Rc<S> {
    fn read(&self, key: &str) -> FeedResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> FeedResult<()> {
        (**self).write(key, value)
    }
}

// ── SQLite ─────────────────────────────────────────────────────────

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) the client-state database at `path`.
    pub fn open(path: &str) -> FeedResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files; in-memory databases ignore it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> FeedResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> FeedResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_client_state.sql"))?;
        Ok(())
    }
}

impl ClientStorage for SqliteStorage {
    fn read(&self, key: &str) -> FeedResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM client_state WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write(&self, key: &str, value: &str) -> FeedResult<()> {
        self.conn.execute(
            "INSERT INTO client_state (key, payload, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload,
                                            updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ── In-memory ──────────────────────────────────────────────────────

/// Storage held in process memory. Clones share entries, so tests can
/// inspect what the deck wrote after handing it a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
    writes:  Rc<RefCell<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Seed a raw payload, malformed or not.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
    }

    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl ClientStorage for MemoryStorage {
    fn read(&self, key: &str) -> FeedResult<Option<String>> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, value: &str) -> FeedResult<()> {
        self.put_raw(key, value);
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

// ── Daily id set ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyIdSet {
    pub date: String,
    pub ids:  Vec<DealId>,
}

impl DailyIdSet {
    pub fn for_day(date: NaiveDate) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            ids:  Vec::new(),
        }
    }

    pub fn day(&self) -> FeedResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| FeedError::InvalidDate { value: self.date.clone() })
    }

    pub fn is_for(&self, date: NaiveDate) -> bool {
        self.day().is_ok_and(|d| d == date)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|i| i != id);
        self.ids.len() != before
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One daily id set bound to a storage key.
pub struct PersistedSet {
    storage: Box<dyn ClientStorage>,
    key:     String,
}

impl PersistedSet {
    pub fn new(storage: Box<dyn ClientStorage>, key: &str) -> Self {
        Self { storage, key: key.to_string() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Never fails: unreadable, malformed, or stale records load as empty.
    pub fn load(&self, today: NaiveDate) -> DailyIdSet {
        let raw = match self.storage.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return DailyIdSet::for_day(today),
            Err(e) => {
                log::warn!("store: cannot read '{}': {e}; starting empty", self.key);
                return DailyIdSet::for_day(today);
            }
        };

        match serde_json::from_str::<DailyIdSet>(&raw) {
            Ok(set) if set.is_for(today) => set,
            Ok(set) => {
                log::debug!("store: '{}' is from {}, discarded for {today}", self.key, set.date);
                DailyIdSet::for_day(today)
            }
            Err(e) => {
                log::warn!("store: malformed '{}' record discarded: {e}", self.key);
                DailyIdSet::for_day(today)
            }
        }
    }

    pub fn save(&self, set: &DailyIdSet) -> FeedResult<()> {
        let json = serde_json::to_string(set)?;
        self.storage.write(&self.key, &json)
    }
}

/// The persisted anonymous user id, generated on first use.
pub fn anonymous_user_id(storage: &dyn ClientStorage) -> String {
    match storage.read(ANON_USER_KEY) {
        Ok(Some(id)) if !id.trim().is_empty() => return id,
        Ok(_) => {}
        Err(e) => log::warn!("store: cannot read anonymous id: {e}"),
    }
    let id = format!("anon-{}", uuid::Uuid::new_v4());
    if let Err(e) = storage.write(ANON_USER_KEY, &id) {
        log::warn!("store: cannot persist anonymous id: {e}");
    }
    id
}
