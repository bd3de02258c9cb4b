//! Durable backing for the bounded caches.
//! One SQLite table shared by all cache namespaces; `seq` preserves write order
//! so eviction order survives restarts.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    pub seq: u64,
}

/// Persistence seam for `BoundedCache`. Implementations serialize their own
/// access; the cache calls them while holding its write lock.
pub trait CacheStore: Send + Sync {
    /// All entries of `namespace`, oldest write first.
    fn load(&self, namespace: &str) -> Result<Vec<StoredEntry>, StoreError>;
    fn upsert(&self, namespace: &str, key: &str, value: &str, seq: u64) -> Result<(), StoreError>;
    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
}

pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        // WAL mode for concurrent reads during write-through
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::init(conn)?;
        info!(path = %db_path.display(), "forecast cache store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                value TEXT NOT NULL,
                seq INTEGER NOT NULL,
                PRIMARY KEY (namespace, cache_key)
            );
            CREATE INDEX IF NOT EXISTS idx_cache_entries_seq
                ON cache_entries(namespace, seq);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheStore for SqliteCacheStore {
    fn load(&self, namespace: &str) -> Result<Vec<StoredEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT cache_key, value, seq FROM cache_entries
             WHERE namespace = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![namespace], |row| {
            Ok(StoredEntry {
                key: row.get(0)?,
                value: row.get(1)?,
                seq: row.get::<_, i64>(2)? as u64,
            })
        })?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn upsert(&self, namespace: &str, key: &str, value: &str, seq: u64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (namespace, cache_key, value, seq)
             VALUES (?1, ?2, ?3, ?4)",
            params![namespace, key, value, seq as i64],
        )?;
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM cache_entries WHERE namespace = ?1 AND cache_key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }
}

/// Process-lifetime store, used when the database cannot be opened.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<(String, String), (String, u64)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, namespace: &str) -> Result<Vec<StoredEntry>, StoreError> {
        let entries = self.entries.lock();
        let mut out: Vec<StoredEntry> = entries
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((_, key), (value, seq))| StoredEntry {
                key: key.clone(),
                value: value.clone(),
                seq: *seq,
            })
            .collect();
        out.sort_by_key(|e| e.seq);
        Ok(out)
    }

    fn upsert(&self, namespace: &str, key: &str, value: &str, seq: u64) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert((namespace.to_string(), key.to_string()), (value.to_string(), seq));
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
