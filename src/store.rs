//! Append-only SQLite sink for metric samples.
//!
//! Every source writes to its own table with the layout
//! `(id, timestamp, target, label, cpu, memory)`. Rows are only ever inserted;
//! values are always bound as parameters.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info_span};

use crate::sample::Sample;

/// Text layout of persisted timestamps (local time, microseconds).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Errors from [`MetricStore`] operations.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite error.
    Sqlite(rusqlite::Error),
    /// Connection mutex was poisoned by a panicking writer.
    Poisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "SQLite error: {e}"),
            Self::Poisoned => write!(f, "store connection lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Poisoned => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// A table name that is safe to splice into DDL/DML.
///
/// SQLite cannot bind identifiers, so table names are restricted to
/// `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, String> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!(
                "Invalid table name '{}': expected [A-Za-z_][A-Za-z0-9_]*",
                name
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TableName::new(&value)
    }
}

impl From<TableName> for String {
    fn from(t: TableName) -> Self {
        t.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable, append-only destination for samples.
///
/// Implementations must tolerate calls from several worker threads.
pub trait MetricStore: Send + Sync {
    /// Creates `table` if absent. Safe to call on every run.
    fn ensure_schema(&self, table: &TableName) -> Result<(), StoreError>;

    /// Appends one row per tuple of `sample`, returning the number of rows.
    fn append(&self, table: &TableName, sample: &Sample) -> Result<usize, StoreError>;
}

/// SQLite-backed metric store.
///
/// A single connection is shared behind a mutex, so appends from the worker
/// pool are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let _span = info_span!("store_open", path = %db_path.display()).entered();

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &TableName) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }
}

impl MetricStore for SqliteStore {
    fn ensure_schema(&self, table: &TableName) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP,
                target    TEXT,
                label     TEXT,
                cpu       REAL,
                memory    REAL
            );"
        ))?;
        debug!("Schema ensured for table {}", table);
        Ok(())
    }

    fn append(&self, table: &TableName, sample: &Sample) -> Result<usize, StoreError> {
        if sample.tuples.is_empty() {
            return Ok(0);
        }

        let timestamp = sample.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO \"{table}\" (timestamp, target, label, cpu, memory) \
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            for t in &sample.tuples {
                stmt.execute(params![timestamp, sample.target, t.label, t.cpu_percent, t.memory])?;
            }
        }
        tx.commit()?;

        debug!(
            "Appended {} rows for {} into {}",
            sample.tuples.len(),
            sample.target,
            table
        );
        Ok(sample.tuples.len())
    }
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}
