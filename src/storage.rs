//! SQLite-backed event storage.
//!
//! [`EventStore`] owns the single database connection for a process invocation. It is
//! passed by reference into ingestion and query and closes the connection when dropped,
//! on success and error paths alike.

use crate::codec::{format_timestamp, parse_timestamp};
use crate::error::DbError;
use crate::filter::PredicateSet;
use crate::types::Event;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    ts_unix INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_user_timestamp ON events(user_id, ts_unix);
CREATE INDEX IF NOT EXISTS idx_user_type_timestamp ON events(user_id, event_type, ts_unix);
";

const INSERT_SQL: &str =
    "INSERT INTO events (user_id, timestamp, ts_unix, event_type, payload) VALUES (?1, ?2, ?3, ?4, ?5)";

/// Connection tuning applied on open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub journal_mode: String,
    pub synchronous: String,
    /// SQLite `cache_size` (pages when positive, KiB when negative).
    pub cache_size: i64,
    pub temp_store: String,
    pub mmap_size: i64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
            cache_size: 10_000,
            temp_store: "MEMORY".to_string(),
            mmap_size: 256 * 1024 * 1024,
        }
    }
}

/// Something that can durably write a batch of events as one atomic unit.
///
/// Either every event of the batch is persisted or none is.
pub trait BatchSink {
    fn write_batch(&mut self, events: &[Event]) -> Result<(), DbError>;
}

/// Summary statistics over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_events: u64,
    pub unique_users: u64,
    /// Canonical timestamp of the earliest event, if any.
    pub earliest: Option<String>,
    /// Canonical timestamp of the latest event, if any.
    pub latest: Option<String>,
}

/// The owned storage session.
#[derive(Debug)]
pub struct EventStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl EventStore {
    /// Opens (creating if needed) the database at `path`, applies `options` and ensures the
    /// schema and indexes exist.
    ///
    /// # Errors
    /// Returns [`DbError::Storage`] if the file cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::initialize(&conn, options)?;
        Ok(EventStore {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates a private in-memory store. Mostly useful for tests.
    pub fn in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn, &StoreOptions::default())?;
        Ok(EventStore { conn, path: None })
    }

    fn initialize(conn: &Connection, options: &StoreOptions) -> Result<(), DbError> {
        // journal_mode answers with the resulting mode ("memory" for in-memory databases).
        let _mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            options.journal_mode.as_str(),
            |row| row.get(0),
        )?;
        conn.pragma_update(None, "synchronous", options.synchronous.as_str())?;
        conn.pragma_update(None, "cache_size", options.cache_size)?;
        conn.pragma_update(None, "temp_store", options.temp_store.as_str())?;
        conn.pragma_update(None, "mmap_size", options.mmap_size)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Streams events matching `predicates` in ascending timestamp order into `visit`.
    ///
    /// Rows are decoded one at a time from the open cursor. Returns the number of events
    /// visited.
    ///
    /// # Errors
    /// Failures while iterating are wrapped in [`DbError::Aborted`] carrying the number of
    /// events already delivered. A stored timestamp that no longer parses is reported as
    /// [`DbError::Corruption`].
    pub fn scan<F>(&self, predicates: &PredicateSet, mut visit: F) -> Result<u64, DbError>
    where
        F: FnMut(Event) -> Result<(), DbError>,
    {
        let sql = format!(
            "SELECT id, timestamp, user_id, event_type, payload FROM events WHERE {} ORDER BY ts_unix, id",
            predicates.where_clause()
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params_from_iter(predicates.params()))?;

        let mut count = 0u64;
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(DbError::aborted(count, e.into())),
            };
            let event = row_to_event(row).map_err(|e| DbError::aborted(count, e))?;
            visit(event).map_err(|e| DbError::aborted(count, e))?;
            count += 1;
        }
        Ok(count)
    }

    /// Total number of stored events.
    pub fn count(&self) -> Result<u64, DbError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Event count, distinct users and the covered time range.
    pub fn stats(&self) -> Result<StoreStats, DbError> {
        let (total, users): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT user_id) FROM events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let earliest: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM events ORDER BY ts_unix ASC, id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let latest: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM events ORDER BY ts_unix DESC, id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(StoreStats {
            total_events: total as u64,
            unique_users: users as u64,
            earliest,
            latest,
        })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl BatchSink for EventStore {
    /// Inserts all events in one transaction. The transaction rolls back on drop if any
    /// insert or the commit fails.
    fn write_batch(&mut self, events: &[Event]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for event in events {
                stmt.execute(params![
                    event.user_id,
                    format_timestamp(&event.timestamp),
                    event.timestamp.timestamp(),
                    event.event_type,
                    event.payload,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn row_to_event(row: &Row<'_>) -> Result<Event, DbError> {
    let id: i64 = row.get(0)?;
    let raw_ts: String = row.get(1)?;
    let timestamp = parse_timestamp(&raw_ts).map_err(|e| DbError::Corruption {
        details: format!("stored timestamp {:?} does not parse: {}", raw_ts, e),
        row_id: Some(id),
    })?;
    Ok(Event {
        timestamp,
        user_id: row.get(2)?,
        event_type: row.get(3)?,
        payload: row.get(4)?,
    })
}
