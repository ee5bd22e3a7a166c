//! Core API: configuration and the [`EventLog`] facade tying storage, ingestion and query together.

use crate::error::DbError;
use crate::ingest::{ingest, IngestOptions, IngestReport, DEFAULT_BATCH_SIZE};
use crate::query::execute_query;
use crate::storage::{EventStore, StoreOptions, StoreStats};
use crate::telemetry::{noop_event_listener, DbEvent, DbEventListener};
use crate::types::{Event, QueryFilters, UserId};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Configuration options for the EventLog
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Maximum number of events committed per ingestion transaction
    pub batch_size: usize,
    /// Connection pragmas
    pub store: StoreOptions,
    /// Structured event hook for observability (no-op by default).
    pub event_listener: Arc<dyn DbEventListener>,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            db_path: PathBuf::from("events.db"),
            batch_size: DEFAULT_BATCH_SIZE,
            store: StoreOptions::default(),
            event_listener: noop_event_listener(),
        }
    }
}

impl DbConfig {
    /// Checks values that would otherwise only fail deep inside an operation.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.batch_size == 0 {
            return Err(DbError::ConfigError(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(DbError::ConfigError("db_path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// An open event log: one owned storage session plus its configuration.
///
/// Dropping the `EventLog` closes the database.
#[derive(Debug)]
pub struct EventLog {
    store: EventStore,
    config: DbConfig,
}

impl EventLog {
    /// Opens (or creates) the database at `config.db_path`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the database cannot be opened.
    pub fn open(config: DbConfig) -> Result<Self, DbError> {
        config.validate()?;
        let store = EventStore::open(&config.db_path, &config.store)?;
        Ok(EventLog { store, config })
    }

    /// Wraps an already opened store. `config.db_path` is informational only.
    pub fn with_store(store: EventStore, config: DbConfig) -> Result<Self, DbError> {
        config.validate()?;
        Ok(EventLog { store, config })
    }

    /// Ingests the file at `path`. See [`crate::ingest::ingest`] for batching and skip rules.
    ///
    /// # Errors
    /// [`DbError::Io`] if the file cannot be opened; otherwise as for [`EventLog::ingest`].
    pub fn record<P: AsRef<Path>>(&mut self, path: P) -> Result<IngestReport, DbError> {
        let file = File::open(path.as_ref())?;
        self.ingest(BufReader::new(file))
    }

    /// Ingests every line of `reader`.
    pub fn ingest<R: BufRead>(&mut self, reader: R) -> Result<IngestReport, DbError> {
        let options = IngestOptions {
            batch_size: self.config.batch_size,
        };
        ingest(
            reader,
            &mut self.store,
            &options,
            self.config.event_listener.as_ref(),
        )
    }

    /// Streams `user_id`'s events matching `filters` into `visit`, oldest first.
    ///
    /// Returns the number of events delivered. See [`crate::query::execute_query`].
    pub fn query<F>(&self, user_id: UserId, filters: &QueryFilters, visit: F) -> Result<u64, DbError>
    where
        F: FnMut(Event) -> Result<(), DbError>,
    {
        let started = Instant::now();
        let rows = execute_query(&self.store, user_id, filters, visit)?;
        self.config.event_listener.on_event(DbEvent::QueryFinished {
            user_id,
            rows,
            duration: started.elapsed(),
        });
        Ok(rows)
    }

    /// Like [`EventLog::query`], collecting into a `Vec`.
    pub fn query_all(&self, user_id: UserId, filters: &QueryFilters) -> Result<Vec<Event>, DbError> {
        let mut events = Vec::new();
        self.query(user_id, filters, |event| {
            events.push(event);
            Ok(())
        })?;
        Ok(events)
    }

    pub fn stats(&self) -> Result<StoreStats, DbError> {
        self.store.stats()
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Returns a reference to the configuration this log was opened with.
    pub fn get_config(&self) -> &DbConfig {
        &self.config
    }
}
