#![doc = include_str!("../README.md")]
// Declare modules
pub mod buffer;
pub mod codec;
pub mod core;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod query;
pub mod storage;
pub mod telemetry;
pub mod types;

/// Configuration options for an event log.
pub use crate::core::DbConfig;
/// Main entry point: an open event log over one storage session.
pub use crate::core::EventLog;
/// Per-line decode failures (skipped during ingestion).
pub use crate::error::DecodeError;
/// Error type for storage, ingestion and query operations.
pub use crate::error::DbError;
/// Outcome of an ingestion run.
pub use crate::ingest::{IngestOptions, IngestReport};
/// The owned SQLite storage session and the batch-write seam.
pub use crate::storage::{BatchSink, EventStore, StoreOptions, StoreStats};
/// Structured event hook for observability.
pub use crate::telemetry::{DbEvent, DbEventListener};
/// A single decoded event.
pub use crate::types::Event;
/// Per-request query constraints.
pub use crate::types::QueryFilters;
/// Type alias for a timestamp (instant with its original UTC offset).
pub use crate::types::Timestamp;
/// Type alias for a user identifier.
pub use crate::types::UserId;

/// The default number of events committed per ingestion transaction.
pub use crate::ingest::DEFAULT_BATCH_SIZE;
