use thiserror::Error;

/// Per-line decode failures. These are never fatal during ingestion: the line is
/// reported and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed line: expected 4 fields separated by \" | \", got {fields}")]
    MalformedLine { fields: usize },

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("invalid user id {value:?}: {reason}")]
    InvalidUserId { value: String, reason: String },

    #[error("empty event type")]
    EmptyEventType,

    #[error("invalid JSON payload: {reason}")]
    InvalidPayload { reason: String },

    /// The raw line is not valid UTF-8.
    #[error("line is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidEncoding { valid_up_to: usize },
}

/// Custom error type for store, ingestion and query operations.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// `from` is strictly after `to`. Raised before any storage access.
    #[error("Invalid time range: from={from} is after to={to}")]
    InvalidRange { from: String, to: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corruption detected: {details}")]
    Corruption { details: String, row_id: Option<i64> },

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    /// A fatal failure after some records were already committed (ingest) or
    /// yielded (query).
    #[error("Aborted after {completed} records: {source}")]
    Aborted {
        completed: u64,
        #[source]
        source: Box<DbError>,
    },
}

impl DbError {
    /// Wraps `source` with the count of records completed before it happened.
    pub fn aborted(completed: u64, source: DbError) -> Self {
        match source {
            // Never nest: the innermost count is the one that was observed first.
            DbError::Aborted { .. } => source,
            other => DbError::Aborted {
                completed,
                source: Box::new(other),
            },
        }
    }

    /// Records committed or yielded before the failure (0 for errors raised up front).
    pub fn completed(&self) -> u64 {
        match self {
            DbError::Aborted { completed, .. } => *completed,
            _ => 0,
        }
    }

    /// The underlying cause, looking through `Aborted`.
    pub fn root(&self) -> &DbError {
        match self {
            DbError::Aborted { source, .. } => source.root(),
            other => other,
        }
    }
}
