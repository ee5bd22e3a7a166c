use std::sync::Arc;
use std::time::Duration;

use crate::error::DecodeError;
use crate::types::UserId;

/// Structured, in-process event hook for observability.
///
/// The library never prints. Callers provide an implementation that forwards these events
/// to `tracing`, metrics, or a test sink (the `eventlog` binary forwards to `tracing`).
pub trait DbEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: DbEvent);
}

/// Structured events emitted by ingestion and query.
#[derive(Debug, Clone, PartialEq)]
pub enum DbEvent {
    IngestStarted { batch_size: usize },
    /// A line failed to decode and was dropped. Ingestion continues.
    LineSkipped {
        line_number: u64,
        line: String,
        error: DecodeError,
    },
    BatchCommitted {
        batch: u64,
        events: usize,
        committed_total: u64,
        duration: Duration,
    },
    BatchFailed { batch: u64, error: String },
    IngestFinished {
        lines_read: u64,
        committed: u64,
        skipped: u64,
    },

    QueryFinished {
        user_id: UserId,
        rows: u64,
        duration: Duration,
    },
}

#[derive(Debug)]
pub struct NoopEventListener;

impl DbEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: DbEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn DbEventListener> {
    Arc::new(NoopEventListener)
}

/// Metrics instrumentation through the `metrics` facade.
///
/// Emitting is effectively a no-op until the host process installs a recorder.
pub mod db_metrics {
    use super::*;

    use ::metrics::{describe_counter, describe_histogram, Unit};

    // Counters are exposed as `<name>_total` by Prometheus-style exporters.
    pub const INGEST_LINES: &str = "eventlog_ingest_lines";
    pub const INGEST_SKIPPED_LINES: &str = "eventlog_ingest_skipped_lines";
    pub const INGEST_COMMITTED_EVENTS: &str = "eventlog_ingest_committed_events";
    pub const BATCH_COMMIT_DURATION_SECONDS: &str = "eventlog_batch_commit_duration_seconds";

    pub const QUERY_ROWS: &str = "eventlog_query_rows";
    pub const QUERY_DURATION_SECONDS: &str = "eventlog_query_duration_seconds";

    #[inline]
    pub fn record_lines_read(lines: u64) {
        if lines > 0 {
            ::metrics::counter!(INGEST_LINES).increment(lines);
        }
    }

    #[inline]
    pub fn record_line_skipped() {
        ::metrics::counter!(INGEST_SKIPPED_LINES).increment(1);
    }

    #[inline]
    pub fn record_batch_commit(duration: Duration, events: u64) {
        ::metrics::histogram!(BATCH_COMMIT_DURATION_SECONDS).record(duration.as_secs_f64());
        if events > 0 {
            ::metrics::counter!(INGEST_COMMITTED_EVENTS).increment(events);
        }
    }

    #[inline]
    pub fn record_query(duration: Duration, rows: u64) {
        ::metrics::histogram!(QUERY_DURATION_SECONDS).record(duration.as_secs_f64());
        if rows > 0 {
            ::metrics::counter!(QUERY_ROWS).increment(rows);
        }
    }

    /// Registers descriptions with the installed recorder. Call once after installing one.
    pub fn describe_all() {
        describe_counter!(
            INGEST_LINES,
            Unit::Count,
            "Total number of non-blank lines read by ingestion."
        );
        describe_counter!(
            INGEST_SKIPPED_LINES,
            Unit::Count,
            "Lines dropped because they failed to decode."
        );
        describe_counter!(
            INGEST_COMMITTED_EVENTS,
            Unit::Count,
            "Events durably committed by ingestion."
        );
        describe_counter!(QUERY_ROWS, Unit::Count, "Events yielded by queries.");

        describe_histogram!(
            BATCH_COMMIT_DURATION_SECONDS,
            Unit::Seconds,
            "Time to write and commit one ingestion batch."
        );
        describe_histogram!(
            QUERY_DURATION_SECONDS,
            Unit::Seconds,
            "End-to-end query scan time, including result delivery."
        );
    }
}
