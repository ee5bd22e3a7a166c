//! Streaming ingestion: lines in, bounded atomic batches out.

use crate::buffer::BatchBuffer;
use crate::codec::decode;
use crate::error::{DbError, DecodeError};
use crate::storage::BatchSink;
use crate::telemetry::{db_metrics, DbEvent, DbEventListener};
use std::io::BufRead;
use std::time::Instant;

/// Default maximum number of events committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Options for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Maximum events per transaction. Must be greater than zero.
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of a completed ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Non-blank lines read.
    pub lines_read: u64,
    /// Events durably committed.
    pub committed: u64,
    /// Lines dropped because they failed to decode.
    pub skipped: u64,
    /// Transactions committed.
    pub batches: u64,
}

/// Ingests every line of `reader` into `sink`.
///
/// Blank lines are ignored. Lines that fail to decode, including lines that are not valid
/// UTF-8, are reported through `events` as [`DbEvent::LineSkipped`] and dropped; they never
/// stop the run. A leading byte-order mark and `\r\n` line endings are accepted.
/// Decoded events are written in batches of at most `options.batch_size`, each batch as one
/// atomic write.
/// Progress is reported with [`DbEvent::BatchCommitted`] after every commit.
///
/// Records of earlier batches stay committed if a later batch fails; re-running the same
/// input afterwards stores those records a second time.
///
/// # Errors
/// * [`DbError::ConfigError`] if `batch_size` is zero (nothing is read).
/// * [`DbError::Aborted`] wrapping the write or read failure, with `completed` set to the
///   number of events committed before it. Events staged for the failed batch are discarded.
pub fn ingest<R, S>(
    reader: R,
    sink: &mut S,
    options: &IngestOptions,
    events: &dyn DbEventListener,
) -> Result<IngestReport, DbError>
where
    R: BufRead,
    S: BatchSink + ?Sized,
{
    if options.batch_size == 0 {
        return Err(DbError::ConfigError(
            "batch_size must be greater than zero".to_string(),
        ));
    }

    events.on_event(DbEvent::IngestStarted {
        batch_size: options.batch_size,
    });

    let mut report = IngestReport::default();
    let mut buffer = BatchBuffer::new(options.batch_size);
    let result = run(reader, sink, &mut buffer, &mut report, events);
    db_metrics::record_lines_read(report.lines_read);

    result.map_err(|e| DbError::aborted(report.committed, e))?;
    events.on_event(DbEvent::IngestFinished {
        lines_read: report.lines_read,
        committed: report.committed,
        skipped: report.skipped,
    });
    Ok(report)
}

fn run<R, S>(
    mut reader: R,
    sink: &mut S,
    buffer: &mut BatchBuffer,
    report: &mut IngestReport,
    events: &dyn DbEventListener,
) -> Result<(), DbError>
where
    R: BufRead,
    S: BatchSink + ?Sized,
{
    let mut raw = Vec::new();
    let mut line_number = 0u64;
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                // Nothing of the in-flight batch has been written yet.
                buffer.clear();
                return Err(e.into());
            }
        }
        line_number += 1;

        let mut bytes = strip_line_ending(&raw);
        if line_number == 1 {
            bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        }

        let decoded = match std::str::from_utf8(bytes) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => decode(text).map_err(|error| (text.to_string(), error)),
            Err(e) => Err((
                String::from_utf8_lossy(bytes).into_owned(),
                DecodeError::InvalidEncoding {
                    valid_up_to: e.valid_up_to(),
                },
            )),
        };
        report.lines_read += 1;

        match decoded {
            Ok(event) => {
                if buffer.stage(event) {
                    commit_batch(sink, buffer, report, events)?;
                }
            }
            Err((line, error)) => {
                report.skipped += 1;
                db_metrics::record_line_skipped();
                events.on_event(DbEvent::LineSkipped {
                    line_number,
                    line,
                    error,
                });
            }
        }
    }

    if !buffer.is_empty() {
        commit_batch(sink, buffer, report, events)?;
    }
    Ok(())
}

/// Drops a trailing `\n` or `\r\n`.
fn strip_line_ending(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn commit_batch<S>(
    sink: &mut S,
    buffer: &mut BatchBuffer,
    report: &mut IngestReport,
    events: &dyn DbEventListener,
) -> Result<(), DbError>
where
    S: BatchSink + ?Sized,
{
    let batch = report.batches + 1;
    let started = Instant::now();
    let written = sink.write_batch(buffer.events());
    let staged = buffer.len();
    buffer.clear();

    if let Err(e) = written {
        events.on_event(DbEvent::BatchFailed {
            batch,
            error: e.to_string(),
        });
        return Err(e);
    }

    let duration = started.elapsed();
    report.batches = batch;
    report.committed += staged as u64;
    db_metrics::record_batch_commit(duration, staged as u64);
    events.on_event(DbEvent::BatchCommitted {
        batch,
        events: staged,
        committed_total: report.committed,
        duration,
    });
    Ok(())
}
