//! Command-line front end for the event log.
//!
//! Loads configuration from (in precedence order): defaults, config file, environment variables
//! (`EVENTLOG_*`), and CLI flags. `record` ingests a file, `query` prints a user's events in the
//! canonical line format, `stats` summarizes the store.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use config::{Config, Environment, File};
use eventlog::codec::{format_timestamp, parse_timestamp};
use eventlog::telemetry::db_metrics;
use eventlog::{
    DbConfig, DbError, DbEvent, DbEventListener, EventLog, QueryFilters, StoreOptions, Timestamp,
    UserId,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

// ---------- CLI ----------

/// Record line-oriented event logs into SQLite and query them per user.
#[derive(Parser, Debug)]
#[command(name = "eventlog", version, about)]
pub struct Cli {
    /// Path to config file (TOML). If omitted, `eventlog.toml` is loaded when it exists.
    #[arg(long, env = "EVENTLOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Do not load any config file; use defaults + env + CLI only.
    #[arg(long, default_value_t = false, global = true)]
    pub no_config: bool,

    /// Override the SQLite database path.
    #[arg(long, env = "EVENTLOG_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Override the number of events committed per transaction.
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Load and validate config (file + env + CLI), print the effective values, then exit.
    #[arg(long, default_value_t = false)]
    pub validate_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest a file of `timestamp | user_id | event_type | payload` lines.
    Record {
        /// Input file.
        file: PathBuf,
    },
    /// Print a user's events, oldest first.
    Query {
        /// User to query.
        #[arg(allow_negative_numbers = true)]
        user_id: UserId,
        /// Only events of this type.
        #[arg(long = "type")]
        event_type: Option<String>,
        /// Only events at or after this RFC 3339 time.
        #[arg(long, value_parser = parse_time_arg)]
        from: Option<Timestamp>,
        /// Only events at or before this RFC 3339 time.
        #[arg(long, value_parser = parse_time_arg)]
        to: Option<Timestamp>,
    },
    /// Show event count, distinct users and covered time range.
    Stats,
}

fn parse_time_arg(s: &str) -> Result<Timestamp, String> {
    parse_timestamp(s).map_err(|e| e.to_string())
}

// ---------- File/env config (all optional for partial config) ----------

/// `[sqlite]` section in config file.
#[derive(Debug, Default, serde::Deserialize)]
pub struct SqliteFileConfig {
    pub journal_mode: Option<String>,
    pub synchronous: Option<String>,
    pub cache_size: Option<i64>,
    pub temp_store: Option<String>,
    pub mmap_size: Option<i64>,
}

/// Top-level config as read from file + env. Every field optional for layering.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EventLogFileConfig {
    pub db_path: Option<String>,
    pub batch_size: Option<usize>,
    pub sqlite: Option<SqliteFileConfig>,
}

/// Load merged config. CLI overrides file/env.
fn load_config(cli: &Cli) -> Result<DbConfig, String> {
    let mut builder = Config::builder();

    if !cli.no_config {
        if let Some(ref path) = cli.config {
            if !path.exists() {
                return Err(format!("config file not found: {}", path.display()));
            }
            builder = builder.add_source(File::from(path.as_path()).required(true));
        } else {
            let default_path = PathBuf::from("eventlog.toml");
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path.as_path()).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("EVENTLOG")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .ignore_empty(true),
    );

    let merged = builder.build().map_err(|e| e.to_string())?;
    let partial: EventLogFileConfig = merged.try_deserialize().map_err(|e| e.to_string())?;

    let mut db_config = DbConfig::default();
    merge_into_db_config(&mut db_config, &partial);

    if let Some(ref p) = cli.db {
        db_config.db_path = p.clone();
    }
    if let Some(n) = cli.batch_size {
        db_config.batch_size = n;
    }

    db_config.validate().map_err(|e| e.to_string())?;
    Ok(db_config)
}

/// Merge file/env partial config onto `DbConfig`. Only overwrites fields that are `Some`.
fn merge_into_db_config(base: &mut DbConfig, partial: &EventLogFileConfig) {
    if let Some(s) = &partial.db_path {
        base.db_path = PathBuf::from(s);
    }
    if let Some(n) = partial.batch_size {
        base.batch_size = n;
    }
    if let Some(sq) = &partial.sqlite {
        let store: &mut StoreOptions = &mut base.store;
        if let Some(s) = &sq.journal_mode {
            store.journal_mode = s.clone();
        }
        if let Some(s) = &sq.synchronous {
            store.synchronous = s.clone();
        }
        if let Some(n) = sq.cache_size {
            store.cache_size = n;
        }
        if let Some(s) = &sq.temp_store {
            store.temp_store = s.clone();
        }
        if let Some(n) = sq.mmap_size {
            store.mmap_size = n;
        }
    }
}

// ---------- Logging ----------

/// Forwards library events to `tracing`.
#[derive(Debug)]
struct TracingEventListener;

impl DbEventListener for TracingEventListener {
    fn on_event(&self, event: DbEvent) {
        match event {
            DbEvent::IngestStarted { batch_size } => debug!(batch_size, "ingestion started"),
            DbEvent::LineSkipped {
                line_number,
                line,
                error,
            } => warn!(line_number, %error, line = %line, "skipping invalid line"),
            DbEvent::BatchCommitted {
                batch,
                events,
                committed_total,
                duration,
            } => info!(batch, events, ?duration, "processed {} events...", committed_total),
            DbEvent::BatchFailed { batch, error } => error!(batch, %error, "batch commit failed"),
            DbEvent::IngestFinished {
                lines_read,
                committed,
                skipped,
            } => debug!(lines_read, committed, skipped, "ingestion finished"),
            DbEvent::QueryFinished {
                user_id,
                rows,
                duration,
            } => debug!(user_id, rows, ?duration, "query finished"),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

// ---------- Commands ----------

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn run_record(config: DbConfig, file: PathBuf) -> CliResult {
    if !file.exists() {
        let msg = format!("file {} does not exist", file.display());
        eprintln!("Error: {}", msg);
        return Err(msg.into());
    }
    println!("Recording events from {}...", file.display());

    let mut log = EventLog::open(config).map_err(|e| {
        eprintln!("Error initializing store: {}", e);
        e
    })?;

    let start = Instant::now();
    let report = log.record(&file).map_err(|e| {
        eprintln!("Error recording events: {}", e);
        if e.completed() > 0 {
            eprintln!("{} events were committed before the failure", e.completed());
        }
        e
    })?;

    println!(
        "Successfully recorded {} events in {:?}",
        report.committed,
        start.elapsed()
    );
    if report.skipped > 0 {
        println!("Skipped {} invalid lines", report.skipped);
    }
    Ok(())
}

fn run_query(config: DbConfig, user_id: UserId, filters: QueryFilters) -> CliResult {
    // Bad ranges are rejected before the database is opened.
    filters.validate().map_err(|e| {
        eprintln!("Error: invalid filters: {}", e);
        e
    })?;

    let log = EventLog::open(config).map_err(|e| {
        eprintln!("Error initializing store: {}", e);
        e
    })?;

    let start = Instant::now();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = log
        .query(user_id, &filters, |event| {
            writeln!(out, "{}", event).map_err(DbError::Io)
        })
        .and_then(|count| out.flush().map(|_| count).map_err(DbError::Io));

    let count = result.map_err(|e| {
        eprintln!("Error querying events: {}", e);
        e
    })?;
    eprintln!("Query completed: {} events in {:?}", count, start.elapsed());
    Ok(())
}

fn run_stats(config: DbConfig) -> CliResult {
    let log = EventLog::open(config).map_err(|e| {
        eprintln!("Error initializing store: {}", e);
        e
    })?;
    let stats = log.stats().map_err(|e| {
        eprintln!("Error reading stats: {}", e);
        e
    })?;
    println!("total_events={}", stats.total_events);
    println!("unique_users={}", stats.unique_users);
    println!("from={}", stats.earliest.as_deref().unwrap_or("-"));
    println!("to={}", stats.latest.as_deref().unwrap_or("-"));
    Ok(())
}

// ---------- Main ----------

fn main() -> CliResult {
    let cli = Cli::parse();
    let mut config = load_config(&cli).map_err(|e| {
        eprintln!("config error: {}", e);
        e
    })?;

    if cli.validate_config {
        println!("db_path={}", config.db_path.display());
        println!("batch_size={}", config.batch_size);
        println!("journal_mode={}", config.store.journal_mode);
        println!("synchronous={}", config.store.synchronous);
        println!("cache_size={}", config.store.cache_size);
        return Ok(());
    }

    init_tracing();
    db_metrics::describe_all();
    config.event_listener = Arc::new(TracingEventListener);

    match cli.command {
        Some(Command::Record { file }) => run_record(config, file),
        Some(Command::Query {
            user_id,
            event_type,
            from,
            to,
        }) => {
            let filters = QueryFilters {
                event_type,
                from,
                to,
            };
            debug!(
                user_id,
                from = ?filters.from.as_ref().map(format_timestamp),
                to = ?filters.to.as_ref().map(format_timestamp),
                "running query"
            );
            run_query(config, user_id, filters)
        }
        Some(Command::Stats) => run_stats(config),
        None => {
            Cli::command().print_help()?;
            Err("no command given".into())
        }
    }
}
