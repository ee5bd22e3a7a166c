use crate::error::DbError;
use crate::filter::PredicateSet;
use crate::storage::EventStore;
use crate::telemetry::db_metrics;
use crate::types::{Event, QueryFilters, UserId};
use std::time::Instant;

/// Executes a per-user query against the store, feeding matching events to `visit`.
///
/// # Arguments
/// * `store` - The storage session to read from.
/// * `user_id` - Mandatory exact-match user constraint.
/// * `filters` - Optional type and inclusive time bounds.
/// * `visit` - Called once per event, in ascending timestamp order. Events with equal
///   timestamps come in insertion order. Returning an error stops the scan.
///
/// # Returns
/// * `Result<u64, DbError>` - The number of events delivered to `visit`.
///
/// # Errors
/// [`DbError::InvalidRange`] if the filters are invalid, before the store is touched.
/// Failures during the scan come back as [`DbError::Aborted`] with the number of events
/// already delivered.
pub fn execute_query<F>(
    store: &EventStore,
    user_id: UserId,
    filters: &QueryFilters,
    visit: F,
) -> Result<u64, DbError>
where
    F: FnMut(Event) -> Result<(), DbError>,
{
    filters.validate()?;

    let predicates = PredicateSet::new(user_id, filters);
    let started = Instant::now();
    let result = store.scan(&predicates, visit);
    let rows = match &result {
        Ok(n) => *n,
        Err(e) => e.completed(),
    };
    db_metrics::record_query(started.elapsed(), rows);
    result
}
