//! Query filter validation and the predicate builder used to turn filters into a single
//! storage query.

use crate::codec::format_timestamp;
use crate::error::DbError;
use crate::types::{Event, QueryFilters, Timestamp, UserId};
use rusqlite::types::Value as SqlValue;

impl QueryFilters {
    /// Validates the filters. Pure: never touches storage.
    ///
    /// # Errors
    /// Returns [`DbError::InvalidRange`] when both bounds are set and `from` is strictly after `to`.
    pub fn validate(&self) -> Result<(), DbError> {
        if let (Some(from), Some(to)) = (&self.from, &self.to) {
            if from > to {
                return Err(DbError::InvalidRange {
                    from: format_timestamp(from),
                    to: format_timestamp(to),
                });
            }
        }
        Ok(())
    }
}

/// One constraint of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Exact user match. Always present.
    UserId(UserId),
    /// Exact event type match.
    EventType(String),
    /// `timestamp >= from` (inclusive).
    From(Timestamp),
    /// `timestamp <= to` (inclusive).
    To(Timestamp),
}

impl Predicate {
    /// SQL condition for this predicate, bound to the numbered placeholder `?{index}`.
    fn sql(&self, index: usize) -> String {
        match self {
            Predicate::UserId(_) => format!("user_id = ?{index}"),
            Predicate::EventType(_) => format!("event_type = ?{index}"),
            Predicate::From(_) => format!("ts_unix >= ?{index}"),
            Predicate::To(_) => format!("ts_unix <= ?{index}"),
        }
    }

    fn param(&self) -> SqlValue {
        match self {
            Predicate::UserId(id) => SqlValue::Integer(*id),
            Predicate::EventType(t) => SqlValue::Text(t.clone()),
            // Stored instants are whole seconds: round `from` up and `to` down so
            // fractional bounds select the same rows as `matches`.
            Predicate::From(ts) => {
                SqlValue::Integer(ts.timestamp() + i64::from(ts.timestamp_subsec_nanos() > 0))
            }
            Predicate::To(ts) => SqlValue::Integer(ts.timestamp()),
        }
    }

    /// Evaluates the predicate against an in-memory event.
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Predicate::UserId(id) => event.user_id == *id,
            Predicate::EventType(t) => event.event_type == *t,
            Predicate::From(ts) => event.timestamp >= *ts,
            Predicate::To(ts) => event.timestamp <= *ts,
        }
    }
}

/// Ordered list of predicates for one query: user first, then type, from, to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

impl PredicateSet {
    /// Builds the predicates for `user_id` and `filters`. Filters are not validated here.
    pub fn new(user_id: UserId, filters: &QueryFilters) -> Self {
        let mut predicates = Vec::with_capacity(4);
        predicates.push(Predicate::UserId(user_id));
        if let Some(t) = filters.event_type() {
            predicates.push(Predicate::EventType(t.to_string()));
        }
        if let Some(from) = filters.from {
            predicates.push(Predicate::From(from));
        }
        if let Some(to) = filters.to {
            predicates.push(Predicate::To(to));
        }
        PredicateSet { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Renders the `WHERE` body, e.g. `user_id = ?1 AND event_type = ?2`.
    pub fn where_clause(&self) -> String {
        self.predicates
            .iter()
            .enumerate()
            .map(|(i, p)| p.sql(i + 1))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Bound values, in placeholder order.
    pub fn params(&self) -> Vec<SqlValue> {
        self.predicates.iter().map(Predicate::param).collect()
    }

    /// True if every predicate holds for `event`.
    pub fn matches(&self, event: &Event) -> bool {
        self.predicates.iter().all(|p| p.matches(event))
    }
}
