use chrono::{DateTime, FixedOffset};

/// Timestamp type: an instant with its original UTC offset preserved.
pub type Timestamp = DateTime<FixedOffset>;

/// User identifier (open world, never validated against a registry).
pub type UserId = i64;

/// Represents a single event decoded from a log line or read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub timestamp: Timestamp,
    pub user_id: UserId,
    pub event_type: String,
    /// Raw JSON text, kept exactly as it appeared in the input (minus surrounding whitespace).
    pub payload: String,
}

/// Per-request query constraints. Constructed, validated once, then discarded.
///
/// All bounds are inclusive. `None` means unconstrained on that side; an empty
/// `event_type` is treated the same as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub event_type: Option<String>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl QueryFilters {
    /// Returns the event type constraint, if one is actually set.
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns true if no constraint is active.
    pub fn is_empty(&self) -> bool {
        self.event_type().is_none() && self.from.is_none() && self.to.is_none()
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_from(mut self, from: Timestamp) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_to(mut self, to: Timestamp) -> Self {
        self.to = Some(to);
        self
    }
}
