use crate::types::Event;

/// A bounded staging buffer for decoded events awaiting a batch commit.
///
/// The buffer never grows past `capacity`; callers write and clear it as soon as
/// [`BatchBuffer::stage`] reports it full.
#[derive(Debug)]
pub struct BatchBuffer {
    events: Vec<Event>,
    capacity: usize,
}

impl BatchBuffer {
    /// Creates a buffer holding at most `capacity` events. A zero capacity is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        BatchBuffer {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Stages one event. Returns true when the buffer has reached capacity.
    pub fn stage(&mut self, event: Event) -> bool {
        self.events.push(event);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Staged events, in arrival order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Empties the buffer, keeping the allocation for the next batch.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
