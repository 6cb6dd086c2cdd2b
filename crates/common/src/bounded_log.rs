//! Append-only log with a retention limit
//!
//! Entries are kept in insertion order. Once the capacity is reached every
//! append drops the oldest entry. A capacity of zero keeps every entry.

use std::collections::VecDeque;

/// Append-only log with optional retention limit
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> BoundedLog<T> {
    /// Create a log keeping at most `capacity` entries (0 = unbounded)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Create a log that never drops entries
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Append an entry, evicting the oldest one when full
    pub fn push(&mut self, entry: T) {
        if self.capacity > 0 && self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retention limit (0 = unbounded)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Iterate over retained entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }
}

impl<T: Clone> BoundedLog<T> {
    /// Copy the retained entries, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T> Default for BoundedLog<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
