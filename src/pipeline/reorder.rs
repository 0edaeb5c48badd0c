//! Reordering buffer for out-of-order region completion.
//!
//! Items are tagged with their task ordinal and released strictly in ordinal order, stopping at
//! the first gap.
//!
//! # Example
//!
//! ```
//! use evidence_caller::pipeline::reorder::ReorderBuffer;
//!
//! let mut buffer: ReorderBuffer<&str> = ReorderBuffer::new();
//! buffer.insert(2, "third");
//! buffer.insert(0, "first");
//!
//! let ready: Vec<_> = buffer.drain_ready().collect();
//! assert_eq!(ready, vec!["first"]);
//!
//! buffer.insert(1, "second");
//! let ready: Vec<_> = buffer.drain_ready().collect();
//! assert_eq!(ready, vec!["second", "third"]);
//! ```

use std::collections::VecDeque;

/// Releases items in sequence order regardless of insertion order.
///
/// Uses a sparse `VecDeque` indexed by `seq - next_seq`, so insert and pop are O(1) amortized.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    buffer: VecDeque<Option<T>>,
    /// Sequence number of `buffer[0]`, which is also the next one to release
    next_seq: u64,
    count: usize,
}

impl<T> ReorderBuffer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            next_seq: 0,
            count: 0,
        }
    }

    /// Buffer an item.
    ///
    /// Returns `false`, leaving the buffer unchanged, if `seq` was already released or is
    /// already buffered.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, seq: u64, item: T) -> bool {
        if seq < self.next_seq {
            return false;
        }
        let index = (seq - self.next_seq) as usize;

        while self.buffer.len() <= index {
            self.buffer.push_back(None);
        }
        if self.buffer[index].is_some() {
            return false;
        }

        self.buffer[index] = Some(item);
        self.count += 1;
        true
    }

    /// Pop the next sequential item if it has arrived
    #[must_use]
    pub fn try_pop_next(&mut self) -> Option<T> {
        if !self.buffer.front().is_some_and(Option::is_some) {
            return None;
        }
        let item = self.buffer.pop_front().flatten()?;
        self.next_seq += 1;
        self.count -= 1;
        Some(item)
    }

    /// Drain all consecutive ready items, stopping at the first gap
    pub fn drain_ready(&mut self) -> DrainReady<'_, T> {
        DrainReady { buffer: self }
    }

    /// Next sequence number to be released
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Items buffered but not yet released
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DrainReady<'a, T> {
    buffer: &'a mut ReorderBuffer<T>,
}

impl<T> Iterator for DrainReady<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.try_pop_next()
    }
}
