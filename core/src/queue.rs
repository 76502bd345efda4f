//! The pending-operation queue.
//!
//! An ordered, bounded collection of entries sorted by
//! `(priority desc, sequence asc)`: higher priority always sits ahead,
//! ties resolve FIFO by arrival. Insertion keeps the order so the
//! processor only ever pops the front.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::{Result, StoreError};
use crate::op::{Operation, OperationResult, Priority};

/// Completion handle the caller awaits; invoked exactly once.
pub(crate) type Completion = oneshot::Sender<Result<OperationResult>>;

/// An [`Operation`] plus its scheduling metadata.
pub(crate) struct QueueEntry {
    pub sequence: u64,
    pub priority: Priority,
    #[allow(dead_code)] // surfaced in queue-age diagnostics later
    pub enqueued_at: Instant,
    /// Attempts made so far; only the processor increments this.
    pub attempt: u32,
    pub operation: Operation,
    pub completion: Completion,
}

/// Capacity diagnostics, kept since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Maximum queue length ever observed.
    pub high_water_mark: usize,
    pub total_enqueued: u64,
    /// Enqueues refused because the queue was at capacity.
    pub rejected_full: u64,
}

pub(crate) struct OperationQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
    next_sequence: u64,
    stats: QueueStats,
}

impl OperationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            next_sequence: 0,
            stats: QueueStats::default(),
        }
    }

    /// Ordered insert. Fails immediately with `QueueFull` at capacity;
    /// the caller's completion handle is dropped, settling its future.
    pub fn push(
        &mut self,
        operation: Operation,
        priority: Priority,
        completion: Completion,
    ) -> std::result::Result<u64, StoreError> {
        if self.entries.len() >= self.capacity {
            self.stats.rejected_full += 1;
            return Err(StoreError::QueueFull {
                capacity: self.capacity,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        // First index whose entry sorts after the new one: lower
        // priority, or equal priority and later arrival (always true for
        // existing equal-priority entries, so FIFO within a tier holds).
        let position = self
            .entries
            .iter()
            .position(|entry| entry.priority < priority)
            .unwrap_or(self.entries.len());

        self.entries.insert(
            position,
            QueueEntry {
                sequence,
                priority,
                enqueued_at: Instant::now(),
                attempt: 0,
                operation,
                completion,
            },
        );

        self.stats.total_enqueued += 1;
        self.stats.high_water_mark = self.stats.high_water_mark.max(self.entries.len());
        Ok(sequence)
    }

    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Remove every pending entry, handing them back for settlement.
    pub fn drain_all(&mut self) -> Vec<QueueEntry> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}
