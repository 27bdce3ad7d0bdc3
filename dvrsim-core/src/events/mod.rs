//! ## dvrsim-core::events
//! **Min-time event queue with stable FIFO tie-break**
//!
//! Every entry is a request to resume one process at one virtual instant.
//! Entries carry a monotonically increasing sequence number so that two
//! resumptions for the same instant pop in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::sim::ProcessId;
use crate::time::SimTime;

/// A queued resumption of a process.
#[derive(Clone, Copy, Debug)]
pub struct ScheduledResume {
    time: SimTime,
    sequence: u64,
    process: ProcessId,
}

impl ScheduledResume {
    pub fn new(time: SimTime, sequence: u64, process: ProcessId) -> Self {
        Self {
            time,
            sequence,
            process,
        }
    }

    #[inline]
    pub fn time(&self) -> SimTime {
        self.time
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn process(&self) -> ProcessId {
        self.process
    }
}

impl PartialEq for ScheduledResume {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledResume {}

// Reversed so that `BinaryHeap` (a max-heap) yields the earliest entry first.
impl Ord for ScheduledResume {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduledResume {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of pending resumptions.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledResume>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, entry: ScheduledResume) {
        self.heap.push(entry);
    }

    /// Removes and returns the earliest entry.
    pub fn pop_earliest(&mut self) -> Option<ScheduledResume> {
        self.heap.pop()
    }

    /// Time of the earliest entry without removing it.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(ScheduledResume::time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
