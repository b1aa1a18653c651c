//! Bounded report queue
//!
//! Holds raw reports between arrival and decode. The queue owns sequence
//! numbering and is the only place reports are dropped: either by explicit
//! release after a pass has applied them, or by eviction when capacity is
//! exceeded.

use std::collections::VecDeque;

use pdlens_protocol::{InboundReport, RawReport};
use tracing::{debug, warn};

/// Result of pushing a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Sequence number assigned to the pushed report
    pub seq: u64,
    /// Sequence number of the report evicted to make room, if any
    pub evicted: Option<u64>,
}

/// Bounded, ordered queue of reports awaiting decode
#[derive(Debug)]
pub struct ReportQueue {
    entries: VecDeque<RawReport>,
    capacity: usize,
    last_seq: u64,
    evicted: u64,
    version: u64,
}

impl ReportQueue {
    /// Create an empty queue holding at most `capacity` reports
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            last_seq: 0,
            evicted: 0,
            version: 0,
        }
    }

    /// Sequence and append a report, evicting the oldest when over capacity
    pub fn push(&mut self, inbound: InboundReport) -> PushOutcome {
        self.last_seq += 1;
        let seq = self.last_seq;
        self.entries.push_back(RawReport::from_inbound(seq, inbound));

        let mut evicted = None;
        if self.entries.len() > self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                self.evicted += 1;
                warn!(
                    "Report queue full ({}), evicted seq {} (total evicted {})",
                    self.capacity, dropped.seq, self.evicted
                );
                evicted = Some(dropped.seq);
            }
        }

        self.version += 1;
        PushOutcome { seq, evicted }
    }

    /// Ordered copy of every retained report
    pub fn peek_all(&self) -> Vec<RawReport> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate retained reports in order
    pub fn iter(&self) -> impl Iterator<Item = &RawReport> {
        self.entries.iter()
    }

    /// Remove every retained report with `seq <= up_to`
    ///
    /// Returns the number removed. Idempotent; a value below the oldest
    /// retained seq removes nothing.
    pub fn release_up_to(&mut self, up_to: u64) -> usize {
        let mut removed = 0;
        while self.entries.front().is_some_and(|r| r.seq <= up_to) {
            self.entries.pop_front();
            removed += 1;
        }

        if removed > 0 {
            self.version += 1;
            debug!(
                "Released {} reports up to seq {} ({} remaining)",
                removed,
                up_to,
                self.entries.len()
            );
        }
        removed
    }

    /// Drop everything and restart sequencing (transport disconnect)
    pub fn reset(&mut self) {
        self.entries.clear();
        self.last_seq = 0;
        self.version += 1;
    }

    /// Number of retained reports
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reports are retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number of the most recently pushed report (0 before the first)
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Sequence number of the oldest retained report
    pub fn first_seq(&self) -> Option<u64> {
        self.entries.front().map(|r| r.seq)
    }

    /// Reports evicted since the queue was created
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    /// Change counter, bumped on every push, release and reset
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tag: u8) -> InboundReport {
        InboundReport::new(0, vec![0xFE, 0x00, tag], u64::from(tag))
    }

    fn tags(queue: &ReportQueue) -> Vec<u8> {
        queue.iter().map(|r| r.bytes[2]).collect()
    }

    #[test]
    fn test_push_assigns_gap_free_seq() {
        let mut queue = ReportQueue::new(10);
        let seqs: Vec<u64> = (0..4).map(|i| queue.push(report(i)).seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(queue.last_seq(), 4);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut queue = ReportQueue::new(3);
        for tag in [b'A', b'B', b'C'] {
            assert_eq!(queue.push(report(tag)).evicted, None);
        }

        let outcome = queue.push(report(b'D'));
        assert_eq!(outcome.evicted, Some(1));
        assert_eq!(tags(&queue), vec![b'B', b'C', b'D']);
        assert_eq!(queue.evicted_count(), 1);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_release_removes_prefix() {
        let mut queue = ReportQueue::new(10);
        for tag in 0..5 {
            queue.push(report(tag));
        }

        assert_eq!(queue.release_up_to(3), 3);
        assert_eq!(queue.first_seq(), Some(4));
        // Idempotent
        assert_eq!(queue.release_up_to(3), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_release_below_oldest_is_noop() {
        let mut queue = ReportQueue::new(2);
        for tag in 0..4 {
            queue.push(report(tag));
        }
        // Seqs 1 and 2 were evicted
        assert_eq!(queue.first_seq(), Some(3));
        let version = queue.version();
        assert_eq!(queue.release_up_to(2), 0);
        assert_eq!(queue.release_up_to(0), 0);
        assert_eq!(queue.version(), version);
    }

    #[test]
    fn test_reset_restarts_sequencing() {
        let mut queue = ReportQueue::new(4);
        queue.push(report(1));
        queue.push(report(2));
        queue.reset();

        assert!(queue.is_empty());
        assert_eq!(queue.push(report(3)).seq, 1);
    }

    #[test]
    fn test_version_tracks_changes() {
        let mut queue = ReportQueue::new(4);
        let v0 = queue.version();
        queue.push(report(1));
        assert!(queue.version() > v0);
        let v1 = queue.version();
        queue.release_up_to(1);
        assert!(queue.version() > v1);
    }
}
