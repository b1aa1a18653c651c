//! Protocol message log
//!
//! Append-only, time-ordered history of every successfully decoded protocol
//! message in the session. Entries are never averaged, dropped or mutated;
//! only [`ProtocolLog::clear`] removes them, and it also resets the counters.

use pdlens_protocol::display::format_delta;
use pdlens_protocol::{DecodedMessage, MetadataNode, PdSummary};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A decoded protocol message waiting to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct PendingProtocolEntry {
    /// Sequence number of the source report
    pub seq: u64,
    /// Arrival time of the source report (ms since epoch)
    pub arrival_ms: u64,
    /// Log row columns
    pub summary: PdSummary,
    /// Normalized hex of the message
    pub raw_hex: String,
    /// Full parse tree
    pub tree: MetadataNode,
}

impl PendingProtocolEntry {
    /// Build a pending entry from a protocol-class message
    pub fn from_message(seq: u64, arrival_ms: u64, message: &DecodedMessage) -> Option<Self> {
        let summary = PdSummary::from_message(message)?;
        Some(Self {
            seq,
            arrival_ms,
            summary,
            raw_hex: message.raw_hex.clone(),
            tree: message.tree.clone(),
        })
    }
}

/// One row of the protocol log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolLogEntry {
    /// Unique id, increasing from 1 since the last clear
    pub id: u64,
    /// Display ordinal, dense and increasing from 1 since the last clear
    pub order_index: u64,
    /// Sequence number of the source report
    pub seq: u64,
    /// Arrival time (ms since epoch)
    pub arrival_ms: u64,
    /// Milliseconds since the previous entry (0 for the first)
    pub delta_ms: i64,
    /// Message subtype
    pub message_type: String,
    /// Sender power role (or cable plug)
    pub power_role: String,
    /// Sender data role
    pub data_role: String,
    /// Normalized hex of the message
    pub raw_hex: String,
    /// Length of the decoded message in bits
    pub bit_length: u32,
    /// Full parse tree
    pub tree: MetadataNode,
}

impl ProtocolLogEntry {
    /// Delta formatted as signed seconds ("+0.045s")
    pub fn delta_label(&self) -> String {
        format_delta(self.delta_ms)
    }
}

/// Ordered protocol message history
#[derive(Debug, Default)]
pub struct ProtocolLog {
    entries: Vec<ProtocolLogEntry>,
    last_id: u64,
    last_index: u64,
}

impl ProtocolLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, ordered by arrival time then seq
    ///
    /// Returns the ids assigned, in append order.
    pub fn append(&mut self, mut pending: Vec<PendingProtocolEntry>) -> Vec<u64> {
        pending.sort_by_key(|p| (p.arrival_ms, p.seq));

        let mut ids = Vec::with_capacity(pending.len());
        for item in pending {
            let delta_ms = self
                .entries
                .last()
                .map_or(0, |prev| item.arrival_ms as i64 - prev.arrival_ms as i64);

            self.last_id += 1;
            self.last_index += 1;

            let entry = ProtocolLogEntry {
                id: self.last_id,
                order_index: self.last_index,
                seq: item.seq,
                arrival_ms: item.arrival_ms,
                delta_ms,
                message_type: item.summary.message_type,
                power_role: item.summary.power_role,
                data_role: item.summary.data_role,
                raw_hex: item.raw_hex,
                bit_length: item.summary.bit_length,
                tree: item.tree,
            };

            debug!(
                "Appended protocol entry #{} (id {}, seq {}): {}",
                entry.order_index, entry.id, entry.seq, entry.message_type
            );
            ids.push(entry.id);
            self.entries.push(entry);
        }
        ids
    }

    /// Remove every entry and reset id/index counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_id = 0;
        self.last_index = 0;
    }

    /// All entries in order
    pub fn entries(&self) -> &[ProtocolLogEntry] {
        &self.entries
    }

    /// Entry by id
    pub fn get(&self, id: u64) -> Option<&ProtocolLogEntry> {
        // Ids are assigned in order, so the entries are sorted by id
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Whether an entry with this id exists
    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    /// Newest entry
    pub fn latest(&self) -> Option<&ProtocolLogEntry> {
        self.entries.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn pending(seq: u64, arrival_ms: u64, message_type: &str) -> PendingProtocolEntry {
        PendingProtocolEntry {
            seq,
            arrival_ms,
            summary: PdSummary {
                message_type: message_type.to_string(),
                power_role: "Source".to_string(),
                data_role: "DFP".to_string(),
                bit_length: 16,
            },
            raw_hex: "FE02".to_string(),
            tree: MetadataNode::root(vec![]),
        }
    }

    #[test]
    fn test_append_assigns_dense_ids() {
        let mut log = ProtocolLog::new();
        let ids = log.append(vec![pending(1, 100, "A"), pending(2, 150, "B")]);
        assert_eq!(ids, vec![1, 2]);

        let ids = log.append(vec![pending(5, 200, "C")]);
        assert_eq!(ids, vec![3]);

        let indices: Vec<u64> = log.entries().iter().map(|e| e.order_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_delta_from_previous_entry() {
        let mut log = ProtocolLog::new();
        log.append(vec![pending(1, 1_000, "A"), pending(2, 1_045, "B")]);
        log.append(vec![pending(3, 2_045, "C")]);

        let deltas: Vec<i64> = log.entries().iter().map(|e| e.delta_ms).collect();
        assert_eq!(deltas, vec![0, 45, 1_000]);
        assert_eq!(log.entries()[1].delta_label(), "+0.045s");
    }

    #[test]
    fn test_batch_ordered_by_arrival_then_seq() {
        let mut log = ProtocolLog::new();
        log.append(vec![
            pending(3, 200, "third"),
            pending(2, 100, "second"),
            pending(1, 100, "first"),
        ]);

        let types: Vec<&str> = log
            .entries()
            .iter()
            .map(|e| e.message_type.as_str())
            .collect();
        assert_eq!(types, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut log = ProtocolLog::new();
        let batch: Vec<_> = (1..=10).map(|i| pending(i, i * 10, "X")).collect();
        log.append(batch);
        assert_eq!(log.len(), 10);

        log.clear();
        assert!(log.is_empty());

        log.append(vec![pending(11, 500, "Y")]);
        let entry = log.latest().unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(entry.order_index, 1);
        assert_eq!(entry.delta_ms, 0);
    }

    #[test]
    fn test_get_by_id() {
        let mut log = ProtocolLog::new();
        log.append(vec![pending(1, 1, "A"), pending(2, 2, "B"), pending(3, 3, "C")]);
        assert_eq!(log.get(2).map(|e| e.message_type.as_str()), Some("B"));
        assert!(log.get(4).is_none());
        assert!(log.contains(3));
    }
}
