//! Unified event stream for the pipeline
//!
//! Everything the presentation layer needs to react to (new telemetry, new
//! log rows, selection moves, transient errors, resets) is emitted through a
//! single channel, in the order the pipeline produced it.

use crate::aggregator::TelemetrySnapshot;
use crate::log::ProtocolLogEntry;
use crate::selection::FollowMode;

/// Unified event enum for all pipeline activity
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    // -------------------------------------------------------------------------
    // Data events
    // -------------------------------------------------------------------------
    /// A pass produced a new telemetry snapshot
    SnapshotUpdated {
        /// The new snapshot
        snapshot: TelemetrySnapshot,
    },

    /// Protocol entries were appended to the log
    EntriesAppended {
        /// The new entries, in log order
        entries: Vec<ProtocolLogEntry>,
    },

    // -------------------------------------------------------------------------
    // View events
    // -------------------------------------------------------------------------
    /// The selected log entry or follow mode changed
    SelectionChanged {
        /// Selected entry id
        selected: Option<u64>,
        /// Current follow mode
        follow: FollowMode,
    },

    /// The protocol log was cleared
    LogCleared,

    // -------------------------------------------------------------------------
    // Condition events
    // -------------------------------------------------------------------------
    /// A report was skipped; only the last one of a pass is reported
    TransientError {
        /// Human-readable reason
        message: String,
    },

    /// The decoder cannot accept work yet; reports are being held
    DecoderNotReady {
        /// Reports currently held in the queue
        queued: usize,
    },

    /// The queue overflowed and dropped its oldest reports
    ReportsEvicted {
        /// Reports evicted since the last notification
        count: u64,
        /// Reports evicted since the pipeline started
        total: u64,
    },

    /// Transport connected
    Connected,

    /// Transport disconnected; queue, timers and sequencing were reset
    PipelineReset,

    /// An error outside the per-report path
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl PipelineEvent {
    /// Check if this event changes what the presentation shows
    pub fn is_view_change(&self) -> bool {
        matches!(
            self,
            PipelineEvent::SnapshotUpdated { .. }
                | PipelineEvent::EntriesAppended { .. }
                | PipelineEvent::SelectionChanged { .. }
                | PipelineEvent::LogCleared
        )
    }

    /// Check if this event reports a problem
    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            PipelineEvent::TransientError { .. }
                | PipelineEvent::DecoderNotReady { .. }
                | PipelineEvent::ReportsEvicted { .. }
                | PipelineEvent::Error { .. }
        )
    }
}
