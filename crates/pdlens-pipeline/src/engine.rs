//! Pipeline engine
//!
//! The single writer of all pipeline state: report queue, both rate
//! limiters, decode gateway, protocol log, selection and the latest
//! telemetry snapshot. Every method is synchronous and takes the current
//! instant from the caller, so the engine can be driven by the async actor
//! or stepped directly in tests.
//!
//! Events produced by any method are buffered and collected with
//! [`Pipeline::drain_events`].

use std::time::{Duration, Instant};

use pdlens_protocol::{DecodedMessage, Decoder, InboundReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator::TelemetrySnapshot;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::events::PipelineEvent;
use crate::gateway::{classify, BatchResult, DecodeGateway, Route};
use crate::limiter::{LimiterAction, TrailingLimiter};
use crate::log::{PendingProtocolEntry, ProtocolLog, ProtocolLogEntry};
use crate::queue::ReportQueue;
use crate::scheduler::BatchScheduler;
use crate::selection::{FollowMode, SelectionController};

/// Message surfaced while the decoder holds reports back
pub const DECODER_NOT_READY_MESSAGE: &str = "decoder not ready, holding reports";

/// Counters over the pipeline's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Reports accepted from the transport
    pub received: u64,
    /// Reports evicted by queue overflow
    pub evicted: u64,
    /// Reports decoded and routed
    pub decoded: u64,
    /// Reports skipped (malformed, decode failure, ignored kind)
    pub skipped: u64,
    /// Passes that ran
    pub passes: u64,
    /// Passes that found the decoder unavailable
    pub not_ready_passes: u64,
    /// Events dropped because the presentation side fell behind
    pub events_dropped: u64,
}

/// Read-only copy of everything the presentation layer shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineView {
    /// Latest telemetry snapshot
    pub snapshot: Option<TelemetrySnapshot>,
    /// Full protocol log in order
    pub entries: Vec<ProtocolLogEntry>,
    /// Effective selection
    pub selected: Option<u64>,
    /// Follow mode
    pub follow: FollowMode,
    /// Last surfaced transient error
    pub last_error: Option<String>,
    /// Lifetime counters
    pub stats: PipelineStats,
    /// Reports waiting for decode
    pub queue_len: usize,
    /// Whether the transport is connected
    pub connected: bool,
}

impl PipelineView {
    /// The selected log entry, if any
    pub fn selected_entry(&self) -> Option<&ProtocolLogEntry> {
        let id = self.selected?;
        self.entries.iter().find(|e| e.id == id)
    }
}

/// The pipeline engine
pub struct Pipeline<D> {
    config: PipelineConfig,
    queue: ReportQueue,
    notifier: TrailingLimiter,
    scheduler: BatchScheduler,
    gateway: DecodeGateway<D>,
    log: ProtocolLog,
    selection: SelectionController,
    snapshot: Option<TelemetrySnapshot>,
    last_error: Option<String>,
    stats: PipelineStats,
    connected: bool,
    decoder_waiting: bool,
    unreported_evictions: u64,
    event_buffer: Vec<PipelineEvent>,
}

impl<D: Decoder> Pipeline<D> {
    /// Create a pipeline with default configuration
    pub fn new(decoder: D) -> Self {
        Self::build(decoder, PipelineConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(decoder: D, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::build(decoder, config))
    }

    fn build(decoder: D, config: PipelineConfig) -> Self {
        info!(
            "Pipeline created: {} updates/s, queue capacity {}",
            config.max_updates_per_second, config.queue_capacity
        );

        Self {
            queue: ReportQueue::new(config.queue_capacity),
            notifier: TrailingLimiter::new(config.notify_interval()),
            scheduler: BatchScheduler::new(config.update_interval()),
            gateway: DecodeGateway::new(decoder),
            log: ProtocolLog::new(),
            selection: SelectionController::new(),
            snapshot: None,
            last_error: None,
            stats: PipelineStats::default(),
            connected: false,
            decoder_waiting: false,
            unreported_evictions: 0,
            event_buffer: Vec::new(),
            config,
        }
    }

    /// Count events the actor could not deliver
    pub fn record_dropped_events(&mut self, count: u64) {
        self.stats.events_dropped += count;
    }

    /// Get the current configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Transport side
    // -------------------------------------------------------------------------

    /// Transport connected
    pub fn connect(&mut self) {
        if !self.connected {
            self.connected = true;
            info!("Transport connected");
            self.event_buffer.push(PipelineEvent::Connected);
        }
    }

    /// Transport disconnected: hard-reset queue, timers and sequencing
    ///
    /// The protocol log, selection and last snapshot are kept.
    pub fn disconnect(&mut self) {
        let dropped = self.queue.len();
        self.connected = false;
        self.queue.reset();
        self.notifier.reset();
        self.scheduler.reset();
        self.decoder_waiting = false;
        self.unreported_evictions = 0;

        info!("Transport disconnected, dropped {} queued reports", dropped);
        self.event_buffer.push(PipelineEvent::PipelineReset);
    }

    /// Whether the transport is connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Accept one report from the transport
    ///
    /// Returns the assigned sequence number. Never blocks and never fails;
    /// overflow evicts the oldest queued report.
    pub fn ingest(&mut self, inbound: InboundReport, now: Instant) -> u64 {
        let outcome = self.queue.push(inbound);
        self.stats.received += 1;
        if outcome.evicted.is_some() {
            self.stats.evicted += 1;
            self.unreported_evictions += 1;
        }

        debug!("Queued report seq {} ({} waiting)", outcome.seq, self.queue.len());

        if self.notifier.on_event(now) == LimiterAction::Fire {
            self.notify(now);
        }
        outcome.seq
    }

    /// Deadline of the coalesced arrival notification, if armed
    pub fn notify_deadline(&self) -> Option<Instant> {
        self.notifier.deadline()
    }

    /// Deliver the coalesced arrival notification when it is due
    pub fn on_notify(&mut self, now: Instant) {
        if self.notifier.is_due(now) {
            self.notify(now);
        }
    }

    fn notify(&mut self, now: Instant) {
        self.notifier.mark_fired(now);

        if self.unreported_evictions > 0 {
            self.event_buffer.push(PipelineEvent::ReportsEvicted {
                count: self.unreported_evictions,
                total: self.stats.evicted,
            });
            self.unreported_evictions = 0;
        }

        if self.scheduler.on_arrival(now) {
            self.run_pass(now);
        }
    }

    // -------------------------------------------------------------------------
    // Decode passes
    // -------------------------------------------------------------------------

    /// Deadline of the next scheduled pass, if armed
    pub fn pass_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Run the scheduled pass when it is due
    pub fn on_pass_timer(&mut self, now: Instant) {
        if self.scheduler.take_due(now) {
            self.run_pass(now);
        }
    }

    /// The decoder reported it became available
    pub fn decoder_ready(&mut self, now: Instant) {
        info!("Decoder ready");
        if !self.queue.is_empty() && self.scheduler.on_arrival(now) {
            self.run_pass(now);
        }
    }

    /// Run one pass over everything queued, ignoring the cadence
    ///
    /// Results are applied before the queue is released, so a report is
    /// never dropped before its outcome is visible.
    pub fn run_pass(&mut self, now: Instant) {
        if self.queue.is_empty() {
            self.scheduler.pass_completed(now, false);
            return;
        }

        let reports = self.queue.peek_all();
        let result = self.gateway.run_pass(&reports);
        self.stats.passes += 1;

        let released_up_to = result.released_up_to;
        self.apply(result);

        if let Some(seq) = released_up_to {
            self.queue.release_up_to(seq);
        }

        let backlog = !self.queue.is_empty();
        if backlog {
            debug!("{} reports still queued after pass", self.queue.len());
        }
        self.scheduler.pass_completed(now, backlog);
    }

    fn apply(&mut self, result: BatchResult) {
        self.stats.decoded += result.decoded;
        self.stats.skipped += result.skipped;

        if let Some(snapshot) = result.snapshot {
            self.set_snapshot(snapshot);
        }

        self.append_entries(result.protocol);

        if let Some(reason) = result.last_error {
            self.surface_error(reason.to_string());
        }

        if result.not_ready {
            self.stats.not_ready_passes += 1;
            if !self.decoder_waiting {
                self.decoder_waiting = true;
                warn!("Decoder not ready, holding {} reports", self.queue.len());
                if self.last_error.is_none() {
                    self.last_error = Some(DECODER_NOT_READY_MESSAGE.to_string());
                }
                self.event_buffer.push(PipelineEvent::DecoderNotReady {
                    queued: self.queue.len(),
                });
            }
        } else if self.decoder_waiting {
            self.decoder_waiting = false;
            if self.last_error.as_deref() == Some(DECODER_NOT_READY_MESSAGE) {
                self.last_error = None;
            }
        }
    }

    fn set_snapshot(&mut self, snapshot: TelemetrySnapshot) {
        self.event_buffer.push(PipelineEvent::SnapshotUpdated {
            snapshot: snapshot.clone(),
        });
        self.snapshot = Some(snapshot);
    }

    fn append_entries(&mut self, pending: Vec<PendingProtocolEntry>) {
        if pending.is_empty() {
            return;
        }

        let ids = self.log.append(pending);
        let appended = self.log.entries()[self.log.len() - ids.len()..].to_vec();
        self.event_buffer
            .push(PipelineEvent::EntriesAppended { entries: appended });

        if let Some(&latest) = ids.last() {
            if self.selection.on_append(latest) {
                self.push_selection();
            }
        }
    }

    fn surface_error(&mut self, message: String) {
        self.event_buffer.push(PipelineEvent::TransientError {
            message: message.clone(),
        });
        self.last_error = Some(message);
    }

    fn push_selection(&mut self) {
        self.event_buffer.push(PipelineEvent::SelectionChanged {
            selected: self.selection.resolve(&self.log),
            follow: self.selection.mode(),
        });
    }

    // -------------------------------------------------------------------------
    // Presentation commands
    // -------------------------------------------------------------------------

    /// Select a log entry; switches to pinned mode
    pub fn select(&mut self, id: u64) -> Result<(), PipelineError> {
        if !self.log.contains(id) {
            return Err(PipelineError::EntryNotFound(id));
        }
        let was_pinned = self.selection.mode() == FollowMode::Pinned;
        if self.selection.select(id) || !was_pinned {
            self.push_selection();
        }
        Ok(())
    }

    /// Flip between auto-follow and pinned
    pub fn toggle_follow(&mut self) -> FollowMode {
        let latest = self.log.latest().map(|e| e.id);
        let mode = self.selection.toggle_follow(latest);
        self.push_selection();
        mode
    }

    /// Empty the protocol log and reset its counters
    pub fn clear(&mut self) {
        info!("Clearing {} protocol log entries", self.log.len());
        self.log.clear();
        self.selection.on_clear();
        self.event_buffer.push(PipelineEvent::LogCleared);
        self.push_selection();
    }

    /// Decode one payload outside the streaming path
    ///
    /// `None` reuses the last payload that decoded. A telemetry result
    /// replaces the snapshot; a protocol result is appended to the log,
    /// stamped with `now_ms`.
    pub fn request_decode(
        &mut self,
        payload: Option<&str>,
        now_ms: u64,
    ) -> Result<DecodedMessage, PipelineError> {
        self.last_error = None;

        let (family, message) = match self.gateway.decode_manual(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Manual decode failed: {}", e);
                self.surface_error(e.to_string());
                return Err(e.into());
            }
        };

        // Manual decodes are not sequenced by the queue
        match classify(family, 0, now_ms, &message) {
            Route::Telemetry(sample) => {
                self.set_snapshot(TelemetrySnapshot::from_sample(sample));
            }
            Route::Protocol(entry) => self.append_entries(vec![entry]),
            Route::Ignored(why) => debug!("Manual decode not routed: {}", why),
        }

        Ok(message)
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// Copy of everything the presentation layer shows
    pub fn view(&self) -> PipelineView {
        PipelineView {
            snapshot: self.snapshot.clone(),
            entries: self.log.entries().to_vec(),
            selected: self.selection.resolve(&self.log),
            follow: self.selection.mode(),
            last_error: self.last_error.clone(),
            stats: self.stats,
            queue_len: self.queue.len(),
            connected: self.connected,
        }
    }

    /// Latest telemetry snapshot
    pub fn snapshot(&self) -> Option<&TelemetrySnapshot> {
        self.snapshot.as_ref()
    }

    /// The protocol log
    pub fn log(&self) -> &ProtocolLog {
        &self.log
    }

    /// Effective selection
    pub fn selected(&self) -> Option<u64> {
        self.selection.resolve(&self.log)
    }

    /// Current follow mode
    pub fn follow_mode(&self) -> FollowMode {
        self.selection.mode()
    }

    /// Last surfaced transient error
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Lifetime counters
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// The report queue
    pub fn queue(&self) -> &ReportQueue {
        &self.queue
    }

    /// Hex of the last payload that decoded
    pub fn last_payload(&self) -> &str {
        self.gateway.last_payload()
    }

    /// Minimum spacing between passes
    pub fn update_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    /// Drain all pending events
    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}
