//! pdlens Pipeline
//!
//! This crate turns a bursty stream of raw meter reports into a live,
//! rate-limited view: an averaged telemetry snapshot and an ordered,
//! delta-timed log of captured protocol messages.
//!
//! # Architecture
//!
//! ```text
//! transport -> ReportQueue -> BatchScheduler tick -> DecodeGateway
//!                                                      |-> MetricsAggregator -> snapshot
//!                                                      '-> ProtocolLog -> SelectionController
//! ```
//!
//! - **Report queue**: bounded, sequenced; evicts the oldest report on
//!   overflow and only shrinks by explicit release after a pass
//! - **Scheduler**: at most one decode pass per update interval; bursts are
//!   coalesced, idle costs nothing
//! - **Gateway**: per-report length checks and decode; failures are skipped,
//!   an unavailable decoder holds the queue
//! - **Log and selection**: append-only history with an auto-follow cursor
//!
//! All state lives in one [`Pipeline`] engine. The [`actor`] module runs it
//! as a tokio task, with every event going out through a single
//! [`PipelineEvent`] stream.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use pdlens_pipeline::Pipeline;
//! use pdlens_protocol::{
//!     DecodeError, DecodedMessage, Decoder, InboundReport, MessageKind, MetadataNode,
//! };
//!
//! struct PingDecoder;
//!
//! impl Decoder for PingDecoder {
//!     fn decode(&self, hex: &str) -> Result<DecodedMessage, DecodeError> {
//!         Ok(DecodedMessage {
//!             kind: MessageKind::Protocol,
//!             tree: MetadataNode::root(vec![]),
//!             raw_hex: hex.to_string(),
//!             protocol_message_type: Some("Ping".into()),
//!         })
//!     }
//! }
//!
//! let mut pipeline = Pipeline::new(PingDecoder);
//! pipeline.ingest(InboundReport::new(0, vec![0xFE, 0x02, 0x41, 0x00], 1_000), Instant::now());
//!
//! let view = pipeline.view();
//! assert_eq!(view.entries.len(), 1);
//! assert_eq!(view.selected, Some(1));
//! ```

pub mod actor;
pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod limiter;
pub mod log;
pub mod queue;
pub mod scheduler;
pub mod selection;

#[cfg(test)]
mod testing;

// Re-export actor types
pub use actor::{run_pipeline_actor, PipelineCommand};

// Re-export event types
pub use events::PipelineEvent;

// Re-export engine types
pub use aggregator::{MetricsAggregator, TelemetrySnapshot};
pub use config::{
    PipelineConfig, DEFAULT_MAX_UPDATES_PER_SECOND, DEFAULT_QUEUE_CAPACITY, MAX_UPDATES_PER_SECOND,
};
pub use engine::{Pipeline, PipelineStats, PipelineView, DECODER_NOT_READY_MESSAGE};
pub use error::{PipelineError, SkipReason};
pub use gateway::{classify, BatchResult, DecodeGateway, Route, DEFAULT_PAYLOAD};
pub use limiter::{LimiterAction, TrailingLimiter};
pub use log::{PendingProtocolEntry, ProtocolLog, ProtocolLogEntry};
pub use queue::{PushOutcome, ReportQueue};
pub use scheduler::BatchScheduler;
pub use selection::{FollowMode, SelectionController};
