//! Pipeline Actor
//!
//! Async task owning the [`Pipeline`] engine. The transport and the
//! presentation layer both talk to it through one command channel, and every
//! event it produces goes out through one event channel, so the engine only
//! ever has a single writer.
//!
//! # Architecture
//!
//! The actor waits on three things at once:
//! - the command channel (reports, lifecycle signals, presentation commands)
//! - the arrival notification timer, armed only while arrivals are coalesced
//! - the pass timer, armed only while a pass is deferred
//!
//! With nothing queued no timer is armed, so an idle pipeline costs nothing.
//!
//! Events are handed over with `try_send`. A presentation side that stops
//! reading loses events (counted in `PipelineStats::events_dropped`) but
//! never stalls the command channel, so the transport keeps flowing and
//! overload shows up as queue evictions.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdlens_pipeline::actor::{run_pipeline_actor, PipelineCommand};
//! use pdlens_pipeline::{PipelineConfig, PipelineEvent};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! tokio::spawn(run_pipeline_actor(decoder, PipelineConfig::default(), cmd_rx, event_tx));
//!
//! cmd_tx.send(PipelineCommand::Connected).await?;
//! ```

use std::time::Instant;

use pdlens_protocol::{epoch_ms, DecodedMessage, Decoder, InboundReport};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::engine::{Pipeline, PipelineView};
use crate::error::PipelineError;
use crate::events::PipelineEvent;

/// Commands sent to the pipeline actor
#[derive(Debug)]
pub enum PipelineCommand {
    /// One report from the transport
    Report {
        /// HID report id
        report_id: u8,
        /// Report payload
        bytes: Vec<u8>,
        /// Wall-clock arrival time (ms since epoch)
        arrival_ms: u64,
    },

    /// Transport connected
    Connected,

    /// Transport disconnected; resets queue, timers and sequencing
    Disconnected,

    /// Select a log entry (pins the selection)
    Select {
        /// Entry id
        id: u64,
    },

    /// Flip between auto-follow and pinned
    ToggleFollow,

    /// Clear the protocol log
    Clear,

    /// Decode one payload outside the streaming path
    RequestDecode {
        /// Hex payload; `None` reuses the last payload that decoded
        payload: Option<String>,
        /// Channel to send back the result
        response: oneshot::Sender<Result<DecodedMessage, PipelineError>>,
    },

    /// Query a copy of the current view
    QueryView {
        /// Channel to send back the view
        response: oneshot::Sender<PipelineView>,
    },

    /// The decoder finished starting up
    DecoderReady,

    /// Report an error from an async task (emits PipelineEvent::Error)
    ReportError {
        /// Source of the error (e.g., "Meter", "Decoder")
        source: String,
        /// Error message
        message: String,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Current instant on the tokio clock, as a std instant
///
/// Going through tokio keeps paused-time tests deterministic.
fn now() -> Instant {
    time::Instant::now().into_std()
}

/// Sleep until `deadline`, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Hand events over without waiting; returns how many did not fit
fn forward_events(event_tx: &mpsc::Sender<PipelineEvent>, events: Vec<PipelineEvent>) -> u64 {
    let mut dropped = 0;
    for event in events {
        match event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => dropped += 1,
            // Nobody listening; the view can still be queried
            Err(TrySendError::Closed(_)) => {}
        }
    }
    dropped
}

/// Run the pipeline actor
///
/// Processes every command through the pipeline engine and forwards the
/// events it produces. Returns when [`PipelineCommand::Shutdown`] is received
/// or every command sender is dropped.
///
/// # Arguments
///
/// * `decoder` - The external decoder
/// * `config` - Pipeline configuration
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `event_tx` - Sender for events emitted by the actor
pub async fn run_pipeline_actor<D: Decoder>(
    decoder: D,
    config: PipelineConfig,
    mut cmd_rx: mpsc::Receiver<PipelineCommand>,
    event_tx: mpsc::Sender<PipelineEvent>,
) {
    let mut pipeline = match Pipeline::with_config(decoder, config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            warn!("Pipeline actor not started: {}", e);
            let _ = event_tx
                .send(PipelineEvent::Error {
                    source: "Pipeline".to_string(),
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };
    info!("Pipeline actor started");

    let mut dropping = false;

    loop {
        let notify_at = pipeline.notify_deadline();
        let pass_at = pipeline.pass_deadline();
        let mut outgoing = Vec::new();

        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                match cmd {
                    PipelineCommand::Report { report_id, bytes, arrival_ms } => {
                        pipeline.ingest(InboundReport::new(report_id, bytes, arrival_ms), now());
                    }

                    PipelineCommand::Connected => pipeline.connect(),

                    PipelineCommand::Disconnected => pipeline.disconnect(),

                    PipelineCommand::Select { id } => {
                        if let Err(e) = pipeline.select(id) {
                            debug!("Select rejected: {}", e);
                            outgoing.push(PipelineEvent::Error {
                                source: "Selection".to_string(),
                                message: e.to_string(),
                            });
                        }
                    }

                    PipelineCommand::ToggleFollow => {
                        pipeline.toggle_follow();
                    }

                    PipelineCommand::Clear => pipeline.clear(),

                    PipelineCommand::RequestDecode { payload, response } => {
                        let result = pipeline.request_decode(payload.as_deref(), epoch_ms());
                        let _ = response.send(result);
                    }

                    PipelineCommand::QueryView { response } => {
                        let _ = response.send(pipeline.view());
                    }

                    PipelineCommand::DecoderReady => pipeline.decoder_ready(now()),

                    PipelineCommand::ReportError { source, message } => {
                        outgoing.push(PipelineEvent::Error { source, message });
                    }

                    PipelineCommand::Shutdown => {
                        info!("Pipeline actor shutting down");
                        break;
                    }
                }
            }
            _ = sleep_until(notify_at), if notify_at.is_some() => {
                pipeline.on_notify(now());
            }
            _ = sleep_until(pass_at), if pass_at.is_some() => {
                pipeline.on_pass_timer(now());
            }
        }

        outgoing.extend(pipeline.drain_events());
        let dropped = forward_events(&event_tx, outgoing);
        if dropped > 0 {
            if !dropping {
                warn!("Event consumer is behind, dropping pipeline events");
                dropping = true;
            }
            pipeline.record_dropped_events(dropped);
        } else if dropping && event_tx.capacity() > 0 {
            info!(
                "Event consumer caught up ({} events dropped so far)",
                pipeline.stats().events_dropped
            );
            dropping = false;
        }
    }

    info!("Pipeline actor stopped");
}
