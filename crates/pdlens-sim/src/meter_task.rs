//! Virtual meter actor task
//!
//! This module provides a pure async task that owns a VirtualMeter and plays
//! the device transport towards the pipeline actor. The task uses a select!
//! loop to:
//! - Emit a status report on every telemetry tick
//! - Emit a PD message exchange on every protocol tick
//! - Handle plug/unplug, load changes and shutdown from a command channel

use std::time::Duration;

use pdlens_pipeline::PipelineCommand;
use pdlens_protocol::epoch_ms;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{self, interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::decoder::SimDecoder;
use crate::error::SimError;
use crate::VirtualMeter;

/// Commands that can be sent to a virtual meter task
#[derive(Debug, Clone)]
pub enum MeterCommand {
    /// Change the simulated load current (amperes)
    SetLoad(f64),
    /// Change the board temperature; `None` removes the sensor
    SetTemperature(Option<f64>),
    /// Unplug the meter (the pipeline sees a disconnect)
    Unplug,
    /// Plug the meter back in
    Plug,
    /// Shutdown the virtual meter task
    Shutdown,
}

/// Report pacing of a virtual meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterTiming {
    /// Milliseconds between status reports
    pub telemetry_interval_ms: u64,
    /// Milliseconds between PD message exchanges
    pub protocol_interval_ms: u64,
}

impl Default for MeterTiming {
    fn default() -> Self {
        Self {
            telemetry_interval_ms: 20,
            protocol_interval_ms: 1_500,
        }
    }
}

impl MeterTiming {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.telemetry_interval_ms == 0 {
            return Err(SimError::ZeroInterval("telemetry"));
        }
        if self.protocol_interval_ms == 0 {
            return Err(SimError::ZeroInterval("protocol"));
        }
        Ok(())
    }
}

/// Run the virtual meter task
///
/// Announces the connection, then streams reports into the pipeline until
/// shut down. Ends early when the pipeline actor is gone.
///
/// # Arguments
///
/// * `meter` - The simulated meter
/// * `timing` - Report pacing
/// * `cmd_rx` - Receiver for commands sent to the task
/// * `pipeline_tx` - Sender into the pipeline actor
pub async fn run_meter_task(
    mut meter: VirtualMeter,
    timing: MeterTiming,
    mut cmd_rx: mpsc::Receiver<MeterCommand>,
    pipeline_tx: mpsc::Sender<PipelineCommand>,
) -> Result<(), SimError> {
    timing.validate()?;

    let telemetry_period = Duration::from_millis(timing.telemetry_interval_ms);
    let mut telemetry_timer = interval(telemetry_period);
    telemetry_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut protocol_timer = interval(Duration::from_millis(timing.protocol_interval_ms));
    protocol_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Starting virtual meter task for {} (telemetry every {} ms, PD every {} ms)",
        meter.id(),
        timing.telemetry_interval_ms,
        timing.protocol_interval_ms
    );

    let mut plugged = true;
    if pipeline_tx.send(PipelineCommand::Connected).await.is_err() {
        warn!("Pipeline gone before virtual meter {} connected", meter.id());
        return Ok(());
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(MeterCommand::SetLoad(amps)) => {
                        debug!("Virtual meter {} load set to {} A", meter.id(), amps);
                        meter.set_current(amps);
                    }
                    Some(MeterCommand::SetTemperature(celsius)) => {
                        meter.set_temperature(celsius);
                    }
                    Some(MeterCommand::Unplug) => {
                        if plugged {
                            info!("Virtual meter {} unplugged", meter.id());
                            plugged = false;
                            if pipeline_tx.send(PipelineCommand::Disconnected).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(MeterCommand::Plug) => {
                        if !plugged {
                            info!("Virtual meter {} plugged in", meter.id());
                            plugged = true;
                            telemetry_timer.reset();
                            protocol_timer.reset();
                            if pipeline_tx.send(PipelineCommand::Connected).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(MeterCommand::Shutdown) => {
                        info!("Shutdown requested for virtual meter {}", meter.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual meter {}", meter.id());
                        break;
                    }
                }
            }

            _ = telemetry_timer.tick(), if plugged => {
                let bytes = meter.telemetry_report(telemetry_period);
                if send_report(&pipeline_tx, meter.report_id(), bytes).await.is_err() {
                    debug!("Pipeline closed, stopping virtual meter {}", meter.id());
                    break;
                }
            }

            _ = protocol_timer.tick(), if plugged => {
                let exchange = meter.next_exchange();
                debug!(
                    "Virtual meter {} sending PD exchange of {} reports",
                    meter.id(),
                    exchange.len()
                );
                let mut closed = false;
                for bytes in exchange {
                    if send_report(&pipeline_tx, meter.report_id(), bytes).await.is_err() {
                        closed = true;
                        break;
                    }
                }
                if closed {
                    debug!("Pipeline closed, stopping virtual meter {}", meter.id());
                    break;
                }
            }
        }
    }

    if plugged {
        let _ = pipeline_tx.send(PipelineCommand::Disconnected).await;
    }
    info!("Virtual meter task ended for {}", meter.id());
    Ok(())
}

async fn send_report(
    pipeline_tx: &mpsc::Sender<PipelineCommand>,
    report_id: u8,
    bytes: Vec<u8>,
) -> Result<(), mpsc::error::SendError<PipelineCommand>> {
    pipeline_tx
        .send(PipelineCommand::Report {
            report_id,
            bytes,
            arrival_ms: epoch_ms(),
        })
        .await
}

/// Mark the decoder ready after `delay` and tell the pipeline
///
/// Stands in for the start-up time of a real decoder runtime.
pub async fn run_decoder_warmup(
    decoder: SimDecoder,
    delay: Duration,
    pipeline_tx: mpsc::Sender<PipelineCommand>,
) {
    debug!("Decoder warming up for {:?}", delay);
    time::sleep(delay).await;
    decoder.mark_ready();
    info!("Decoder ready after {:?}", delay);
    let _ = pipeline_tx.send(PipelineCommand::DecoderReady).await;
}
