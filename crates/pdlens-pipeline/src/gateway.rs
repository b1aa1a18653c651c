//! Decode gateway
//!
//! Runs one batch of queued reports through the external decoder. Each
//! report is length-checked, decoded and routed by the decoder's kind:
//! telemetry into the aggregator, protocol messages into pending log
//! entries. Per-report failures are skipped, never fatal. A decoder that is
//! not ready stops the batch so the remaining reports stay queued.

use pdlens_protocol::{
    parse_hex, validate_length, DecodeError, DecodedMessage, Decoder, MessageKind, RawReport,
    ReportFamily, TelemetrySample,
};
use tracing::{debug, warn};

use crate::aggregator::{MetricsAggregator, TelemetrySnapshot};
use crate::error::SkipReason;
use crate::log::PendingProtocolEntry;

/// Manual decode payload used before any report has decoded
pub const DEFAULT_PAYLOAD: &str = "FF FF FF FF FF FF FF FF";

/// Where a decoded message goes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Telemetry sample for the aggregator
    Telemetry(TelemetrySample),
    /// Entry for the protocol log
    Protocol(PendingProtocolEntry),
    /// Dropped without surfacing an error
    Ignored(&'static str),
}

/// Route a decoded message by its kind
///
/// Routing is structural: a report whose marker names one family but which
/// decodes to another kind is ignored, as is any kind other than telemetry
/// or protocol.
pub fn classify(
    family: ReportFamily,
    seq: u64,
    arrival_ms: u64,
    message: &DecodedMessage,
) -> Route {
    let consistent = match family {
        ReportFamily::Telemetry => message.kind == MessageKind::Telemetry,
        ReportFamily::Protocol => message.kind == MessageKind::Protocol,
        ReportFamily::Unknown => true,
    };
    if !consistent {
        return Route::Ignored("kind does not match report marker");
    }

    match message.kind {
        MessageKind::Telemetry => TelemetrySample::from_message(message)
            .map_or(Route::Ignored("no telemetry fields"), Route::Telemetry),
        MessageKind::Protocol => PendingProtocolEntry::from_message(seq, arrival_ms, message)
            .map_or(Route::Ignored("no protocol summary"), Route::Protocol),
        MessageKind::Other(_) => Route::Ignored("unhandled message kind"),
    }
}

/// Everything one pass produced
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Averaged telemetry, when the batch held any
    pub snapshot: Option<TelemetrySnapshot>,
    /// Protocol entries in report order
    pub protocol: Vec<PendingProtocolEntry>,
    /// Highest seq whose outcome is final; release up to here
    pub released_up_to: Option<u64>,
    /// Reports that decoded and were routed
    pub decoded: u64,
    /// Reports skipped (malformed, failed or ignored)
    pub skipped: u64,
    /// Last transient error of the pass
    pub last_error: Option<SkipReason>,
    /// Whether the pass stopped because the decoder was not ready
    pub not_ready: bool,
}

impl BatchResult {
    /// Number of reports whose outcome is final
    pub fn processed(&self) -> u64 {
        self.decoded + self.skipped
    }
}

/// Calls the decoder for queued reports and classifies the results
#[derive(Debug)]
pub struct DecodeGateway<D> {
    decoder: D,
    last_payload: String,
}

impl<D: Decoder> DecodeGateway<D> {
    /// Wrap a decoder
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            last_payload: DEFAULT_PAYLOAD.to_string(),
        }
    }

    /// Whether the decoder currently accepts work
    pub fn is_ready(&self) -> bool {
        self.decoder.is_ready()
    }

    /// The wrapped decoder
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Hex of the last payload that decoded
    pub fn last_payload(&self) -> &str {
        &self.last_payload
    }

    /// Decode a batch of reports in seq order
    pub fn run_pass(&mut self, reports: &[RawReport]) -> BatchResult {
        let mut result = BatchResult::default();

        if !self.decoder.is_ready() {
            debug!("Decoder not ready, holding {} reports", reports.len());
            result.not_ready = true;
            return result;
        }

        let mut aggregator = MetricsAggregator::new();

        for report in reports {
            let family = match validate_length(&report.bytes) {
                Ok(family) => family,
                Err(e) => {
                    warn!("Skipping malformed report seq {}: {}", report.seq, e);
                    result.skipped += 1;
                    result.last_error = Some(SkipReason::Malformed(e));
                    result.released_up_to = Some(report.seq);
                    continue;
                }
            };

            let hex = report.hex();
            let message = match self.decoder.decode(&hex) {
                Ok(message) => message,
                Err(e) if e.is_not_ready() => {
                    debug!("Decoder became unavailable at seq {}", report.seq);
                    result.not_ready = true;
                    break;
                }
                Err(e) => {
                    warn!("Decode failed for seq {}: {}", report.seq, e);
                    result.skipped += 1;
                    result.last_error = Some(SkipReason::DecodeFailed(e));
                    result.released_up_to = Some(report.seq);
                    continue;
                }
            };

            self.last_payload = hex;
            result.released_up_to = Some(report.seq);

            match classify(family, report.seq, report.arrival_ms, &message) {
                Route::Telemetry(sample) => {
                    aggregator.add(sample);
                    result.decoded += 1;
                }
                Route::Protocol(entry) => {
                    debug!(
                        "Decoded protocol message seq {}: {}",
                        report.seq, entry.summary.message_type
                    );
                    result.protocol.push(entry);
                    result.decoded += 1;
                }
                Route::Ignored(why) => {
                    debug!(
                        "Ignoring {} report seq {} ({}): {}",
                        family.name(),
                        report.seq,
                        message.kind.tag(),
                        why
                    );
                    result.skipped += 1;
                }
            }
        }

        result.snapshot = aggregator.finish();
        result
    }

    /// Decode a single payload outside the streaming path
    ///
    /// `None` decodes the last payload that succeeded. The report family is
    /// taken from the payload's marker byte.
    pub fn decode_manual(
        &mut self,
        payload: Option<&str>,
    ) -> Result<(ReportFamily, DecodedMessage), DecodeError> {
        let payload = payload.map_or_else(|| self.last_payload.clone(), str::to_string);
        let bytes = parse_hex(&payload)?;

        if !self.decoder.is_ready() {
            return Err(DecodeError::NotReady);
        }

        let message = self.decoder.decode(&payload)?;
        self.last_payload = payload;
        Ok((ReportFamily::of(&bytes), message))
    }
}
