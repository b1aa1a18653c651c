//! Raw reports as delivered by the meter transport
//!
//! The meter emits two report families on the same HID interface:
//!
//! ```text
//! Telemetry:  FF <63 bytes of fixed-layout status>
//! Protocol:   FE <len> <len bytes of captured PD message>
//! ```
//!
//! Families are told apart by the marker byte alone. Length rules are checked
//! here so that obviously truncated reports never reach the decoder.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::display::format_hex;
use crate::error::ReportError;

/// Marker byte of a telemetry (status) report
pub const TELEMETRY_MARKER: u8 = 0xFF;

/// Marker byte of a protocol (captured PD message) report
pub const PROTOCOL_MARKER: u8 = 0xFE;

/// Fixed length of a telemetry report in bytes
pub const TELEMETRY_REPORT_LEN: usize = 64;

/// Size of the protocol report header (marker + length byte)
pub const PROTOCOL_HEADER_LEN: usize = 2;

/// Smallest report that can be classified at all
pub const MIN_REPORT_LEN: usize = 2;

/// Report family, derived from the marker byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReportFamily {
    /// Periodic voltage/current/temperature status
    Telemetry,
    /// One captured power-delivery message
    Protocol,
    /// Anything else; left to the decoder to reject
    Unknown,
}

impl ReportFamily {
    /// Classify raw bytes by their marker byte
    pub fn of(bytes: &[u8]) -> Self {
        match bytes.first() {
            Some(&TELEMETRY_MARKER) => ReportFamily::Telemetry,
            Some(&PROTOCOL_MARKER) => ReportFamily::Protocol,
            _ => ReportFamily::Unknown,
        }
    }

    /// Returns a human-readable name for the family
    pub fn name(&self) -> &'static str {
        match self {
            ReportFamily::Telemetry => "telemetry",
            ReportFamily::Protocol => "protocol",
            ReportFamily::Unknown => "unknown",
        }
    }
}

/// Check the length rules for a report and return its family
///
/// Telemetry reports must carry the full fixed-size body. Protocol reports
/// must be at least as long as their header byte declares.
pub fn validate_length(bytes: &[u8]) -> Result<ReportFamily, ReportError> {
    let result = check_length(bytes);
    if let Err(e) = &result {
        tracing::debug!("Rejected {}-byte report: {}", bytes.len(), e);
    }
    result
}

fn check_length(bytes: &[u8]) -> Result<ReportFamily, ReportError> {
    if bytes.len() < MIN_REPORT_LEN {
        return Err(ReportError::TooShort {
            len: bytes.len(),
            min: MIN_REPORT_LEN,
        });
    }

    let family = ReportFamily::of(bytes);
    match family {
        ReportFamily::Telemetry if bytes.len() < TELEMETRY_REPORT_LEN => {
            Err(ReportError::TelemetryTruncated {
                len: bytes.len(),
                expected: TELEMETRY_REPORT_LEN,
            })
        }
        ReportFamily::Protocol => {
            let declared = bytes[1] as usize + PROTOCOL_HEADER_LEN;
            if bytes.len() < declared {
                Err(ReportError::ProtocolTruncated {
                    declared,
                    actual: bytes.len(),
                })
            } else {
                Ok(family)
            }
        }
        _ => Ok(family),
    }
}

/// A report as handed over by the transport, before sequencing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReport {
    /// HID report id
    pub report_id: u8,
    /// Report payload
    pub bytes: Vec<u8>,
    /// Wall-clock arrival time in milliseconds since the Unix epoch
    pub arrival_ms: u64,
}

impl InboundReport {
    /// Create a new inbound report
    pub fn new(report_id: u8, bytes: Vec<u8>, arrival_ms: u64) -> Self {
        Self {
            report_id,
            bytes,
            arrival_ms,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A sequenced, immutable report owned by the report queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport {
    /// Sequence number, strictly increasing within one connection
    pub seq: u64,
    /// HID report id
    pub report_id: u8,
    /// Report payload
    pub bytes: Arc<[u8]>,
    /// Wall-clock arrival time in milliseconds since the Unix epoch
    pub arrival_ms: u64,
}

impl RawReport {
    /// Sequence an inbound report
    pub fn from_inbound(seq: u64, inbound: InboundReport) -> Self {
        Self {
            seq,
            report_id: inbound.report_id,
            bytes: inbound.bytes.into(),
            arrival_ms: inbound.arrival_ms,
        }
    }

    /// Family of this report
    pub fn family(&self) -> ReportFamily {
        ReportFamily::of(&self.bytes)
    }

    /// Upper-case, space separated hex of the payload
    pub fn hex(&self) -> String {
        format_hex(&self.bytes)
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
