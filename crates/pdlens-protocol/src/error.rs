//! Error types for report validation and decoding

use thiserror::Error;

/// Length problems detected before a report reaches the decoder
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Report is shorter than the smallest possible frame
    #[error("report too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    /// Telemetry report is missing part of its fixed-size body
    #[error("telemetry report truncated: {len} of {expected} bytes")]
    TelemetryTruncated { len: usize, expected: usize },

    /// Protocol report is shorter than its header declares
    #[error("protocol report truncated: header declares {declared} bytes, got {actual}")]
    ProtocolTruncated { declared: usize, actual: usize },
}

/// Errors returned by a [`Decoder`](crate::Decoder)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Decoder cannot accept work yet (still warming up)
    #[error("decoder not ready")]
    NotReady,

    /// Payload contained no hex digits
    #[error("empty payload")]
    EmptyPayload,

    /// Hex payload has an odd number of digits
    #[error("hex payload has odd length {0}")]
    OddLength(usize),

    /// Payload contained a non-hex character
    #[error("invalid hex digit {0:?}")]
    InvalidHex(char),

    /// First byte is neither the telemetry nor the protocol marker
    #[error("unknown report marker 0x{0:02X}")]
    UnknownMarker(u8),

    /// Payload was structurally rejected by the decoder
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Decoder answered with a non-ok status
    #[error("decoder reported status {0:?}")]
    Status(String),
}

impl DecodeError {
    /// Whether this error means the decoder is unavailable rather than the report bad
    pub fn is_not_ready(&self) -> bool {
        matches!(self, DecodeError::NotReady)
    }
}

impl From<ReportError> for DecodeError {
    fn from(err: ReportError) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}
