//! Decoder boundary
//!
//! The bit-level decoder is an external collaborator. The pipeline only needs
//! it to turn a hex payload into a [`DecodedMessage`] or fail; each call is
//! independent.

use crate::error::DecodeError;
use crate::metadata::MetadataNode;

/// Message class reported by the decoder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    /// Meter status (voltage, current, temperature, counters)
    Telemetry,
    /// Captured power-delivery message
    Protocol,
    /// Any other kind the decoder may report; never reinterpreted
    Other(String),
}

impl MessageKind {
    /// Map the decoder's kind tag to a kind
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "general" | "telemetry" => MessageKind::Telemetry,
            "pd" | "protocol" => MessageKind::Protocol,
            other => MessageKind::Other(other.to_string()),
        }
    }

    /// Returns the tag for this kind
    pub fn tag(&self) -> &str {
        match self {
            MessageKind::Telemetry => "telemetry",
            MessageKind::Protocol => "protocol",
            MessageKind::Other(tag) => tag,
        }
    }
}

/// Successful decoder output
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedMessage {
    /// Message class
    pub kind: MessageKind,
    /// Parse tree
    pub tree: MetadataNode,
    /// Normalized hex of the decoded payload
    pub raw_hex: String,
    /// Protocol message subtype, when the decoder could determine it
    pub protocol_message_type: Option<String>,
}

/// External decoder boundary
///
/// Implementations must be callable many times per second. A decoder that is
/// still starting up reports `is_ready() == false` (or returns
/// [`DecodeError::NotReady`]) and the pipeline holds its queued reports.
pub trait Decoder: Send {
    /// Whether the decoder can currently accept work
    fn is_ready(&self) -> bool {
        true
    }

    /// Decode one hex payload
    fn decode(&self, hex: &str) -> Result<DecodedMessage, DecodeError>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn decode(&self, hex: &str) -> Result<DecodedMessage, DecodeError> {
        (**self).decode(hex)
    }
}

/// Normalize a hex payload: drop whitespace, upper-case, check digit count
pub fn normalize_hex(payload: &str) -> Result<String, DecodeError> {
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex(bad));
    }
    if cleaned.len() % 2 != 0 {
        return Err(DecodeError::OddLength(cleaned.len()));
    }

    Ok(cleaned)
}

/// Parse a hex payload (whitespace allowed) into bytes
pub fn parse_hex(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let cleaned = normalize_hex(payload)?;
    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_value(digit: u8) -> Result<u8, DecodeError> {
    (digit as char)
        .to_digit(16)
        .map(|v| v as u8)
        .ok_or(DecodeError::InvalidHex(digit as char))
}
