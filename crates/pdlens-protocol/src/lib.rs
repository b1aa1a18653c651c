//! pdlens Protocol Library
//!
//! This crate defines what flows through the pdlens pipeline:
//!
//! - **Reports**: raw, sequenced HID reports from a USB power meter that also
//!   sniffs USB Power Delivery traffic, and the length rules for each family
//! - **Decoder boundary**: the [`Decoder`] trait and the self-describing
//!   [`MetadataNode`] tree it returns
//! - **Field extraction**: [`TelemetrySample`] for status reports and
//!   [`PdSummary`] for captured PD messages
//!
//! # Report families
//!
//! | Marker | Family    | Length rule                          |
//! |--------|-----------|--------------------------------------|
//! | `0xFF` | telemetry | exactly 64 bytes of status           |
//! | `0xFE` | protocol  | at least `bytes[1] + 2` bytes        |
//!
//! # Example
//!
//! ```rust
//! use pdlens_protocol::{validate_length, ReportFamily, ReportError};
//!
//! let pd = [0xFE, 0x02, 0x43, 0x01];
//! assert_eq!(validate_length(&pd), Ok(ReportFamily::Protocol));
//!
//! let truncated = [0xFF, 0x00, 0x00];
//! assert!(matches!(
//!     validate_length(&truncated),
//!     Err(ReportError::TelemetryTruncated { .. })
//! ));
//! ```

pub mod decode;
pub mod display;
pub mod error;
pub mod metadata;
pub mod pd;
pub mod report;
pub mod telemetry;

pub use decode::{normalize_hex, parse_hex, DecodedMessage, Decoder, MessageKind};
pub use error::{DecodeError, ReportError};
pub use metadata::{MetadataNode, MetadataValue};
pub use pd::PdSummary;
pub use report::{
    epoch_ms, validate_length, InboundReport, RawReport, ReportFamily, PROTOCOL_MARKER,
    TELEMETRY_MARKER, TELEMETRY_REPORT_LEN,
};
pub use telemetry::{AuxFields, TelemetrySample};
