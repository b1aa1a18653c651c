//! Error types for the pipeline

use pdlens_protocol::{DecodeError, ReportError};
use thiserror::Error;

/// Errors returned by pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration cannot drive a pipeline
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Protocol log entry does not exist
    #[error("log entry not found: {0}")]
    EntryNotFound(u64),

    /// Manual decode failed
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Pipeline actor is no longer running
    #[error("pipeline actor unavailable")]
    ActorUnavailable,
}

/// Why a single report was skipped during a pass
///
/// Skips are transient: the report is still released and the pass continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Report failed its length rule
    #[error("malformed report: {0}")]
    Malformed(#[from] ReportError),

    /// Decoder rejected the report
    #[error("decode failed: {0}")]
    DecodeFailed(#[from] DecodeError),
}
