//! Error types for the simulation

use thiserror::Error;

/// Errors from building or running a simulated meter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Source offers nothing to negotiate
    #[error("virtual meter needs at least one supply profile")]
    NoSupplyProfiles,

    /// Source_Capabilities holds at most seven data objects
    #[error("virtual meter supports at most 7 supply profiles, got {0}")]
    TooManyProfiles(usize),

    /// Load current is negative or not a number
    #[error("invalid load current {0} A")]
    InvalidLoad(f64),

    /// A report interval of zero
    #[error("{0} interval must be greater than zero")]
    ZeroInterval(&'static str),
}
