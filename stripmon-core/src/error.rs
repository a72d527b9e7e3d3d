//! Error types for stripmon-core.

use crate::detector::ModuleId;
use std::fmt;
use thiserror::Error;

/// Result type alias for stripmon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a cluster was refused by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidClusterReason {
    /// The amplitude sequence has no strips.
    Empty,
    /// No strip carries a positive amplitude, so noise is undefined.
    NoSignal,
    /// The summed amplitude does not fit the charge type.
    ChargeOverflow,
}

impl fmt::Display for InvalidClusterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty amplitude sequence"),
            Self::NoSignal => f.write_str("no strip with positive amplitude"),
            Self::ChargeOverflow => f.write_str("charge exceeds u32 range"),
        }
    }
}

/// Core error types for stripmon operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Cluster cannot be turned into metrics.
    #[error("invalid cluster on module {module}: {reason}")]
    InvalidCluster {
        module: ModuleId,
        reason: InvalidClusterReason,
    },

    /// No noise calibration for a strip.
    #[error("no noise calibration for module {module}, strip {strip}")]
    CalibrationMissing { module: ModuleId, strip: u32 },

    /// Fill for an event older than the last accepted one.
    #[error("out-of-order fill: event {event} after event {last}")]
    OutOfOrderFill { event: u64, last: u64 },

    /// Cluster observed while no event is open.
    #[error("no event in progress")]
    NoActiveEvent,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
