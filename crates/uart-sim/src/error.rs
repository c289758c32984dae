//! Error types for the simulation layer

use thiserror::Error;

/// Errors raised by simulated ports
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// No simulated port with this name
    #[error("no simulated port named {0}")]
    UnknownPort(String),

    /// The simulated controller has no trigger setting with this byte count
    #[error("unsupported RX trigger level: {0} bytes")]
    UnsupportedTrigger(u32),
}
