//! Error types for the probing engine

use thiserror::Error;
use uart_regs::RegisterError;

use crate::probe::ProbeKind;

/// Errors that can occur while selecting a device or running a probe
///
/// `NotFound`, `Busy`, `NotSupported` and `InputInvalid` are raised before any
/// register is touched. `Inconclusive` and `PortAccess` are raised after the
/// port has been reconfigured, and only once it has been restored.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No port matches the selected device
    #[error("no serial port found for {0}")]
    NotFound(String),

    /// Port is open or initialized by another user
    #[error("serial port {0} is busy or opened by another user")]
    Busy(String),

    /// Port lacks the 8250-family register interface, or a descriptor the
    /// probe needs
    #[error("serial port {device} is not supported: {reason}")]
    NotSupported { device: String, reason: String },

    /// Malformed device name or endpoint request
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The probe ran to its cap or deadline without seeing the expected
    /// hardware condition
    #[error("{0} probe inconclusive")]
    Inconclusive(ProbeKind),

    /// Register access failed at the platform level
    #[error("port access failed: {0}")]
    PortAccess(#[from] RegisterError),

    /// The port lock was abandoned by a panicking holder
    #[error("lock on serial port {0} is poisoned")]
    LockPoisoned(String),
}

impl ProbeError {
    /// Whether the error was raised before any register was touched
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ProbeError::NotFound(_)
                | ProbeError::Busy(_)
                | ProbeError::NotSupported { .. }
                | ProbeError::InputInvalid(_)
        )
    }
}
