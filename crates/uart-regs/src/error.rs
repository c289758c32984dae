//! Error types for register access

use thiserror::Error;

use crate::registers::Register;

/// Errors raised by a platform when a register cannot be accessed
///
/// Any of these during a probe means the port is no longer reachable; the
/// engine treats them as fatal.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Reading a register failed
    #[error("failed to read {register}: {reason}")]
    Read { register: Register, reason: String },

    /// Writing a register failed
    #[error("failed to write {register}: {reason}")]
    Write { register: Register, reason: String },

    /// The port's register window could not be opened
    #[error("register window unavailable: {0}")]
    Unavailable(String),
}

impl RegisterError {
    /// Build a read error from an I/O error
    pub fn read(register: Register, err: &std::io::Error) -> Self {
        Self::Read {
            register,
            reason: err.to_string(),
        }
    }

    /// Build a write error from an I/O error
    pub fn write(register: Register, err: &std::io::Error) -> Self {
        Self::Write {
            register,
            reason: err.to_string(),
        }
    }
}
