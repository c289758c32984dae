//! Error types for the Linux platform adapter

use thiserror::Error;

/// Errors that can occur while discovering or talking to serial ports
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Timeout waiting for response
    #[error("timeout waiting for echo on {port}")]
    Timeout { port: String },

    /// I/O error while talking to the port
    #[error("I/O error on {port}: {reason}")]
    IoError { port: String, reason: String },

    /// A byte came back, but not the one sent
    #[error("unexpected echo on {port}: sent 0x{sent:02X}, received 0x{received:02X}")]
    UnexpectedEcho { port: String, sent: u8, received: u8 },

    /// A sysfs attribute is missing or malformed
    #[error("bad sysfs attribute {path}: {reason}")]
    Attribute { path: String, reason: String },

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}

impl DetectError {
    pub(crate) fn attribute(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Attribute {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
