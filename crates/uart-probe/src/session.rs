//! Selected-device state

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProbeError;

/// Longest accepted device name, in bytes
pub const DEVICE_NAME_MAX: usize = 15;

/// Device selected when nothing has been written yet
pub const DEFAULT_DEVICE: &str = "ttyS0";

/// A validated tty device name (e.g., ttyS1)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    /// Parse a device name the way it arrives on the `select_dev` endpoint
    ///
    /// Input may carry one trailing newline (as written by `echo`). The name
    /// ends at the first newline; it must be non-empty, at most
    /// [`DEVICE_NAME_MAX`] bytes of UTF-8, and free of path separators,
    /// whitespace and NUL.
    pub fn parse(input: &[u8]) -> Result<Self, ProbeError> {
        if input.is_empty() {
            return Err(ProbeError::InputInvalid("empty device name".to_string()));
        }
        if input.len() > DEVICE_NAME_MAX + 1 {
            return Err(ProbeError::InputInvalid(format!(
                "device name longer than {} bytes",
                DEVICE_NAME_MAX
            )));
        }

        let end = input
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(input.len());
        let name = std::str::from_utf8(&input[..end])
            .map_err(|_| ProbeError::InputInvalid("device name is not UTF-8".to_string()))?;

        if name.is_empty() {
            return Err(ProbeError::InputInvalid("empty device name".to_string()));
        }
        if name.len() > DEVICE_NAME_MAX {
            return Err(ProbeError::InputInvalid(format!(
                "device name longer than {} bytes",
                DEVICE_NAME_MAX
            )));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '\0' || c.is_whitespace())
        {
            return Err(ProbeError::InputInvalid(format!(
                "device name {:?} contains invalid characters",
                name
            )));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceName {
    fn default() -> Self {
        Self(DEFAULT_DEVICE.to_string())
    }
}

impl FromStr for DeviceName {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl TryFrom<String> for DeviceName {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_bytes())
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> Self {
        name.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probe session holding the currently selected device
///
/// Selection is last-write-wins. A failed write leaves the previous
/// selection in place.
#[derive(Debug, Clone, Default)]
pub struct Session {
    selected: DeviceName,
}

impl Session {
    /// Create a session selecting [`DEFAULT_DEVICE`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session selecting `device`
    pub fn with_device(device: DeviceName) -> Self {
        Self { selected: device }
    }

    /// Currently selected device
    pub fn selected(&self) -> &DeviceName {
        &self.selected
    }

    /// Replace the selection with raw endpoint input
    pub fn select(&mut self, input: &[u8]) -> Result<&DeviceName, ProbeError> {
        let device = DeviceName::parse(input)?;
        self.set(device);
        Ok(&self.selected)
    }

    /// Replace the selection with an already validated name
    pub fn set(&mut self, device: DeviceName) {
        info!("Selected TTY device is now: {}", device);
        self.selected = device;
    }
}
