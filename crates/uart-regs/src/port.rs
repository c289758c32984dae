//! Platform seam: register access, port descriptors and port lookup

use std::sync::{Arc, Mutex};

use crate::error::RegisterError;
use crate::registers::Register;

/// Read/write access to the registers of one UART
///
/// Implementations address registers by bus offset; they do not track
/// `LCR.DLAB` on the caller's behalf. Reading [`Register::Fcr`] returns the
/// platform's shadow of the last FCR value written.
pub trait RegisterAccess {
    /// Read one register
    fn read(&mut self, register: Register) -> Result<u8, RegisterError>;

    /// Write one register
    fn write(&mut self, register: Register, value: u8) -> Result<(), RegisterError>;
}

impl<R: RegisterAccess + ?Sized> RegisterAccess for &mut R {
    fn read(&mut self, register: Register) -> Result<u8, RegisterError> {
        (**self).read(register)
    }

    fn write(&mut self, register: Register, value: u8) -> Result<(), RegisterError> {
        (**self).write(register, value)
    }
}

/// Which register interface a port exposes
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortKind {
    /// 8250/16450/16550-compatible register file
    Uart8250,
    /// Anything else, with a short description
    Other(String),
}

impl PortKind {
    pub fn is_8250(&self) -> bool {
        matches!(self, PortKind::Uart8250)
    }
}

/// Descriptor of a hardware port, read at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortInfo {
    /// Device name (e.g., ttyS1)
    pub name: String,
    /// Register interface
    pub kind: PortKind,
    /// Transmit FIFO depth reported by the driver (0 if unknown)
    pub fifo_size: u32,
    /// Whether the port has been initialized by an opener
    pub initialized: bool,
    /// Number of current openers
    pub users: u32,
}

impl PortInfo {
    /// A port is busy while it is initialized and held open by someone
    pub fn is_busy(&self) -> bool {
        self.initialized && self.users > 0
    }
}

/// A hardware serial port that can be probed
pub trait UartPort {
    type Registers: RegisterAccess;

    /// Current descriptor of the port
    fn info(&self) -> PortInfo;

    /// The port's registers behind its exclusive lock
    ///
    /// Every consumer that reconfigures the port takes this lock first.
    fn registers(&self) -> &Mutex<Self::Registers>;
}

/// Lookup of ports by device name
pub trait PortRegistry {
    type Port: UartPort;

    /// Resolve a device name to a port, or `None` if no such port exists
    fn lookup(&self, name: &str) -> Option<Arc<Self::Port>>;
}

impl<R: PortRegistry + ?Sized> PortRegistry for &R {
    type Port = R::Port;

    fn lookup(&self, name: &str) -> Option<Arc<Self::Port>> {
        (**self).lookup(name)
    }
}

impl<R: PortRegistry + ?Sized> PortRegistry for Arc<R> {
    type Port = R::Port;

    fn lookup(&self, name: &str) -> Option<Arc<Self::Port>> {
        (**self).lookup(name)
    }
}

/// Driver-level receive trigger setting of a port
pub trait TriggerTuning {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current receive trigger level in bytes
    fn rx_trigger_bytes(&self, name: &str) -> Result<u32, Self::Error>;

    /// Ask the driver for a new receive trigger level
    fn set_rx_trigger_bytes(&self, name: &str, bytes: u32) -> Result<(), Self::Error>;
}

impl<R: TriggerTuning + ?Sized> TriggerTuning for &R {
    type Error = R::Error;

    fn rx_trigger_bytes(&self, name: &str) -> Result<u32, Self::Error> {
        (**self).rx_trigger_bytes(name)
    }

    fn set_rx_trigger_bytes(&self, name: &str, bytes: u32) -> Result<(), Self::Error> {
        (**self).set_rx_trigger_bytes(name, bytes)
    }
}

impl<R: TriggerTuning + ?Sized> TriggerTuning for Arc<R> {
    type Error = R::Error;

    fn rx_trigger_bytes(&self, name: &str) -> Result<u32, Self::Error> {
        (**self).rx_trigger_bytes(name)
    }

    fn set_rx_trigger_bytes(&self, name: &str, bytes: u32) -> Result<(), Self::Error> {
        (**self).set_rx_trigger_bytes(name, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(initialized: bool, users: u32) -> PortInfo {
        PortInfo {
            name: "ttyS0".to_string(),
            kind: PortKind::Uart8250,
            fifo_size: 16,
            initialized,
            users,
        }
    }

    #[test]
    fn test_busy_requires_initialized_and_users() {
        assert!(info(true, 1).is_busy());
        assert!(!info(true, 0).is_busy());
        assert!(!info(false, 3).is_busy());
    }

    #[test]
    fn test_port_kind() {
        assert!(PortKind::Uart8250.is_8250());
        assert!(!PortKind::Other("mmio".into()).is_8250());
    }
}
