//! In-memory port registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uart_regs::{PortInfo, PortKind, PortRegistry, TriggerTuning, UartPort};

use crate::clock::VirtualClock;
use crate::error::SimError;
use crate::uart::{SimUart, SimUartConfig};

/// A simulated port: descriptor plus a locked [`SimUart`]
pub struct SimPort {
    name: Mutex<String>,
    kind: PortKind,
    fifo_size: u32,
    initialized: AtomicBool,
    users: AtomicU32,
    uart: Mutex<SimUart>,
}

impl SimPort {
    /// Create an idle 8250-family port whose descriptor reports the
    /// controller's transmit FIFO depth
    pub fn new(name: impl Into<String>, config: SimUartConfig, clock: VirtualClock) -> Self {
        let fifo_size = u32::try_from(config.tx_fifo_size).unwrap_or(u32::MAX);
        Self {
            name: Mutex::new(name.into()),
            kind: PortKind::Uart8250,
            fifo_size,
            initialized: AtomicBool::new(false),
            users: AtomicU32::new(0),
            uart: Mutex::new(SimUart::new(config, clock)),
        }
    }

    /// Override the register interface reported by the descriptor
    pub fn with_kind(mut self, kind: PortKind) -> Self {
        self.kind = kind;
        self
    }

    /// Override the FIFO size reported by the descriptor
    pub fn with_fifo_size(mut self, fifo_size: u32) -> Self {
        self.fifo_size = fifo_size;
        self
    }

    pub fn name(&self) -> String {
        self.name.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Simulate another user opening the port
    pub fn open(&self) {
        self.initialized.store(true, Ordering::SeqCst);
        self.users.fetch_add(1, Ordering::SeqCst);
    }

    /// Simulate that user closing the port again
    pub fn close(&self) {
        let previous = self
            .users
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |u| u.checked_sub(1))
            .unwrap_or(0);
        if previous <= 1 {
            self.initialized.store(false, Ordering::SeqCst);
        }
    }

    /// Run `f` against the controller while holding the port lock
    pub fn with_uart<T>(&self, f: impl FnOnce(&mut SimUart) -> T) -> T {
        let mut uart = self.uart.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut uart)
    }
}

impl UartPort for SimPort {
    type Registers = SimUart;

    fn info(&self) -> PortInfo {
        PortInfo {
            name: self.name(),
            kind: self.kind.clone(),
            fifo_size: self.fifo_size,
            initialized: self.initialized.load(Ordering::SeqCst),
            users: self.users.load(Ordering::SeqCst),
        }
    }

    fn registers(&self) -> &Mutex<SimUart> {
        &self.uart
    }
}

/// Registry of simulated ports, keyed by device name
#[derive(Default)]
pub struct SimRegistry {
    ports: Mutex<HashMap<String, Arc<SimPort>>>,
}

impl SimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port under its own name, replacing any previous one
    pub fn insert(&self, port: SimPort) -> Arc<SimPort> {
        let port = Arc::new(port);
        debug!("Adding simulated port {}", port.name());
        if let Ok(mut ports) = self.ports.lock() {
            ports.insert(port.name(), Arc::clone(&port));
        }
        port
    }

    /// Create and register a port
    pub fn add(&self, name: &str, config: SimUartConfig, clock: VirtualClock) -> Arc<SimPort> {
        self.insert(SimPort::new(name, config, clock))
    }

    /// Rename a port, as a driver re-registration would
    pub fn rename(&self, from: &str, to: &str) -> Result<(), SimError> {
        let mut ports = self
            .ports
            .lock()
            .map_err(|_| SimError::UnknownPort(from.to_string()))?;
        let port = ports
            .remove(from)
            .ok_or_else(|| SimError::UnknownPort(from.to_string()))?;
        if let Ok(mut name) = port.name.lock() {
            *name = to.to_string();
        }
        ports.insert(to.to_string(), port);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<SimPort>> {
        self.ports.lock().ok()?.remove(name)
    }

    /// Names of all registered ports, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .ports
            .lock()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl PortRegistry for SimRegistry {
    type Port = SimPort;

    fn lookup(&self, name: &str) -> Option<Arc<SimPort>> {
        self.ports.lock().ok()?.get(name).cloned()
    }
}

impl TriggerTuning for SimRegistry {
    type Error = SimError;

    fn rx_trigger_bytes(&self, name: &str) -> Result<u32, SimError> {
        let port = self
            .lookup(name)
            .ok_or_else(|| SimError::UnknownPort(name.to_string()))?;
        Ok(port.with_uart(|uart| uart.rx_trigger_bytes()))
    }

    fn set_rx_trigger_bytes(&self, name: &str, bytes: u32) -> Result<(), SimError> {
        let port = self
            .lookup(name)
            .ok_or_else(|| SimError::UnknownPort(name.to_string()))?;
        port.with_uart(|uart| uart.set_rx_trigger_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_rename() {
        let registry = SimRegistry::new();
        registry.add("ttyS0", SimUartConfig::default(), VirtualClock::new());

        assert!(registry.lookup("ttyS0").is_some());
        registry.rename("ttyS0", "ttyS4").unwrap();
        assert!(registry.lookup("ttyS0").is_none());
        assert_eq!(registry.lookup("ttyS4").unwrap().info().name, "ttyS4");
        assert_eq!(registry.names(), vec!["ttyS4".to_string()]);
    }

    #[test]
    fn test_open_close_tracks_busy() {
        let registry = SimRegistry::new();
        let port = registry.add("ttyS1", SimUartConfig::default(), VirtualClock::new());

        port.open();
        assert!(port.info().is_busy());
        port.close();
        assert!(!port.info().is_busy());
    }

    #[test]
    fn test_descriptor_overrides() {
        let port = SimPort::new("ttyS2", SimUartConfig::default(), VirtualClock::new())
            .with_kind(PortKind::Other("mmio".into()))
            .with_fifo_size(0);
        let info = port.info();
        assert!(!info.kind.is_8250());
        assert_eq!(info.fifo_size, 0);
    }

    #[test]
    fn test_trigger_tuning() {
        let registry = SimRegistry::new();
        registry.add("ttyS0", SimUartConfig::default(), VirtualClock::new());

        assert_eq!(registry.rx_trigger_bytes("ttyS0").unwrap(), 8);
        registry.set_rx_trigger_bytes("ttyS0", 1).unwrap();
        assert_eq!(registry.rx_trigger_bytes("ttyS0").unwrap(), 1);
        assert!(registry.set_rx_trigger_bytes("ttyS9", 1).is_err());
    }
}
