//! Serial port scanner
//!
//! Enumerates serial devices and reports them by bare tty name (`ttyS1`),
//! which is what the probe controller selects by.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;

/// Bus a serial device hangs off, as reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortBus {
    /// Motherboard or platform UART (`ttyS*`)
    Platform,
    Pci,
    Usb,
    Bluetooth,
}

/// A serial device found by enumeration
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Device node, `/dev/ttyS1`
    pub port: String,
    /// Bare tty name, `ttyS1`
    pub name: String,
    pub bus: PortBus,
}

impl SerialPortInfo {
    fn from_serialport(path: String, port_type: &SerialPortType) -> Self {
        let bus = match port_type {
            SerialPortType::PciPort => PortBus::Pci,
            SerialPortType::UsbPort(_) => PortBus::Usb,
            SerialPortType::BluetoothPort => PortBus::Bluetooth,
            SerialPortType::Unknown => PortBus::Platform,
        };
        Self {
            name: tty_name(&path).to_string(),
            port: path,
            bus,
        }
    }

    /// USB and Bluetooth ttys have no 8250 register file behind them
    pub fn may_be_8250(&self) -> bool {
        matches!(self.bus, PortBus::Platform | PortBus::Pci)
    }
}

/// Strip the directory from a device path
pub fn tty_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Scanner that skips USB adapter names
    pub fn new() -> Self {
        Self::with_config(ScannerConfig {
            skip_patterns: vec!["ttyUSB".to_string(), "ttyACM".to_string()],
        })
    }

    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Serial devices that could carry an 8250 and match no skip pattern
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let found = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;
        let total = found.len();

        let candidates: Vec<_> = found
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| p.may_be_8250() && !self.should_skip(&p.name))
            .collect();

        for port in &candidates {
            debug!("Candidate {} on {:?} bus", port.port, port.bus);
        }
        info!(
            "{} of {} serial device(s) are probe candidates",
            candidates.len(),
            total
        );
        Ok(candidates)
    }

    /// Bare names of all ports that survive the skip patterns
    pub fn tty_names(&self) -> Result<Vec<String>, DetectError> {
        let mut names: Vec<_> = self
            .enumerate_ports()?
            .into_iter()
            .map(|p| p.name)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// True when `name` contains a skip pattern
    pub fn should_skip(&self, name: &str) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_usb_adapter_is_not_a_candidate() {
        let usb = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x067B,
            pid: 0x2303,
            serial_number: None,
            manufacturer: None,
            product: None,
        });
        let info = SerialPortInfo::from_serialport("/dev/ttyUSB0".to_string(), &usb);
        assert_eq!(info.bus, PortBus::Usb);
        assert!(!info.may_be_8250());
    }

    #[test]
    fn test_platform_and_pci_ports_are_candidates() {
        let onboard =
            SerialPortInfo::from_serialport("/dev/ttyS1".to_string(), &SerialPortType::Unknown);
        assert_eq!(onboard.bus, PortBus::Platform);
        assert_eq!(onboard.name, "ttyS1");
        assert!(onboard.may_be_8250());

        let card = SerialPortInfo::from_serialport("/dev/ttyS4".to_string(), &SerialPortType::PciPort);
        assert!(card.may_be_8250());
    }

    #[test]
    fn test_tty_name() {
        assert_eq!(tty_name("/dev/ttyS0"), "ttyS0");
        assert_eq!(tty_name("ttyS3"), "ttyS3");
    }

    #[test]
    fn test_default_skips_usb_adapters() {
        let scanner = PortScanner::new();
        assert!(scanner.should_skip("ttyUSB0"));
        assert!(scanner.should_skip("ttyACM1"));
        assert!(!scanner.should_skip("ttyS0"));
    }

    #[test]
    fn test_custom_skip_patterns() {
        let scanner = PortScanner::with_config(ScannerConfig {
            skip_patterns: vec!["ttyS3".to_string()],
        });
        assert!(scanner.should_skip("ttyS3"));
        assert!(!scanner.should_skip("ttyUSB0"));
    }
}
