//! Linux Serial Port Platform Adapter
//!
//! This crate connects the probing engine to real 8250-family hardware on
//! Linux: serial port enumeration, the driver's sysfs descriptor of each tty,
//! detection of ports held open by other processes, and register access
//! through `/dev/port`. It also carries the round-trip latency tool, which
//! talks to a device through its normal tty interface.
//!
//! # Example
//!
//! ```rust,no_run
//! use uart_detect::{PortScanner, SysfsRegistry};
//! use uart_regs::{PortRegistry, UartPort};
//!
//! let scanner = PortScanner::new();
//! let registry = SysfsRegistry::new();
//!
//! for name in scanner.tty_names().unwrap() {
//!     if let Some(port) = registry.lookup(&name) {
//!         println!("{}: {:?}", name, port.info());
//!     }
//! }
//! ```

pub mod busy;
pub mod error;
pub mod portio;
pub mod registry;
pub mod rtt;
pub mod scanner;
pub mod sysfs;

pub use error::DetectError;
pub use portio::PortIo;
pub use registry::{SysfsPort, SysfsRegistry};
pub use rtt::{measure_round_trip, RoundTrip, RttConfig};
pub use scanner::{PortBus, PortScanner, ScannerConfig, SerialPortInfo};
pub use sysfs::{IoType, TtyDescriptor};
