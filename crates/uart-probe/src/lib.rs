//! UART FIFO Probing Engine
//!
//! This crate measures the receive/transmit FIFO depths and interrupt trigger
//! levels of 8250/16550-family serial controllers. Each measurement puts the
//! controller into internal loopback, drives bytes through it under a bounded
//! timing loop, and restores every register it touched before returning.
//!
//! # Architecture
//!
//! - **Session**: the selected device, passed explicitly to every probe
//! - **Resolution**: device name to port, refusing busy or non-8250 ports
//! - **Snapshot**: capture and ordered restore of the touched registers
//! - **Probes**: RX trigger level, RX FIFO size, TX FIFO size, TX trigger level
//! - **Control interface**: the `select_dev` endpoint plus one read endpoint
//!   per measurement, rendering counts or sentinel text
//!
//! Registers, time and port lookup come from the [`uart_regs`] traits, so the
//! same probes run against hardware or a simulated controller.
//!
//! # Example
//!
//! ```rust,no_run
//! use uart_probe::{Endpoint, ProbeController};
//! use uart_regs::SystemClock;
//! # fn registry() -> uart_sim::SimRegistry { uart_sim::SimRegistry::new() }
//!
//! let mut controller = ProbeController::new(registry(), SystemClock::new());
//! controller.write(Endpoint::SelectDev, b"ttyS1\n").unwrap();
//!
//! for endpoint in Endpoint::MEASUREMENTS {
//!     match controller.read(endpoint) {
//!         Ok(text) => print!("{}: {}", endpoint, text),
//!         Err(e) => eprintln!("{}: {}", endpoint, e),
//!     }
//! }
//! ```

pub mod control;
pub mod error;
pub mod probe;
pub mod report;
pub mod resolve;
pub mod session;
pub mod snapshot;

pub use control::{Endpoint, ProbeController};
pub use error::ProbeError;
pub use probe::ProbeKind;
pub use report::{render, sentinel};
pub use session::{DeviceName, Session, DEFAULT_DEVICE, DEVICE_NAME_MAX};
pub use snapshot::RegisterSnapshot;
