//! UART Simulation Library
//!
//! This crate provides a simulation layer for exercising the FIFO probes
//! without physical serial hardware. It includes:
//!
//! - **SimUart**: a 16550-class register file with FIFOs, a transmit shift
//!   register, internal loopback, overrun and interrupt identification
//! - **VirtualClock**: shared virtual time that the simulated transmitter
//!   runs on, so probe delays cost nothing in real time
//! - **SimRegistry**: an in-memory port registry with busy/rename control
//!
//! # Example
//!
//! ```rust
//! use uart_regs::{bits, Clock, Register, RegisterAccess};
//! use uart_sim::{SimUart, SimUartConfig, VirtualClock};
//! use std::time::Duration;
//!
//! let clock = VirtualClock::new();
//! let mut uart = SimUart::new(SimUartConfig::default(), clock.clone());
//!
//! // Loop a byte back to ourselves
//! uart.write(Register::Mcr, bits::MCR_LOOP).unwrap();
//! uart.write(Register::Tx, 0xA5).unwrap();
//! clock.delay(Duration::from_millis(10));
//!
//! assert_ne!(uart.read(Register::Lsr).unwrap() & bits::LSR_DR, 0);
//! assert_eq!(uart.read(Register::Rx).unwrap(), 0xA5);
//! ```

pub mod clock;
pub mod error;
pub mod registry;
pub mod uart;

pub use clock::VirtualClock;
pub use error::SimError;
pub use registry::{SimPort, SimRegistry};
pub use uart::{SimRegisters, SimUart, SimUartConfig};
