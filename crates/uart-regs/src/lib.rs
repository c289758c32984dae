//! UART Register Library
//!
//! This crate describes the register interface of 8250/16550-family serial
//! controllers and the platform capabilities the probing engine is built on:
//!
//! - **Register map**: named registers, their bus offsets, and bit constants
//! - **RegisterAccess**: a narrow read/write capability over those registers
//! - **Clock**: an injectable source of time and delays
//! - **PortRegistry / UartPort**: lookup of a port by device name, its
//!   descriptor, and the port-scoped exclusive lock
//!
//! # Architecture
//!
//! Nothing in this crate touches hardware. Platform adapters (the Linux
//! `/dev/port` adapter, the simulated controller) implement the traits, and the
//! probe logic is written once against them.
//!
//! # Example
//!
//! ```rust
//! use uart_regs::{iir_cause, InterruptCause, Register};
//!
//! assert_eq!(Register::Lcr.offset(), 3);
//! assert_eq!(iir_cause(0xC4), Some(InterruptCause::ReceivedData));
//! assert_eq!(iir_cause(0xC1), None);
//! ```

pub mod clock;
pub mod error;
pub mod port;
pub mod registers;

pub use clock::{Clock, SystemClock};
pub use error::RegisterError;
pub use port::{PortInfo, PortKind, PortRegistry, RegisterAccess, TriggerTuning, UartPort};
pub use registers::{bits, fcr_rx_trigger_bytes, iir_cause, InterruptCause, Register};

/// Base clock of a standard PC UART, in Hz
pub const UART_CLOCK_HZ: u32 = 1_843_200;

/// Baud rate produced by a given divisor latch value on a standard PC UART
///
/// A divisor of zero behaves like 65536 on real parts.
pub fn baud_for_divisor(divisor: u16) -> u32 {
    let divisor = if divisor == 0 { 65_536 } else { u32::from(divisor) };
    UART_CLOCK_HZ / 16 / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_one_is_115200() {
        assert_eq!(baud_for_divisor(1), 115_200);
        assert_eq!(baud_for_divisor(12), 9_600);
    }

    #[test]
    fn test_divisor_zero_is_slowest() {
        assert_eq!(baud_for_divisor(0), 1);
    }
}
