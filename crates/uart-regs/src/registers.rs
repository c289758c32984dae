//! 8250/16550 register map
//!
//! Register offsets are relative to the port base. Offsets 0 and 1 are
//! shared: with `LCR.DLAB` set they address the divisor latch, otherwise the
//! data and interrupt-enable registers. Offset 2 reads as IIR and writes as
//! FCR.

use std::fmt;

/// A named UART register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Register {
    /// Receiver buffer (read, DLAB clear)
    Rx,
    /// Transmitter holding register (write, DLAB clear)
    Tx,
    /// Interrupt enable (DLAB clear)
    Ier,
    /// Interrupt identification (read)
    Iir,
    /// FIFO control (write; reads return the platform's shadow copy)
    Fcr,
    /// Line control
    Lcr,
    /// Modem control
    Mcr,
    /// Line status (read)
    Lsr,
    /// Divisor latch, low byte (DLAB set)
    Dll,
    /// Divisor latch, high byte (DLAB set)
    Dlm,
}

impl Register {
    /// Bus offset of this register from the port base
    pub fn offset(&self) -> u8 {
        match self {
            Register::Rx | Register::Tx | Register::Dll => 0,
            Register::Ier | Register::Dlm => 1,
            Register::Iir | Register::Fcr => 2,
            Register::Lcr => 3,
            Register::Mcr => 4,
            Register::Lsr => 5,
        }
    }

    /// Whether the register is only reachable while `LCR.DLAB` is set
    pub fn needs_dlab(&self) -> bool {
        matches!(self, Register::Dll | Register::Dlm)
    }

    /// Short datasheet name
    pub fn name(&self) -> &'static str {
        match self {
            Register::Rx => "RX",
            Register::Tx => "TX",
            Register::Ier => "IER",
            Register::Iir => "IIR",
            Register::Fcr => "FCR",
            Register::Lcr => "LCR",
            Register::Mcr => "MCR",
            Register::Lsr => "LSR",
            Register::Dll => "DLL",
            Register::Dlm => "DLM",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register bit definitions
pub mod bits {
    // IER
    /// Enable received data available interrupt
    pub const IER_RDI: u8 = 0x01;
    /// Enable transmitter holding register empty interrupt
    pub const IER_THRI: u8 = 0x02;
    /// Enable receiver line status interrupt
    pub const IER_RLSI: u8 = 0x04;
    /// Enable modem status interrupt
    pub const IER_MSI: u8 = 0x08;

    // IIR
    /// No interrupt pending
    pub const IIR_NO_INT: u8 = 0x01;
    /// Interrupt ID mask
    pub const IIR_ID: u8 = 0x0E;
    pub const IIR_MSI: u8 = 0x00;
    pub const IIR_THRI: u8 = 0x02;
    pub const IIR_RDI: u8 = 0x04;
    pub const IIR_RLSI: u8 = 0x06;
    /// Character timeout
    pub const IIR_CTI: u8 = 0x0C;
    /// FIFO enabled indicator bits
    pub const IIR_FIFO_ENABLED: u8 = 0xC0;

    // FCR
    pub const FCR_ENABLE_FIFO: u8 = 0x01;
    pub const FCR_CLEAR_RCVR: u8 = 0x02;
    pub const FCR_CLEAR_XMIT: u8 = 0x04;
    pub const FCR_DMA_SELECT: u8 = 0x08;
    pub const FCR_TRIGGER_MASK: u8 = 0xC0;
    pub const FCR_TRIGGER_1: u8 = 0x00;
    pub const FCR_TRIGGER_4: u8 = 0x40;
    pub const FCR_TRIGGER_8: u8 = 0x80;
    pub const FCR_TRIGGER_14: u8 = 0xC0;

    // LCR
    pub const LCR_WLEN5: u8 = 0x00;
    pub const LCR_WLEN8: u8 = 0x03;
    pub const LCR_STOP: u8 = 0x04;
    pub const LCR_PARITY: u8 = 0x08;
    pub const LCR_SBRK: u8 = 0x40;
    /// Divisor latch access bit
    pub const LCR_DLAB: u8 = 0x80;
    /// Divisor latch accessible, everything else cleared
    pub const LCR_CONF_MODE_A: u8 = LCR_DLAB;

    // MCR
    pub const MCR_DTR: u8 = 0x01;
    pub const MCR_RTS: u8 = 0x02;
    pub const MCR_OUT1: u8 = 0x04;
    pub const MCR_OUT2: u8 = 0x08;
    /// Internal loopback
    pub const MCR_LOOP: u8 = 0x10;

    // LSR
    /// Data ready
    pub const LSR_DR: u8 = 0x01;
    /// Overrun error
    pub const LSR_OE: u8 = 0x02;
    pub const LSR_PE: u8 = 0x04;
    pub const LSR_FE: u8 = 0x08;
    pub const LSR_BI: u8 = 0x10;
    /// Transmitter holding register empty
    pub const LSR_THRE: u8 = 0x20;
    /// Transmitter empty
    pub const LSR_TEMT: u8 = 0x40;
    pub const LSR_FIFOE: u8 = 0x80;
}

/// Pending interrupt cause reported by IIR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterruptCause {
    ModemStatus,
    TransmitEmpty,
    ReceivedData,
    LineStatus,
    CharacterTimeout,
    /// An ID value the 16550 does not define
    Other(u8),
}

/// Decode the pending interrupt cause from an IIR value
///
/// Returns `None` when the no-interrupt bit is set.
pub fn iir_cause(iir: u8) -> Option<InterruptCause> {
    if iir & bits::IIR_NO_INT != 0 {
        return None;
    }
    Some(match iir & bits::IIR_ID {
        bits::IIR_MSI => InterruptCause::ModemStatus,
        bits::IIR_THRI => InterruptCause::TransmitEmpty,
        bits::IIR_RDI => InterruptCause::ReceivedData,
        bits::IIR_RLSI => InterruptCause::LineStatus,
        bits::IIR_CTI => InterruptCause::CharacterTimeout,
        other => InterruptCause::Other(other),
    })
}

/// Number of bytes the standard 16550A RX trigger setting in FCR selects
pub fn fcr_rx_trigger_bytes(fcr: u8) -> u8 {
    match fcr & bits::FCR_TRIGGER_MASK {
        bits::FCR_TRIGGER_1 => 1,
        bits::FCR_TRIGGER_4 => 4,
        bits::FCR_TRIGGER_8 => 8,
        _ => 14,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shared_offsets() {
        assert_eq!(Register::Rx.offset(), Register::Dll.offset());
        assert_eq!(Register::Ier.offset(), Register::Dlm.offset());
        assert_eq!(Register::Iir.offset(), Register::Fcr.offset());
        assert!(Register::Dlm.needs_dlab());
        assert!(!Register::Ier.needs_dlab());
    }

    #[test]
    fn test_iir_cause_decoding() {
        assert_eq!(iir_cause(0x01), None);
        assert_eq!(iir_cause(0xC1), None);
        assert_eq!(iir_cause(0x02), Some(InterruptCause::TransmitEmpty));
        assert_eq!(iir_cause(0xC4), Some(InterruptCause::ReceivedData));
        assert_eq!(iir_cause(0xCC), Some(InterruptCause::CharacterTimeout));
        assert_eq!(iir_cause(0x06), Some(InterruptCause::LineStatus));
    }

    #[test]
    fn test_fcr_trigger_bytes() {
        assert_eq!(fcr_rx_trigger_bytes(0x01), 1);
        assert_eq!(fcr_rx_trigger_bytes(0x41), 4);
        assert_eq!(fcr_rx_trigger_bytes(0x81), 8);
        assert_eq!(fcr_rx_trigger_bytes(0xC1), 14);
    }

    #[test]
    fn test_register_display() {
        assert_eq!(Register::Dlm.to_string(), "DLM");
    }

    proptest! {
        #[test]
        fn fifo_bits_never_change_cause(id in 0u8..16) {
            prop_assert_eq!(iir_cause(id), iir_cause(id | bits::IIR_FIFO_ENABLED));
        }
    }
}
