//! Simulated 16550 UART
//!
//! Host -> loopback data path:
//! Bytes written to THR enter the transmit FIFO, move one at a time into the
//! transmit shift register, and leave it one byte-time later. In loopback the
//! byte lands in the receive FIFO, or sets `LSR.OE` if that FIFO is full.
//! Byte time follows the divisor latch on a 1.8432 MHz part with 10 bits per
//! character, measured on the shared [`VirtualClock`].

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;
use uart_regs::{bits, Register, RegisterAccess, RegisterError, UART_CLOCK_HZ};

use crate::clock::VirtualClock;
use crate::error::SimError;

/// Implemented IER bits
const IER_MASK: u8 = 0x0F;
/// Implemented MCR bits
const MCR_MASK: u8 = 0x1F;

/// Geometry and behaviour of a simulated controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimUartConfig {
    /// Receive FIFO depth
    pub rx_fifo_size: usize,
    /// Transmit FIFO depth (the shift register adds one more byte)
    pub tx_fifo_size: usize,
    /// RX trigger level selected by each value of FCR bits 6-7
    pub rx_trigger_levels: [u8; 4],
    /// THR empty interrupt fires once the transmit FIFO drains to this level
    pub tx_empty_threshold: usize,
    /// Whether loopback actually delivers bytes
    pub loopback_works: bool,
    /// Whether IIR ever reports a pending interrupt
    pub raises_interrupts: bool,
    /// Power-on register values
    pub initial_lcr: u8,
    pub initial_fcr: u8,
    pub initial_mcr: u8,
    pub initial_ier: u8,
    pub initial_divisor: u16,
}

impl Default for SimUartConfig {
    fn default() -> Self {
        Self {
            rx_fifo_size: 16,
            tx_fifo_size: 16,
            rx_trigger_levels: [1, 4, 8, 14],
            tx_empty_threshold: 0,
            loopback_works: true,
            raises_interrupts: true,
            initial_lcr: bits::LCR_WLEN8,
            initial_fcr: bits::FCR_ENABLE_FIFO | bits::FCR_TRIGGER_8,
            initial_mcr: bits::MCR_DTR | bits::MCR_RTS | bits::MCR_OUT2,
            initial_ier: 0x00,
            initial_divisor: 12,
        }
    }
}

/// Raw register file of a simulated controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimRegisters {
    pub lcr: u8,
    pub fcr: u8,
    pub mcr: u8,
    pub ier: u8,
    pub divisor: u16,
}

pub struct SimUart {
    config: SimUartConfig,
    clock: VirtualClock,

    reg_intr_enable: u8,
    reg_line_ctrl: u8,
    reg_modem_ctrl: u8,
    /// Last FCR value written, minus the self-clearing reset bits
    reg_fifo_ctrl: u8,
    reg_scratch: u8,
    reg_div_low: u8,
    reg_div_high: u8,

    overrun: bool,
    /// THR empty interrupt latch; cleared by a THR write or by reading IIR
    /// while it is the reported cause
    thre_intr: bool,

    rx_fifo: VecDeque<u8>,
    tx_fifo: VecDeque<u8>,
    shifter: Option<u8>,
    shift_done_at: Duration,

    writes: Vec<(Register, u8)>,
    tx_writes: usize,
    tx_dropped: usize,
}

impl SimUart {
    /// Create a controller in its power-on state
    pub fn new(config: SimUartConfig, clock: VirtualClock) -> Self {
        let [div_low, div_high] = config.initial_divisor.to_le_bytes();
        Self {
            reg_intr_enable: config.initial_ier & IER_MASK,
            reg_line_ctrl: config.initial_lcr,
            reg_modem_ctrl: config.initial_mcr & MCR_MASK,
            reg_fifo_ctrl: config.initial_fcr & !(bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT),
            reg_scratch: 0,
            reg_div_low: div_low,
            reg_div_high: div_high,
            overrun: false,
            thre_intr: false,
            rx_fifo: VecDeque::new(),
            tx_fifo: VecDeque::new(),
            shifter: None,
            shift_done_at: Duration::ZERO,
            writes: Vec::new(),
            tx_writes: 0,
            tx_dropped: 0,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SimUartConfig {
        &self.config
    }

    /// Current register file, read without side effects
    pub fn registers(&self) -> SimRegisters {
        SimRegisters {
            lcr: self.reg_line_ctrl,
            fcr: self.reg_fifo_ctrl,
            mcr: self.reg_modem_ctrl,
            ier: self.reg_intr_enable,
            divisor: self.divisor(),
        }
    }

    /// Every register write seen so far, in order
    pub fn writes(&self) -> &[(Register, u8)] {
        &self.writes
    }

    /// Number of bytes written to THR
    pub fn tx_writes(&self) -> usize {
        self.tx_writes
    }

    /// Number of THR writes dropped because the transmit path was full
    pub fn tx_dropped(&self) -> usize {
        self.tx_dropped
    }

    /// Bytes waiting in the receive FIFO
    pub fn rx_pending(&self) -> usize {
        self.rx_fifo.len()
    }

    /// Select the FCR trigger setting whose level is `bytes`
    pub fn set_rx_trigger_bytes(&mut self, bytes: u32) -> Result<(), SimError> {
        let index = self
            .config
            .rx_trigger_levels
            .iter()
            .position(|&level| u32::from(level) == bytes)
            .ok_or(SimError::UnsupportedTrigger(bytes))?;
        self.reg_fifo_ctrl = (self.reg_fifo_ctrl & !bits::FCR_TRIGGER_MASK) | ((index as u8) << 6);
        Ok(())
    }

    /// RX trigger level currently selected
    pub fn rx_trigger_bytes(&self) -> u32 {
        u32::from(self.rx_trigger())
    }

    fn divisor(&self) -> u16 {
        u16::from_le_bytes([self.reg_div_low, self.reg_div_high])
    }

    fn byte_time(&self) -> Duration {
        let divisor = match self.divisor() {
            0 => 65_536u64,
            d => u64::from(d),
        };
        Duration::from_nanos(divisor * 16 * 10 * 1_000_000_000 / u64::from(UART_CLOCK_HZ))
    }

    fn is_dlab(&self) -> bool {
        self.reg_line_ctrl & bits::LCR_DLAB != 0
    }

    fn is_loopback(&self) -> bool {
        self.reg_modem_ctrl & bits::MCR_LOOP != 0
    }

    fn fifo_enabled(&self) -> bool {
        self.reg_fifo_ctrl & bits::FCR_ENABLE_FIFO != 0
    }

    fn rx_capacity(&self) -> usize {
        if self.fifo_enabled() {
            self.config.rx_fifo_size
        } else {
            1
        }
    }

    fn tx_capacity(&self) -> usize {
        if self.fifo_enabled() {
            self.config.tx_fifo_size
        } else {
            1
        }
    }

    fn rx_trigger(&self) -> u8 {
        if self.fifo_enabled() {
            self.config.rx_trigger_levels[usize::from(self.reg_fifo_ctrl >> 6)]
        } else {
            1
        }
    }

    /// Run the transmitter up to the current virtual time
    fn sync(&mut self) {
        let now = self.clock.elapsed();
        while let Some(byte) = self.shifter {
            if now < self.shift_done_at {
                break;
            }
            let done = self.shift_done_at;
            self.shifter = None;
            self.deliver(byte);

            if let Some(next) = self.tx_fifo.pop_front() {
                self.shifter = Some(next);
                self.shift_done_at = done + self.byte_time();
                if self.tx_fifo.len() == self.config.tx_empty_threshold {
                    self.thre_intr = true;
                }
            }
        }
    }

    fn deliver(&mut self, byte: u8) {
        if !self.is_loopback() || !self.config.loopback_works {
            return;
        }
        if self.rx_fifo.len() < self.rx_capacity() {
            self.rx_fifo.push_back(byte);
        } else {
            trace!("Simulated overrun dropping 0x{:02X}", byte);
            self.overrun = true;
        }
    }

    fn transmit(&mut self, byte: u8) {
        self.tx_writes += 1;
        self.thre_intr = false;

        if self.shifter.is_none() {
            self.shifter = Some(byte);
            self.shift_done_at = self.clock.elapsed() + self.byte_time();
        } else if self.tx_fifo.len() < self.tx_capacity() {
            self.tx_fifo.push_back(byte);
        } else {
            self.tx_dropped += 1;
        }

        if self.tx_fifo.len() <= self.config.tx_empty_threshold {
            self.thre_intr = true;
        }
    }

    fn line_status(&self) -> u8 {
        let mut lsr = 0;
        if !self.rx_fifo.is_empty() {
            lsr |= bits::LSR_DR;
        }
        if self.overrun {
            lsr |= bits::LSR_OE;
        }
        if self.tx_fifo.is_empty() {
            lsr |= bits::LSR_THRE;
            if self.shifter.is_none() {
                lsr |= bits::LSR_TEMT;
            }
        }
        lsr
    }

    fn intr_ident(&self) -> u8 {
        let fifo_bits = if self.fifo_enabled() {
            bits::IIR_FIFO_ENABLED
        } else {
            0
        };
        if !self.config.raises_interrupts {
            return fifo_bits | bits::IIR_NO_INT;
        }

        let ier = self.reg_intr_enable;
        let id = if ier & bits::IER_RLSI != 0 && self.overrun {
            bits::IIR_RLSI
        } else if ier & bits::IER_RDI != 0
            && !self.rx_fifo.is_empty()
            && self.rx_fifo.len() >= usize::from(self.rx_trigger())
        {
            bits::IIR_RDI
        } else if ier & bits::IER_THRI != 0 && self.thre_intr {
            bits::IIR_THRI
        } else {
            bits::IIR_NO_INT
        };
        fifo_bits | id
    }

    fn write_fifo_ctrl(&mut self, data: u8) {
        let was_enabled = self.fifo_enabled();
        let enable = data & bits::FCR_ENABLE_FIFO != 0;
        if was_enabled != enable || data & bits::FCR_CLEAR_RCVR != 0 {
            self.rx_fifo.clear();
        }
        if was_enabled != enable || data & bits::FCR_CLEAR_XMIT != 0 {
            self.tx_fifo.clear();
        }
        self.reg_fifo_ctrl = data & !(bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT);
    }

    fn write_intr_enable(&mut self, data: u8) {
        let old = self.reg_intr_enable;
        self.reg_intr_enable = data & IER_MASK;
        // Enabling THRI with the transmitter already empty raises it at once
        if old & bits::IER_THRI == 0
            && data & bits::IER_THRI != 0
            && self.tx_fifo.len() <= self.config.tx_empty_threshold
        {
            self.thre_intr = true;
        }
    }

    /// Read a register by bus offset
    pub fn reg_read(&mut self, offset: u8) -> u8 {
        self.sync();
        match (offset, self.is_dlab()) {
            (0, true) => self.reg_div_low,
            (1, true) => self.reg_div_high,
            (0, false) => self.rx_fifo.pop_front().unwrap_or(0),
            (1, false) => self.reg_intr_enable,
            (2, _) => {
                let iir = self.intr_ident();
                if iir & bits::IIR_ID == bits::IIR_THRI && iir & bits::IIR_NO_INT == 0 {
                    self.thre_intr = false;
                }
                iir
            }
            (3, _) => self.reg_line_ctrl,
            (4, _) => self.reg_modem_ctrl,
            (5, _) => {
                let lsr = self.line_status();
                self.overrun = false;
                lsr
            }
            (7, _) => self.reg_scratch,
            _ => 0,
        }
    }

    /// Write a register by bus offset
    pub fn reg_write(&mut self, offset: u8, data: u8) {
        self.sync();
        match (offset, self.is_dlab()) {
            (0, true) => self.reg_div_low = data,
            (1, true) => self.reg_div_high = data,
            (0, false) => self.transmit(data),
            (1, false) => self.write_intr_enable(data),
            (2, _) => self.write_fifo_ctrl(data),
            (3, _) => self.reg_line_ctrl = data,
            (4, _) => self.reg_modem_ctrl = data & MCR_MASK,
            (7, _) => self.reg_scratch = data,
            _ => trace!("Ignoring write of 0x{:02X} to offset {}", data, offset),
        }
    }
}

impl RegisterAccess for SimUart {
    fn read(&mut self, register: Register) -> Result<u8, RegisterError> {
        if register == Register::Fcr {
            return Ok(self.reg_fifo_ctrl);
        }
        Ok(self.reg_read(register.offset()))
    }

    fn write(&mut self, register: Register, value: u8) -> Result<(), RegisterError> {
        self.writes.push((register, value));
        self.reg_write(register.offset(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uart_regs::{iir_cause, Clock, InterruptCause};

    fn uart(config: SimUartConfig) -> (SimUart, VirtualClock) {
        let clock = VirtualClock::new();
        (SimUart::new(config, clock.clone()), clock)
    }

    fn loopback_fast(uart: &mut SimUart) {
        uart.write(Register::Mcr, bits::MCR_LOOP).unwrap();
        uart.write(Register::Lcr, bits::LCR_CONF_MODE_A).unwrap();
        uart.write(Register::Dll, 1).unwrap();
        uart.write(Register::Dlm, 0).unwrap();
        uart.write(Register::Lcr, bits::LCR_WLEN8).unwrap();
    }

    #[test]
    fn test_byte_time_at_divisor_one() {
        let (mut uart, _) = uart(SimUartConfig::default());
        loopback_fast(&mut uart);
        assert_eq!(uart.byte_time(), Duration::from_nanos(86_805));
    }

    #[test]
    fn test_divisor_write_without_dlab_transmits() {
        let (mut uart, _) = uart(SimUartConfig::default());
        uart.write(Register::Dll, 0x01).unwrap();
        assert_eq!(uart.tx_writes(), 1);
        assert_eq!(uart.registers().divisor, 12);
    }

    #[test]
    fn test_loopback_delivers_after_byte_time() {
        let (mut uart, clock) = uart(SimUartConfig::default());
        loopback_fast(&mut uart);
        uart.write(Register::Tx, 0x42).unwrap();
        assert_eq!(uart.read(Register::Lsr).unwrap() & bits::LSR_DR, 0);

        clock.delay(Duration::from_micros(100));
        assert_ne!(uart.read(Register::Lsr).unwrap() & bits::LSR_DR, 0);
        assert_eq!(uart.read(Register::Rx).unwrap(), 0x42);
    }

    #[test]
    fn test_overrun_when_rx_full() {
        let config = SimUartConfig {
            rx_fifo_size: 4,
            ..Default::default()
        };
        let (mut uart, clock) = uart(config);
        loopback_fast(&mut uart);
        for _ in 0..5 {
            uart.write(Register::Tx, 0xFF).unwrap();
            clock.delay(Duration::from_millis(1));
        }
        let lsr = uart.read(Register::Lsr).unwrap();
        assert_ne!(lsr & bits::LSR_OE, 0);
        // OE clears on read
        assert_eq!(uart.read(Register::Lsr).unwrap() & bits::LSR_OE, 0);
        assert_eq!(uart.rx_pending(), 4);
    }

    #[test]
    fn test_rx_trigger_follows_fcr() {
        let (mut uart, clock) = uart(SimUartConfig::default());
        loopback_fast(&mut uart);
        uart.write(Register::Fcr, bits::FCR_ENABLE_FIFO | bits::FCR_TRIGGER_4)
            .unwrap();
        uart.write(Register::Ier, bits::IER_RDI).unwrap();

        for sent in 1..=4 {
            uart.write(Register::Tx, 0x55).unwrap();
            clock.delay(Duration::from_micros(100));
            let cause = iir_cause(uart.read(Register::Iir).unwrap());
            if sent < 4 {
                assert_eq!(cause, None);
            } else {
                assert_eq!(cause, Some(InterruptCause::ReceivedData));
            }
        }
    }

    #[test]
    fn test_thre_latch_cleared_by_iir_read() {
        let (mut uart, _) = uart(SimUartConfig::default());
        uart.write(Register::Ier, bits::IER_THRI).unwrap();
        let iir = uart.read(Register::Iir).unwrap();
        assert_eq!(iir_cause(iir), Some(InterruptCause::TransmitEmpty));
        assert_eq!(iir_cause(uart.read(Register::Iir).unwrap()), None);
    }

    #[test]
    fn test_tx_path_holds_fifo_plus_shifter() {
        let (mut uart, clock) = uart(SimUartConfig::default());
        loopback_fast(&mut uart);
        uart.write(Register::Fcr, 0x07).unwrap();
        for _ in 0..20 {
            uart.write(Register::Tx, 0xFF).unwrap();
        }
        assert_eq!(uart.tx_dropped(), 3);
        clock.delay(Duration::from_millis(50));
        uart.read(Register::Lsr).unwrap();
        // 17 bytes looped back into a 16 byte receiver
        assert_eq!(uart.rx_pending(), 16);
    }

    #[test]
    fn test_fcr_read_returns_shadow() {
        let (mut uart, _) = uart(SimUartConfig::default());
        uart.write(Register::Fcr, 0xC7).unwrap();
        assert_eq!(uart.read(Register::Fcr).unwrap(), 0xC1);
    }

    #[test]
    fn test_set_rx_trigger_bytes() {
        let (mut uart, _) = uart(SimUartConfig::default());
        uart.set_rx_trigger_bytes(14).unwrap();
        assert_eq!(uart.rx_trigger_bytes(), 14);
        assert_eq!(
            uart.set_rx_trigger_bytes(3),
            Err(SimError::UnsupportedTrigger(3))
        );
    }
}
