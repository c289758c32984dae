//! Register snapshot and restore
//!
//! The divisor latch is only reachable with `LCR.DLAB` set, so both capture
//! and restore enter divisor-latch mode around the DLL/DLM accesses and write
//! the final line control value last.

use tracing::{debug, warn};
use uart_regs::{baud_for_divisor, bits, Register, RegisterAccess, RegisterError};

/// Upper bound on reads spent emptying the receive path
pub const DRAIN_LIMIT: usize = 1024;

/// Pre-probe values of the registers a probe mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub lcr: u8,
    pub fcr: u8,
    pub mcr: u8,
    /// Captured only by the trigger probes
    pub ier: Option<u8>,
    pub divisor: u16,
}

impl RegisterSnapshot {
    /// Capture the probe-scoped registers
    ///
    /// Leaves LCR at its captured value on return.
    pub fn capture<R: RegisterAccess>(
        regs: &mut R,
        with_ier: bool,
    ) -> Result<Self, RegisterError> {
        let lcr = regs.read(Register::Lcr)?;
        if lcr & bits::LCR_DLAB != 0 {
            regs.write(Register::Lcr, lcr & !bits::LCR_DLAB)?;
        }

        let fcr = regs.read(Register::Fcr)?;
        let mcr = regs.read(Register::Mcr)?;
        let ier = if with_ier {
            Some(regs.read(Register::Ier)?)
        } else {
            None
        };

        regs.write(Register::Lcr, bits::LCR_CONF_MODE_A)?;
        let dll = regs.read(Register::Dll)?;
        let dlm = regs.read(Register::Dlm)?;
        regs.write(Register::Lcr, lcr)?;

        let snapshot = Self {
            lcr,
            fcr,
            mcr,
            ier,
            divisor: u16::from_le_bytes([dll, dlm]),
        };
        debug!(
            "Captured {:?} ({} baud)",
            snapshot,
            baud_for_divisor(snapshot.divisor)
        );
        Ok(snapshot)
    }

    /// Write every captured register back
    ///
    /// Order: leave divisor latch mode, IER, drain the receiver, FCR, MCR,
    /// then divisor latch mode again for DLL and DLM, and finally LCR.
    pub fn restore<R: RegisterAccess>(&self, regs: &mut R) -> Result<(), RegisterError> {
        // A probe may have failed with the divisor latch still selected
        regs.write(Register::Lcr, self.lcr & !bits::LCR_DLAB)?;

        if let Some(ier) = self.ier {
            regs.write(Register::Ier, ier)?;
        }

        drain_rx(regs)?;

        let [dll, dlm] = self.divisor.to_le_bytes();
        regs.write(Register::Fcr, self.fcr)?;
        regs.write(Register::Mcr, self.mcr)?;
        regs.write(Register::Lcr, bits::LCR_CONF_MODE_A)?;
        regs.write(Register::Dll, dll)?;
        regs.write(Register::Dlm, dlm)?;
        regs.write(Register::Lcr, self.lcr)?;

        debug!("Restored {:?}", self);
        Ok(())
    }

    /// Captured registers with their values
    pub fn registers(&self) -> Vec<(Register, u8)> {
        let [dll, dlm] = self.divisor.to_le_bytes();
        let mut out = vec![
            (Register::Lcr, self.lcr),
            (Register::Fcr, self.fcr),
            (Register::Mcr, self.mcr),
            (Register::Dll, dll),
            (Register::Dlm, dlm),
        ];
        if let Some(ier) = self.ier {
            out.push((Register::Ier, ier));
        }
        out
    }
}

/// Program the divisor latch and leave the line at 8N1
pub fn set_divisor<R: RegisterAccess>(regs: &mut R, divisor: u16) -> Result<(), RegisterError> {
    let [dll, dlm] = divisor.to_le_bytes();
    regs.write(Register::Lcr, bits::LCR_CONF_MODE_A)?;
    regs.write(Register::Dll, dll)?;
    regs.write(Register::Dlm, dlm)?;
    regs.write(Register::Lcr, bits::LCR_WLEN8)
}

/// Read and discard received bytes until the data-ready bit clears
///
/// Returns how many bytes were discarded.
pub fn drain_rx<R: RegisterAccess>(regs: &mut R) -> Result<usize, RegisterError> {
    let mut drained = 0;
    while regs.read(Register::Lsr)? & bits::LSR_DR != 0 {
        regs.read(Register::Rx)?;
        drained += 1;
        if drained >= DRAIN_LIMIT {
            warn!("Receiver still reports data after {} reads", drained);
            break;
        }
    }
    Ok(drained)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Register file that honours DLAB and records writes
    #[derive(Default)]
    struct Regs {
        lcr: u8,
        fcr: u8,
        mcr: u8,
        ier: u8,
        dll: u8,
        dlm: u8,
        thr: Vec<u8>,
        rx: Vec<u8>,
        writes: Vec<(Register, u8)>,
    }

    impl Regs {
        fn dlab(&self) -> bool {
            self.lcr & bits::LCR_DLAB != 0
        }
    }

    impl RegisterAccess for Regs {
        fn read(&mut self, register: Register) -> Result<u8, RegisterError> {
            Ok(match (register.offset(), self.dlab()) {
                (0, true) => self.dll,
                (1, true) => self.dlm,
                (0, false) => self.rx.pop().unwrap_or(0),
                (1, false) => self.ier,
                (2, _) if register == Register::Fcr => self.fcr,
                (3, _) => self.lcr,
                (4, _) => self.mcr,
                (5, _) => u8::from(!self.rx.is_empty()),
                _ => 0,
            })
        }

        fn write(&mut self, register: Register, value: u8) -> Result<(), RegisterError> {
            self.writes.push((register, value));
            match (register.offset(), self.dlab()) {
                (0, true) => self.dll = value,
                (1, true) => self.dlm = value,
                (0, false) => self.thr.push(value),
                (1, false) => self.ier = value,
                (2, _) => self.fcr = value,
                (3, _) => self.lcr = value,
                (4, _) => self.mcr = value,
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn test_capture_reads_divisor_under_dlab() {
        let mut regs = Regs {
            lcr: 0x1B,
            fcr: 0xC1,
            mcr: 0x0B,
            ier: 0x05,
            dll: 0x0C,
            dlm: 0x00,
            ..Default::default()
        };

        let snap = RegisterSnapshot::capture(&mut regs, true).unwrap();
        assert_eq!(snap.divisor, 12);
        assert_eq!(snap.ier, Some(0x05));
        assert_eq!(regs.lcr, 0x1B);
        assert!(regs.thr.is_empty());
    }

    #[test]
    fn test_restore_writes_divisor_before_lcr() {
        let mut regs = Regs {
            lcr: 0x03,
            dll: 0x01,
            ..Default::default()
        };
        let snap = RegisterSnapshot {
            lcr: 0x1B,
            fcr: 0x81,
            mcr: 0x03,
            ier: None,
            divisor: 0x0180,
        };

        snap.restore(&mut regs).unwrap();

        let tail: Vec<_> = regs.writes.iter().rev().take(4).rev().cloned().collect();
        assert_eq!(
            tail,
            vec![
                (Register::Lcr, bits::LCR_CONF_MODE_A),
                (Register::Dll, 0x80),
                (Register::Dlm, 0x01),
                (Register::Lcr, 0x1B),
            ]
        );
        assert_eq!((regs.dll, regs.dlm, regs.lcr), (0x80, 0x01, 0x1B));
        assert!(regs.thr.is_empty());
    }

    #[test]
    fn test_restore_writes_ier_after_leaving_divisor_latch() {
        let mut regs = Regs::default();
        let snap = RegisterSnapshot {
            lcr: 0x83,
            fcr: 0x01,
            mcr: 0x00,
            ier: Some(0x0F),
            divisor: 1,
        };
        snap.restore(&mut regs).unwrap();
        assert_eq!(regs.writes[0], (Register::Lcr, 0x03));
        assert_eq!(regs.writes[1], (Register::Ier, 0x0F));
    }

    #[test]
    fn test_restore_from_divisor_latch_mode() {
        // Left behind by a probe that failed between DLL and DLM
        let mut regs = Regs {
            lcr: bits::LCR_CONF_MODE_A,
            dll: 0x01,
            dlm: 0x00,
            ier: 0x00,
            rx: vec![0x55],
            ..Default::default()
        };
        let snap = RegisterSnapshot {
            lcr: 0x03,
            fcr: 0xC1,
            mcr: 0x0B,
            ier: Some(0x05),
            divisor: 0x000C,
        };

        snap.restore(&mut regs).unwrap();

        assert_eq!(regs.ier, 0x05);
        assert_eq!((regs.dll, regs.dlm), (0x0C, 0x00));
        assert_eq!(regs.lcr, 0x03);
        assert!(regs.rx.is_empty());
    }

    #[test]
    fn test_drain_empties_receiver() {
        let mut regs = Regs {
            rx: vec![1, 2, 3],
            ..Default::default()
        };
        assert_eq!(drain_rx(&mut regs).unwrap(), 3);
        assert_eq!(drain_rx(&mut regs).unwrap(), 0);
    }

    #[test]
    fn test_registers_lists_ier_only_when_captured() {
        let snap = RegisterSnapshot {
            lcr: 0,
            fcr: 0,
            mcr: 0,
            ier: None,
            divisor: 0,
        };
        assert!(!snap.registers().iter().any(|(r, _)| *r == Register::Ier));
        let snap = RegisterSnapshot {
            ier: Some(1),
            ..snap
        };
        assert!(snap.registers().iter().any(|(r, _)| *r == Register::Ier));
    }
}
