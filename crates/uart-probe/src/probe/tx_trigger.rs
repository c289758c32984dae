//! TX trigger level probe
//!
//! Queues one byte more than the driver's FIFO size with the THR empty
//! interrupt enabled, then counts bytes arriving through loopback until IIR
//! reports the transmitter empty.

use tracing::{debug, trace};
use uart_regs::{
    bits, iir_cause, Clock, InterruptCause, PortInfo, Register, RegisterAccess, RegisterError,
};

use super::{
    Deadline, Detection, FIFO_CEILING, FILL_PATTERN, PROBE_DIVISOR, TX_IDLE_WAIT,
    TX_TRIGGER_DEADLINE,
};
use crate::snapshot::{drain_rx, set_divisor, RegisterSnapshot};

/// Bytes queued for a port whose driver reports `fifo_size`
///
/// The transmit shift register holds one byte beyond the FIFO.
pub(super) fn fill_count(fifo_size: u32) -> u32 {
    fifo_size.min(FIFO_CEILING - 1) + 1
}

pub(super) fn probe<R: RegisterAccess, C: Clock>(
    regs: &mut R,
    clock: &C,
    snapshot: &RegisterSnapshot,
    info: &PortInfo,
) -> Result<Detection, RegisterError> {
    regs.write(
        Register::Fcr,
        bits::FCR_ENABLE_FIFO | bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT | bits::FCR_TRIGGER_1,
    )?;
    regs.write(Register::Mcr, snapshot.mcr | bits::MCR_LOOP)?;
    drain_rx(regs)?;
    set_divisor(regs, PROBE_DIVISOR)?;
    regs.write(Register::Ier, bits::IER_THRI)?;

    let fill = fill_count(info.fifo_size);
    for _ in 0..fill {
        regs.write(Register::Tx, FILL_PATTERN)?;
    }
    debug!("TX trigger probe queued {} bytes", fill);

    let deadline = Deadline::after(clock, TX_TRIGGER_DEADLINE);
    let mut rx_count = 0;
    let mut found = None;
    while !deadline.expired() {
        if regs.read(Register::Lsr)? & bits::LSR_DR != 0 {
            regs.read(Register::Rx)?;
            rx_count += 1;
        }

        let iir = regs.read(Register::Iir)?;
        if iir_cause(iir) == Some(InterruptCause::TransmitEmpty) {
            trace!("TX trigger probe: THR empty after {} bytes", rx_count);
            found = Some(rx_count);
            break;
        }

        clock.relax();
    }

    // Let the shift register empty while loopback is still on
    let idle = Deadline::after(clock, TX_IDLE_WAIT);
    while regs.read(Register::Lsr)? & bits::LSR_TEMT == 0 && !idle.expired() {
        clock.relax();
    }

    // An empty indication before anything looped back says nothing about the
    // trigger level
    Ok(found.filter(|&count| count > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_is_one_past_fifo() {
        assert_eq!(fill_count(16), 17);
        assert_eq!(fill_count(64), 65);
    }

    #[test]
    fn test_fill_capped_at_ceiling() {
        assert_eq!(fill_count(4096), FIFO_CEILING);
    }
}
