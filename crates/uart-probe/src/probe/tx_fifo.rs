//! TX FIFO size probe
//!
//! Writes the whole ceiling into THR without waiting for space, lets the
//! transmitter drain through loopback, and counts what comes back. Bytes the
//! transmit path dropped never arrive, so the count is the transmit depth.

use tracing::{debug, trace};
use uart_regs::{bits, Clock, Register, RegisterAccess, RegisterError};

use super::{
    configure_loopback, Deadline, Detection, FIFO_CEILING, FILL_PATTERN, TX_FIFO_DEADLINE,
    TX_FIFO_SETTLE,
};
use crate::snapshot::RegisterSnapshot;

pub(super) fn probe<R: RegisterAccess, C: Clock>(
    regs: &mut R,
    clock: &C,
    snapshot: &RegisterSnapshot,
) -> Result<Detection, RegisterError> {
    let fcr = bits::FCR_ENABLE_FIFO | bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT;
    configure_loopback(regs, snapshot, fcr)?;

    let mut tx_count = 0;
    for _ in 0..FIFO_CEILING {
        regs.write(Register::Tx, FILL_PATTERN)?;
        tx_count += 1;
    }
    debug!("TX FIFO probe queued {} bytes", tx_count);

    clock.delay(TX_FIFO_SETTLE);

    let deadline = Deadline::after(clock, TX_FIFO_DEADLINE);
    let mut rx_count = 0;
    while !deadline.expired() && rx_count < tx_count {
        if regs.read(Register::Lsr)? & bits::LSR_DR != 0 {
            let value = regs.read(Register::Rx)?;
            if value == FILL_PATTERN {
                rx_count += 1;
            } else {
                trace!("TX FIFO probe: unexpected byte 0x{:02X}", value);
            }
        }
        clock.relax();
    }
    debug!("TX FIFO probe received {} of {} bytes", rx_count, tx_count);

    // Nothing looped back means the path is broken, not a zero-depth FIFO
    Ok((rx_count > 0).then_some(rx_count))
}
