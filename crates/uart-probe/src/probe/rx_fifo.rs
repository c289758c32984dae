//! RX FIFO size probe
//!
//! Loops back one byte at a time, slower than the receiver drains into the
//! FIFO, until LSR reports an overrun. The number of bytes sent before the
//! overrunning one is the FIFO depth.

use tracing::{debug, trace};
use uart_regs::{bits, Clock, Register, RegisterAccess, RegisterError};

use super::{configure_loopback, Detection, FIFO_CEILING, FILL_PATTERN, RX_FIFO_BYTE_WAIT};
use crate::snapshot::RegisterSnapshot;

pub(super) fn probe<R: RegisterAccess, C: Clock>(
    regs: &mut R,
    clock: &C,
    snapshot: &RegisterSnapshot,
) -> Result<Detection, RegisterError> {
    let fcr = bits::FCR_ENABLE_FIFO | bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT;
    configure_loopback(regs, snapshot, fcr)?;

    // LSR.OE is cleared on read; drop anything latched before the probe
    let stale = regs.read(Register::Lsr)?;
    debug!("RX FIFO probe configured (stale LSR 0x{:02X})", stale);

    let mut found = None;
    for count in 0..FIFO_CEILING {
        regs.write(Register::Tx, FILL_PATTERN)?;
        clock.delay(RX_FIFO_BYTE_WAIT);

        let lsr = regs.read(Register::Lsr)?;
        if lsr & bits::LSR_OE != 0 {
            trace!("RX FIFO probe: overrun after {} bytes", count);
            found = Some(count);
            break;
        }
    }

    // Overrun on the first byte is not a FIFO depth
    Ok(found.filter(|&count| count > 0))
}
