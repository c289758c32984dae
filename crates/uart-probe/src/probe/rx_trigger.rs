//! RX trigger level probe
//!
//! Loops back one byte at a time until IIR reports received data available.
//! The byte count at that point is the receive trigger level.

use tracing::{debug, trace};
use uart_regs::{bits, iir_cause, Clock, InterruptCause, Register, RegisterAccess, RegisterError};

use super::{
    configure_loopback, Detection, RX_TRIGGER_BYTE_WAIT, RX_TRIGGER_CAP, RX_TRIGGER_PATTERN,
};
use crate::snapshot::{drain_rx, RegisterSnapshot};

pub(super) fn probe<R: RegisterAccess, C: Clock>(
    regs: &mut R,
    clock: &C,
    snapshot: &RegisterSnapshot,
) -> Result<Detection, RegisterError> {
    // Keep the configured trigger bits, that is what is being measured
    let fcr = snapshot.fcr | bits::FCR_ENABLE_FIFO | bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT;
    configure_loopback(regs, snapshot, fcr)?;
    regs.write(Register::Ier, bits::IER_RDI)?;
    debug!("RX trigger probe configured (FCR 0x{:02X})", fcr);

    let mut found = None;
    for trig in 1..=RX_TRIGGER_CAP {
        regs.write(Register::Tx, RX_TRIGGER_PATTERN)?;
        clock.delay(RX_TRIGGER_BYTE_WAIT);

        let iir = regs.read(Register::Iir)?;
        trace!("RX trigger probe: {} sent, IIR 0x{:02X}", trig, iir);
        if iir_cause(iir) == Some(InterruptCause::ReceivedData) {
            found = Some(trig);
            break;
        }
    }

    regs.write(Register::Ier, 0x00)?;
    let drained = drain_rx(regs)?;
    debug!("RX trigger probe drained {} bytes", drained);

    Ok(found)
}
