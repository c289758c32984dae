//! The four loopback measurement procedures
//!
//! Every probe runs the same sequence:
//!
//! ```text
//! Idle -> Locked -> Configured -> Probing -> Restoring -> Idle
//! ```
//!
//! `Probing` ends either on detection or when its iteration cap or deadline
//! runs out. `Restoring` runs on every path, including register failures
//! raised while configuring or probing.
//!
//! Timing constants assume the probe's own divisor of 1 (115200 baud on a
//! 1.8432 MHz part, ~87 us per byte). They are never derived from the
//! session's negotiated rate.

mod rx_fifo;
mod rx_trigger;
mod tx_fifo;
mod tx_trigger;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uart_regs::{bits, Clock, PortRegistry, Register, RegisterAccess, RegisterError, UartPort};

use crate::error::ProbeError;
use crate::resolve::resolve;
use crate::session::DeviceName;
use crate::snapshot::{set_divisor, RegisterSnapshot};

/// Highest RX trigger level the RX trigger probe tries
pub const RX_TRIGGER_CAP: u32 = 255;
/// Byte ceiling for the FIFO size probes and for the TX trigger fill
pub const FIFO_CEILING: u32 = 512;
/// Divisor forced during probing
pub const PROBE_DIVISOR: u16 = 1;

/// Wait after each RX trigger probe byte
pub const RX_TRIGGER_BYTE_WAIT: Duration = Duration::from_micros(100);
/// Wait after each RX FIFO probe byte
pub const RX_FIFO_BYTE_WAIT: Duration = Duration::from_millis(1);
/// Settle time after filling the transmitter
pub const TX_FIFO_SETTLE: Duration = Duration::from_millis(50);
/// Receive deadline for the TX FIFO probe
pub const TX_FIFO_DEADLINE: Duration = Duration::from_millis(500);
/// Deadline for the TX trigger probe
pub const TX_TRIGGER_DEADLINE: Duration = Duration::from_millis(1500);
/// Longest wait for the transmitter to go idle after the TX trigger probe
pub const TX_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Byte looped back by the RX trigger probe
pub const RX_TRIGGER_PATTERN: u8 = 0x55;
/// Byte used to fill FIFOs
pub const FILL_PATTERN: u8 = 0xFF;

/// One of the four measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    RxTrigger,
    RxFifo,
    TxFifo,
    TxTrigger,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 4] = [
        ProbeKind::RxTrigger,
        ProbeKind::RxFifo,
        ProbeKind::TxFifo,
        ProbeKind::TxTrigger,
    ];

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            ProbeKind::RxTrigger => "RX trigger",
            ProbeKind::RxFifo => "RX FIFO size",
            ProbeKind::TxFifo => "TX FIFO size",
            ProbeKind::TxTrigger => "TX trigger",
        }
    }

    /// Whether the probe changes IER and so snapshots it
    pub fn captures_ier(&self) -> bool {
        matches!(self, ProbeKind::RxTrigger | ProbeKind::TxTrigger)
    }

    /// Whether the probe needs the driver's FIFO size
    pub fn needs_fifo_size(&self) -> bool {
        matches!(self, ProbeKind::TxTrigger)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the `Probing` stage: a byte count, or `None` when the cap or
/// deadline ran out first
type Detection = Option<u32>;

/// Resolve, lock, snapshot, probe, restore and unlock
pub fn run<R, C>(
    registry: &R,
    clock: &C,
    device: &DeviceName,
    kind: ProbeKind,
) -> Result<u32, ProbeError>
where
    R: PortRegistry,
    C: Clock,
{
    info!("Starting {} probe on {}", kind, device);

    let resolved = resolve(registry, device, kind)?;
    let mut regs = resolved
        .port
        .registers()
        .lock()
        .map_err(|_| ProbeError::LockPoisoned(device.to_string()))?;

    let snapshot = RegisterSnapshot::capture(&mut *regs, kind.captures_ier())?;

    let detection = match kind {
        ProbeKind::RxTrigger => rx_trigger::probe(&mut *regs, clock, &snapshot),
        ProbeKind::RxFifo => rx_fifo::probe(&mut *regs, clock, &snapshot),
        ProbeKind::TxFifo => tx_fifo::probe(&mut *regs, clock, &snapshot),
        ProbeKind::TxTrigger => tx_trigger::probe(&mut *regs, clock, &snapshot, &resolved.info),
    };

    let restored = snapshot.restore(&mut *regs);
    drop(regs);

    let detection = match (detection, restored) {
        (Ok(detection), Ok(())) => detection,
        (Ok(_), Err(e)) => {
            error!("Failed to restore {} after {} probe: {}", device, kind, e);
            return Err(e.into());
        }
        (Err(e), Ok(())) => return Err(e.into()),
        (Err(e), Err(restore_err)) => {
            error!(
                "Failed to restore {} after {} probe error ({}): {}",
                device, kind, e, restore_err
            );
            return Err(e.into());
        }
    };

    match detection {
        Some(count) => {
            info!("{} probe on {}: {} bytes", kind, device, count);
            Ok(count)
        }
        None => {
            warn!("{} probe on {} was inconclusive", kind, device);
            Err(ProbeError::Inconclusive(kind))
        }
    }
}

/// Enter loopback at the probe rate with the given FIFO control value
fn configure_loopback<R: RegisterAccess>(
    regs: &mut R,
    snapshot: &RegisterSnapshot,
    fcr: u8,
) -> Result<(), RegisterError> {
    regs.write(Register::Fcr, fcr)?;
    regs.write(Register::Mcr, snapshot.mcr | bits::MCR_LOOP)?;
    set_divisor(regs, PROBE_DIVISOR)
}

/// Deadline helper over an injected clock
struct Deadline<'a, C: Clock> {
    clock: &'a C,
    at: Duration,
}

impl<'a, C: Clock> Deadline<'a, C> {
    fn after(clock: &'a C, timeout: Duration) -> Self {
        Self {
            clock,
            at: clock.now() + timeout,
        }
    }

    fn expired(&self) -> bool {
        self.clock.now() >= self.at
    }
}
