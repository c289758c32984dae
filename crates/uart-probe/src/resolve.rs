//! Device resolution

use std::sync::Arc;

use tracing::{debug, error};
use uart_regs::{PortInfo, PortRegistry, UartPort};

use crate::error::ProbeError;
use crate::probe::ProbeKind;
use crate::session::DeviceName;

/// A port resolved for one probe invocation
pub struct ResolvedPort<P> {
    pub port: Arc<P>,
    pub info: PortInfo,
}

/// Resolve `device` to a port that `kind` may probe
///
/// Nothing is cached: a device renamed between probes is looked up afresh.
/// The checks run in order (existence, register interface, usage, descriptor)
/// and none of them touches a register.
pub fn resolve<R: PortRegistry>(
    registry: &R,
    device: &DeviceName,
    kind: ProbeKind,
) -> Result<ResolvedPort<R::Port>, ProbeError> {
    let port = registry.lookup(device.as_str()).ok_or_else(|| {
        error!("No serial port found for {}", device);
        ProbeError::NotFound(device.to_string())
    })?;

    let info = port.info();
    debug!(
        "Resolved {} (kind {:?}, fifo {}, users {})",
        device, info.kind, info.fifo_size, info.users
    );

    if !info.kind.is_8250() {
        error!("{} is not an 8250-based UART", device);
        return Err(ProbeError::NotSupported {
            device: device.to_string(),
            reason: "not an 8250-compatible UART".to_string(),
        });
    }

    if info.is_busy() {
        error!("TTY device {} is busy or opened by userspace", device);
        return Err(ProbeError::Busy(device.to_string()));
    }

    if kind.needs_fifo_size() && info.fifo_size == 0 {
        error!("{} reports no FIFO size, cannot size the {} fill", device, kind);
        return Err(ProbeError::NotSupported {
            device: device.to_string(),
            reason: "driver reports no FIFO size".to_string(),
        });
    }

    Ok(ResolvedPort { port, info })
}
