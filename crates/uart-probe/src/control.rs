//! Control interface: one writable and four readable endpoints

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uart_regs::{Clock, PortRegistry};

use crate::error::ProbeError;
use crate::probe::{self, ProbeKind};
use crate::report;
use crate::session::{DeviceName, Session};

/// Named endpoint of the control interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    SelectDev,
    RxTrigLevel,
    RxFifoSize,
    TxFifoSize,
    TxTrigLevel,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::SelectDev,
        Endpoint::RxTrigLevel,
        Endpoint::RxFifoSize,
        Endpoint::TxFifoSize,
        Endpoint::TxTrigLevel,
    ];

    /// The four measurement endpoints
    pub const MEASUREMENTS: [Endpoint; 4] = [
        Endpoint::RxTrigLevel,
        Endpoint::RxFifoSize,
        Endpoint::TxFifoSize,
        Endpoint::TxTrigLevel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::SelectDev => "select_dev",
            Endpoint::RxTrigLevel => "rx_trig_level",
            Endpoint::RxFifoSize => "rx_fifo_size",
            Endpoint::TxFifoSize => "tx_fifo_size",
            Endpoint::TxTrigLevel => "tx_trig_level",
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Endpoint::SelectDev)
    }

    /// Measurement behind a read endpoint
    pub fn probe(&self) -> Option<ProbeKind> {
        match self {
            Endpoint::SelectDev => None,
            Endpoint::RxTrigLevel => Some(ProbeKind::RxTrigger),
            Endpoint::RxFifoSize => Some(ProbeKind::RxFifo),
            Endpoint::TxFifoSize => Some(ProbeKind::TxFifo),
            Endpoint::TxTrigLevel => Some(ProbeKind::TxTrigger),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|e| e.name() == wanted)
            .ok_or_else(|| ProbeError::InputInvalid(format!("unknown endpoint: {}", s)))
    }
}

/// Probe controller bound to a port registry and a clock
///
/// Holds the session explicitly; every read re-resolves the selected device.
pub struct ProbeController<R, C> {
    registry: R,
    clock: C,
    session: Session,
}

impl<R: PortRegistry, C: Clock> ProbeController<R, C> {
    /// Create a controller selecting the default device
    pub fn new(registry: R, clock: C) -> Self {
        Self::with_session(registry, clock, Session::new())
    }

    /// Create a controller around an existing session
    pub fn with_session(registry: R, clock: C, session: Session) -> Self {
        Self {
            registry,
            clock,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Currently selected device
    pub fn selected(&self) -> &DeviceName {
        self.session.selected()
    }

    /// Select a device by validated name
    pub fn select(&mut self, device: DeviceName) {
        self.session.set(device);
    }

    /// Write raw bytes to an endpoint, returning the number accepted
    pub fn write(&mut self, endpoint: Endpoint, data: &[u8]) -> Result<usize, ProbeError> {
        if !endpoint.is_writable() {
            return Err(ProbeError::InputInvalid(format!(
                "endpoint {} is read-only",
                endpoint
            )));
        }
        self.session.select(data)?;
        Ok(data.len())
    }

    /// Read an endpoint's text
    pub fn read(&self, endpoint: Endpoint) -> Result<String, ProbeError> {
        match endpoint.probe() {
            None => Ok(format!("{}\n", self.session.selected())),
            Some(kind) => report::render(self.measure(kind)),
        }
    }

    /// Run one measurement against the selected device
    pub fn measure(&self, kind: ProbeKind) -> Result<u32, ProbeError> {
        probe::run(&self.registry, &self.clock, self.session.selected(), kind)
    }

    pub fn rx_trig_level(&self) -> Result<u32, ProbeError> {
        self.measure(ProbeKind::RxTrigger)
    }

    pub fn rx_fifo_size(&self) -> Result<u32, ProbeError> {
        self.measure(ProbeKind::RxFifo)
    }

    pub fn tx_fifo_size(&self) -> Result<u32, ProbeError> {
        self.measure(ProbeKind::TxFifo)
    }

    pub fn tx_trig_level(&self) -> Result<u32, ProbeError> {
        self.measure(ProbeKind::TxTrigger)
    }
}
