//! Port registry backed by sysfs, procfs and `/dev/port`

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use uart_regs::{PortInfo, PortKind, PortRegistry, TriggerTuning, UartPort};

use crate::busy::{count_openers, PROC_ROOT};
use crate::error::DetectError;
use crate::portio::{PortIo, DEV_PORT};
use crate::sysfs::{attribute_path, parse_u32, TtyDescriptor, SYSFS_TTY};

/// Reported for ttys that exist but are not driven by serial_core
pub const NO_SERIAL_CORE: &str = "no serial_core descriptor";

/// A resolved tty: its descriptor and the register window for its base
pub struct SysfsPort {
    name: String,
    /// `None` for ttys without serial_core attributes (`tty1`, `ttyACM0`)
    descriptor: Option<TtyDescriptor>,
    device: PathBuf,
    proc_root: PathBuf,
    registers: Arc<Mutex<PortIo>>,
}

impl SysfsPort {
    pub fn descriptor(&self) -> Option<&TtyDescriptor> {
        self.descriptor.as_ref()
    }
}

impl UartPort for SysfsPort {
    type Registers = PortIo;

    fn info(&self) -> PortInfo {
        let users = count_openers(&self.proc_root, &self.device);
        let (kind, fifo_size) = match &self.descriptor {
            Some(descriptor) => (descriptor.kind(), descriptor.fifo_size),
            None => (PortKind::Other(NO_SERIAL_CORE.to_string()), 0),
        };
        PortInfo {
            name: self.name.clone(),
            kind,
            fifo_size,
            initialized: users > 0,
            users,
        }
    }

    fn registers(&self) -> &Mutex<PortIo> {
        &self.registers
    }
}

/// Registry of the host's serial ports
///
/// Descriptors are re-read on every lookup. Register windows are shared per
/// I/O base, so two names for the same hardware contend for one lock.
pub struct SysfsRegistry {
    sysfs_root: PathBuf,
    proc_root: PathBuf,
    dev_root: PathBuf,
    port_device: PathBuf,
    windows: Mutex<HashMap<u64, Arc<Mutex<PortIo>>>>,
}

impl SysfsRegistry {
    /// Registry over the live system
    pub fn new() -> Self {
        Self::with_roots(SYSFS_TTY, PROC_ROOT, "/dev", DEV_PORT)
    }

    /// Registry over alternative mount points
    pub fn with_roots(
        sysfs_root: impl Into<PathBuf>,
        proc_root: impl Into<PathBuf>,
        dev_root: impl Into<PathBuf>,
        port_device: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            proc_root: proc_root.into(),
            dev_root: dev_root.into(),
            port_device: port_device.into(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Read the descriptor of `name`
    pub fn describe(&self, name: &str) -> Result<TtyDescriptor, DetectError> {
        TtyDescriptor::read(&self.sysfs_root, name)
    }

    fn window(&self, descriptor: &TtyDescriptor) -> Option<Arc<Mutex<PortIo>>> {
        let mut windows = self.windows.lock().ok()?;
        let window = windows.entry(descriptor.base).or_insert_with(|| {
            debug!("New register window at 0x{:X}", descriptor.base);
            Arc::new(Mutex::new(PortIo::new(
                &self.port_device,
                descriptor.base,
                descriptor.fcr_seed(),
            )))
        });
        Some(Arc::clone(window))
    }

    /// Reseed the FCR shadow of `descriptor`'s window from the driver state
    ///
    /// Skipped while a probe holds the window; its restore owns FCR then.
    fn refresh_fcr_shadow(&self, descriptor: &TtyDescriptor, window: &Mutex<PortIo>) {
        if let Ok(mut io) = window.try_lock() {
            io.set_fcr_shadow(descriptor.fcr_seed());
        }
    }

    fn trigger_path(&self, name: &str) -> PathBuf {
        attribute_path(&self.sysfs_root, name, "rx_trig_bytes")
    }
}

impl Default for SysfsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PortRegistry for SysfsRegistry {
    type Port = SysfsPort;

    fn lookup(&self, name: &str) -> Option<Arc<SysfsPort>> {
        if !self.sysfs_root.join(name).is_dir() {
            debug!("No tty named {}", name);
            return None;
        }

        let (descriptor, registers) = match self.describe(name) {
            Ok(descriptor) => {
                let window = self.window(&descriptor)?;
                self.refresh_fcr_shadow(&descriptor, &window);
                (Some(descriptor), window)
            }
            Err(e) => {
                debug!("{} has no serial_core descriptor: {}", name, e);
                // Never shared or driven; resolution rejects the port first
                let window = Arc::new(Mutex::new(PortIo::new(&self.port_device, 0, 0)));
                (None, window)
            }
        };

        Some(Arc::new(SysfsPort {
            name: name.to_string(),
            device: self.dev_root.join(name),
            proc_root: self.proc_root.clone(),
            descriptor,
            registers,
        }))
    }
}

impl TriggerTuning for SysfsRegistry {
    type Error = DetectError;

    fn rx_trigger_bytes(&self, name: &str) -> Result<u32, DetectError> {
        let path = self.trigger_path(name);
        let text = fs::read_to_string(&path).map_err(|e| DetectError::attribute(&path, e))?;
        parse_u32(&text).map_err(|e| DetectError::attribute(&path, e))
    }

    fn set_rx_trigger_bytes(&self, name: &str, bytes: u32) -> Result<(), DetectError> {
        let path = self.trigger_path(name);
        fs::write(&path, format!("{}\n", bytes)).map_err(|e| DetectError::attribute(&path, e))?;
        info!("Set {} RX trigger to {} bytes", name, bytes);

        // The driver rewrote FCR behind our back
        if let Ok(descriptor) = self.describe(name) {
            if let Some(window) = self.window(&descriptor) {
                self.refresh_fcr_shadow(&descriptor, &window);
            }
        }
        Ok(())
    }
}
