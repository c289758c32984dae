//! Register access through `/dev/port`
//!
//! Each register is one byte at `base + offset` in the I/O port space. The
//! device node is opened on first access so that resolving a port never
//! needs the privileges that driving it does.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use tracing::{debug, trace};
use uart_regs::{bits, Register, RegisterAccess, RegisterError};

/// Default I/O port device node
pub const DEV_PORT: &str = "/dev/port";

/// Register window of one port-mapped UART
pub struct PortIo {
    path: PathBuf,
    base: u64,
    file: Option<File>,
    /// Last FCR value written; FCR reads back as IIR on hardware
    fcr: u8,
}

impl PortIo {
    /// Window at `base` in the port space behind `path`, with `fcr` as the
    /// initial FCR shadow
    pub fn new(path: impl Into<PathBuf>, base: u64, fcr: u8) -> Self {
        Self {
            path: path.into(),
            base,
            file: None,
            fcr,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Replace the FCR shadow
    pub fn set_fcr_shadow(&mut self, fcr: u8) {
        self.fcr = fcr;
    }

    fn file(&mut self) -> Result<&File, RegisterError> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.path)
                .map_err(|e| {
                    RegisterError::Unavailable(format!("{}: {}", self.path.display(), e))
                })?;
            debug!("Opened {} for base 0x{:X}", self.path.display(), self.base);
            self.file = Some(file);
        }
        self.file
            .as_ref()
            .ok_or_else(|| RegisterError::Unavailable(self.path.display().to_string()))
    }

    fn address(&self, register: Register) -> u64 {
        self.base + u64::from(register.offset())
    }
}

fn short(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("short {}", op))
}

impl RegisterAccess for PortIo {
    fn read(&mut self, register: Register) -> Result<u8, RegisterError> {
        if register == Register::Fcr {
            return Ok(self.fcr);
        }
        let address = self.address(register);
        let mut buf = [0u8; 1];
        let n = self
            .file()?
            .read_at(&mut buf, address)
            .map_err(|e| RegisterError::read(register, &e))?;
        if n != 1 {
            return Err(RegisterError::read(register, &short("read")));
        }
        trace!("in  0x{:X} ({}) = 0x{:02X}", address, register, buf[0]);
        Ok(buf[0])
    }

    fn write(&mut self, register: Register, value: u8) -> Result<(), RegisterError> {
        let address = self.address(register);
        let n = self
            .file()?
            .write_at(&[value], address)
            .map_err(|e| RegisterError::write(register, &e))?;
        if n != 1 {
            return Err(RegisterError::write(register, &short("write")));
        }
        if register == Register::Fcr {
            self.fcr = value & !(bits::FCR_CLEAR_RCVR | bits::FCR_CLEAR_XMIT);
        }
        trace!("out 0x{:X} ({}) <- 0x{:02X}", address, register, value);
        Ok(())
    }
}
