//! sysfs descriptors of serial ttys
//!
//! The serial core exposes each port's geometry under
//! `/sys/class/tty/<name>/`. Values are read fresh on every resolution.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::trace;
use uart_regs::{bits, PortKind};

use crate::error::DetectError;

/// Default sysfs tty class directory
pub const SYSFS_TTY: &str = "/sys/class/tty";

/// Driver port type meaning "no UART detected"
pub const PORT_UNKNOWN: u32 = 0;

/// Register access method reported by the `io_type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IoType {
    Port,
    Hub6,
    Mem,
    Mem32,
    Au,
    Tsi,
    Mem32Be,
    Mem16,
    Unknown(u32),
}

impl IoType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => IoType::Port,
            1 => IoType::Hub6,
            2 => IoType::Mem,
            3 => IoType::Mem32,
            4 => IoType::Au,
            5 => IoType::Tsi,
            6 => IoType::Mem32Be,
            7 => IoType::Mem16,
            other => IoType::Unknown(other),
        }
    }
}

/// What the driver reports about one tty
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtyDescriptor {
    pub name: String,
    /// I/O port base address
    pub base: u64,
    pub io_type: IoType,
    /// Driver port type id (`PORT_UNKNOWN` when no UART was found)
    pub port_type: u32,
    /// Transmit FIFO size
    pub fifo_size: u32,
    /// Receive trigger bytes, for drivers that expose them
    pub rx_trig_bytes: Option<u32>,
}

impl TtyDescriptor {
    /// Read the descriptor of `name` below a sysfs tty class directory
    pub fn read(root: &Path, name: &str) -> Result<Self, DetectError> {
        let dir = root.join(name);
        let base = parse_port(&read_attr(&dir, "port")?)
            .map_err(|e| DetectError::attribute(&dir.join("port"), e))?;
        let io_type = IoType::from_raw(read_u32(&dir, "io_type")?);
        let port_type = read_u32(&dir, "type")?;
        let fifo_size = read_u32(&dir, "xmit_fifo_size")?;
        let rx_trig_bytes = read_u32(&dir, "rx_trig_bytes").ok();

        let descriptor = Self {
            name: name.to_string(),
            base,
            io_type,
            port_type,
            fifo_size,
            rx_trig_bytes,
        };
        trace!("sysfs descriptor: {:?}", descriptor);
        Ok(descriptor)
    }

    /// Register interface as seen by the probes
    pub fn kind(&self) -> PortKind {
        if self.port_type == PORT_UNKNOWN {
            return PortKind::Other("unknown UART type".to_string());
        }
        match self.io_type {
            IoType::Port if self.base != 0 => PortKind::Uart8250,
            IoType::Port => PortKind::Other("no I/O port base".to_string()),
            other => PortKind::Other(format!("{:?} register access", other).to_lowercase()),
        }
    }

    /// Best estimate of the driver's cached FCR
    ///
    /// FCR cannot be read back, so the FIFO enable bit follows the FIFO size
    /// and the trigger bits follow `rx_trig_bytes`.
    pub fn fcr_seed(&self) -> u8 {
        if self.fifo_size <= 1 {
            return 0;
        }
        let trigger = match self.rx_trig_bytes {
            Some(1) => bits::FCR_TRIGGER_1,
            Some(4) => bits::FCR_TRIGGER_4,
            Some(14) => bits::FCR_TRIGGER_14,
            _ => bits::FCR_TRIGGER_8,
        };
        bits::FCR_ENABLE_FIFO | trigger
    }
}

/// Path of one attribute of `name`
pub fn attribute_path(root: &Path, name: &str, attr: &str) -> PathBuf {
    root.join(name).join(attr)
}

fn read_attr(dir: &Path, attr: &str) -> Result<String, DetectError> {
    let path = dir.join(attr);
    fs::read_to_string(&path).map_err(|e| DetectError::attribute(&path, e))
}

fn read_u32(dir: &Path, attr: &str) -> Result<u32, DetectError> {
    let text = read_attr(dir, attr)?;
    parse_u32(&text).map_err(|e| DetectError::attribute(&dir.join(attr), e))
}

/// Parse a decimal attribute value
pub fn parse_u32(text: &str) -> Result<u32, String> {
    let text = text.trim();
    text.parse()
        .map_err(|e| format!("invalid number {:?}: {}", text, e))
}

/// Parse the `port` attribute (`0x3F8`)
pub fn parse_port(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid port {:?}: {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uart_regs::fcr_rx_trigger_bytes;

    fn descriptor() -> TtyDescriptor {
        TtyDescriptor {
            name: "ttyS0".into(),
            base: 0x3F8,
            io_type: IoType::Port,
            port_type: 4,
            fifo_size: 16,
            rx_trig_bytes: Some(8),
        }
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("0x3F8\n"), Ok(0x3F8));
        assert_eq!(parse_port("0x2f8"), Ok(0x2F8));
        assert_eq!(parse_port("0x0"), Ok(0));
        assert!(parse_port("ttyS0").is_err());
    }

    #[test]
    fn test_parse_u32() {
        assert_eq!(parse_u32("16\n"), Ok(16));
        assert!(parse_u32("").is_err());
        assert!(parse_u32("-1").is_err());
    }

    #[test]
    fn test_io_type() {
        assert_eq!(IoType::from_raw(0), IoType::Port);
        assert_eq!(IoType::from_raw(2), IoType::Mem);
        assert_eq!(IoType::from_raw(42), IoType::Unknown(42));
    }

    #[test]
    fn test_kind() {
        assert!(descriptor().kind().is_8250());

        let mmio = TtyDescriptor {
            io_type: IoType::Mem32,
            ..descriptor()
        };
        assert_eq!(mmio.kind(), PortKind::Other("mem32 register access".into()));

        let unknown = TtyDescriptor {
            port_type: PORT_UNKNOWN,
            ..descriptor()
        };
        assert!(!unknown.kind().is_8250());

        let no_base = TtyDescriptor {
            base: 0,
            ..descriptor()
        };
        assert!(!no_base.kind().is_8250());
    }

    #[test]
    fn test_fcr_seed() {
        assert_eq!(descriptor().fcr_seed(), 0x81);

        let fourteen = TtyDescriptor {
            rx_trig_bytes: Some(14),
            ..descriptor()
        };
        assert_eq!(fourteen.fcr_seed(), 0xC1);

        let no_fifo = TtyDescriptor {
            fifo_size: 1,
            ..descriptor()
        };
        assert_eq!(no_fifo.fcr_seed(), 0);
    }

    #[test]
    fn test_read_from_tree() {
        let root = std::env::temp_dir().join(format!("uart-detect-sysfs-{}", std::process::id()));
        let dir = root.join("ttyS1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("port"), "0x2F8\n").unwrap();
        fs::write(dir.join("io_type"), "0\n").unwrap();
        fs::write(dir.join("type"), "4\n").unwrap();
        fs::write(dir.join("xmit_fifo_size"), "16\n").unwrap();

        let desc = TtyDescriptor::read(&root, "ttyS1").unwrap();
        assert_eq!(desc.base, 0x2F8);
        assert_eq!(desc.rx_trig_bytes, None);
        assert!(desc.kind().is_8250());

        assert!(matches!(
            TtyDescriptor::read(&root, "ttyS9"),
            Err(DetectError::Attribute { .. })
        ));

        fs::remove_dir_all(&root).unwrap();
    }

    proptest! {
        #[test]
        fn port_attribute_parses_with_or_without_prefix(base in 0u64..0x1_0000) {
            prop_assert_eq!(parse_port(&format!("0x{:X}\n", base)), Ok(base));
            prop_assert_eq!(parse_port(&format!("{:x}", base)), Ok(base));
        }

        #[test]
        fn fcr_seed_matches_driver_trigger(bytes in prop::sample::select(vec![1u32, 4, 8, 14])) {
            let desc = TtyDescriptor {
                rx_trig_bytes: Some(bytes),
                ..descriptor()
            };
            prop_assert_eq!(fcr_rx_trigger_bytes(desc.fcr_seed()), bytes as u8);
        }
    }
}
