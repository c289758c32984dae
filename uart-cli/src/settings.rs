//! Application settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uart_detect::RttConfig;
use uart_probe::DeviceName;
use uart_sim::SimUartConfig;

/// Round-trip measurement defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RttSettings {
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub test_byte: u8,
}

impl Default for RttSettings {
    fn default() -> Self {
        let config = RttConfig::default();
        Self {
            baud_rate: config.baud_rate,
            timeout_ms: config.timeout.as_millis() as u64,
            test_byte: config.test_byte,
        }
    }
}

impl RttSettings {
    pub fn config(&self) -> RttConfig {
        RttConfig {
            baud_rate: self.baud_rate,
            timeout: Duration::from_millis(self.timeout_ms),
            test_byte: self.test_byte,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Device selected at startup
    pub default_device: String,
    /// Devices to survey; empty means enumerate
    pub devices: Vec<String>,
    /// Skip devices whose name contains any of these
    pub skip_patterns: Vec<String>,
    /// Driver RX trigger byte values to sweep
    pub rx_trigger_sweep: Vec<u32>,
    pub rtt: RttSettings,
    /// Simulated controller used by the `sim` command
    pub sim: SimUartConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_device: uart_probe::DEFAULT_DEVICE.to_string(),
            devices: Vec::new(),
            skip_patterns: vec!["ttyUSB".to_string(), "ttyACM".to_string()],
            rx_trigger_sweep: vec![1, 4, 8, 14],
            rtt: RttSettings::default(),
            sim: SimUartConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for uart-probe
    /// Uses $XDG_CONFIG_HOME/uart-probe, falls back to ~/.config/uart-probe
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("uart-probe"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("uart-probe"))
    }

    /// Get the settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings, using defaults when the file is missing or malformed
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Self::default(),
        };
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to `path`, creating its directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings {}", path.display()))?;

        Ok(())
    }

    /// The startup device as a validated name
    pub fn default_device(&self) -> Result<DeviceName> {
        self.default_device
            .parse()
            .with_context(|| format!("invalid default_device {:?}", self.default_device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("uart-cli-{}-{}", tag, std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_device().unwrap().as_str(), "ttyS0");
        assert_eq!(settings.rx_trigger_sweep, vec![1, 4, 8, 14]);
        assert_eq!(settings.rtt.config().timeout, Duration::from_secs(1));
        assert_eq!(settings.rtt.test_byte, 0xA5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"default_device": "ttyS2", "rtt": {"baud_rate": 9600}}"#)
                .unwrap();
        assert_eq!(settings.default_device, "ttyS2");
        assert_eq!(settings.rtt.baud_rate, 9600);
        assert_eq!(settings.rtt.timeout_ms, 1000);
        assert_eq!(settings.sim, SimUartConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let settings = Settings {
            devices: vec!["ttyS1".into(), "ttyS2".into()],
            ..Default::default()
        };
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(Some(&path)), settings);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let path = temp_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load(Some(&path)), Settings::default());
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_invalid_default_device() {
        let settings = Settings {
            default_device: "/dev/ttyS0".into(),
            ..Default::default()
        };
        assert!(settings.default_device().is_err());
    }
}
