//! UART FIFO Probe Command Line
//!
//! Measures the FIFO depths and interrupt trigger levels of 8250/16550
//! serial ports through internal loopback, either on this machine's
//! hardware or against a simulated controller.

mod settings;
mod survey;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uart_detect::{measure_round_trip, PortScanner, ScannerConfig, SysfsRegistry};
use uart_probe::{Endpoint, ProbeController, Session};
use uart_regs::{PortRegistry, SystemClock, UartPort};
use uart_sim::{SimRegistry, SimUartConfig, VirtualClock};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "uart-probe", version, about)]
struct Cli {
    /// Settings file to use instead of the XDG location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List candidate serial devices and their driver descriptors
    List,
    /// Select a device and read control endpoints
    Probe {
        /// Device to select (defaults to the configured device)
        #[arg(long, short)]
        device: Option<String>,
        /// Endpoints to read (defaults to all four measurements)
        #[arg(value_parser = parse_endpoint)]
        endpoints: Vec<Endpoint>,
    },
    /// Measure every candidate device
    Survey {
        /// Also sweep the driver RX trigger setting
        #[arg(long)]
        sweep: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Survey a simulated controller
    Sim {
        #[arg(long)]
        rx_fifo: Option<usize>,
        #[arg(long)]
        tx_fifo: Option<usize>,
        /// Initial RX trigger level in bytes
        #[arg(long)]
        rx_trigger: Option<u8>,
        #[arg(long)]
        sweep: bool,
        #[arg(long)]
        json: bool,
    },
    /// Measure the round-trip time of one byte through a device
    Rtt {
        device: String,
        #[arg(long)]
        baud: Option<u32>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show the effective settings
    Config {
        /// Write the default settings to disk
        #[arg(long)]
        init: bool,
    },
}

fn parse_endpoint(s: &str) -> Result<Endpoint, String> {
    s.parse().map_err(|e: uart_probe::ProbeError| e.to_string())
}

fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "uart_probe=info,uart_detect=info,uart_sim=info,uart_regs=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref());

    match cli.command {
        Command::List => list(&settings),
        Command::Probe { device, endpoints } => probe(&settings, device, endpoints),
        Command::Survey { sweep, json } => {
            let devices = candidates(&settings)?;
            let mut controller = ProbeController::with_session(
                SysfsRegistry::new(),
                SystemClock::new(),
                Session::with_device(settings.default_device()?),
            );
            let sweep: &[u32] = if sweep {
                &settings.rx_trigger_sweep
            } else {
                &[]
            };
            let report = survey::run(&mut controller, &devices, sweep);
            print_report(&report, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sim {
            rx_fifo,
            tx_fifo,
            rx_trigger,
            sweep,
            json,
        } => {
            let config = sim_config(&settings, rx_fifo, tx_fifo, rx_trigger)?;
            let device = settings.default_device()?;
            let clock = VirtualClock::new();
            let registry = Arc::new(SimRegistry::new());
            registry.add(device.as_str(), config, clock.clone());

            let mut controller = ProbeController::new(registry, clock);
            let sweep: &[u32] = if sweep {
                &settings.rx_trigger_sweep
            } else {
                &[]
            };
            let report = survey::run(&mut controller, &[device.to_string()], sweep);
            print_report(&report, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Rtt {
            device,
            baud,
            timeout_ms,
        } => {
            let mut rtt = settings.rtt.clone();
            rtt.baud_rate = baud.unwrap_or(rtt.baud_rate);
            rtt.timeout_ms = timeout_ms.unwrap_or(rtt.timeout_ms);

            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let result = runtime.block_on(measure_round_trip(&device, &rtt.config()))?;
            println!("RTT: {:.2} microseconds", result.micros());
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { init } => {
            let path = match cli.config {
                Some(path) => path,
                None => Settings::default_path().context("could not determine settings path")?,
            };
            if init {
                Settings::default().save(&path)?;
                println!("Wrote default settings to {}", path.display());
            } else {
                println!("# {}", path.display());
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn scanner(settings: &Settings) -> PortScanner {
    PortScanner::with_config(ScannerConfig {
        skip_patterns: settings.skip_patterns.clone(),
    })
}

/// Devices from the settings file, or every enumerated tty
fn candidates(settings: &Settings) -> Result<Vec<String>> {
    if !settings.devices.is_empty() {
        return Ok(settings.devices.clone());
    }
    Ok(scanner(settings).tty_names()?)
}

fn list(settings: &Settings) -> Result<ExitCode> {
    let registry = SysfsRegistry::new();
    for name in scanner(settings).tty_names()? {
        match registry.lookup(&name) {
            Some(port) => {
                let info = port.info();
                let base = port.descriptor().map_or(0, |desc| desc.base);
                let kind = match &info.kind {
                    uart_regs::PortKind::Uart8250 => "8250".to_string(),
                    uart_regs::PortKind::Other(reason) => reason.clone(),
                };
                println!(
                    "{:<10} 0x{:04X}  fifo {:<4} {:<24} {}",
                    name,
                    base,
                    info.fifo_size,
                    kind,
                    if info.is_busy() { "busy" } else { "idle" }
                );
            }
            None => println!("{:<10} (not in sysfs)", name),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn probe(
    settings: &Settings,
    device: Option<String>,
    endpoints: Vec<Endpoint>,
) -> Result<ExitCode> {
    let mut controller = ProbeController::with_session(
        SysfsRegistry::new(),
        SystemClock::new(),
        Session::with_device(settings.default_device()?),
    );
    if let Some(device) = device {
        controller.write(Endpoint::SelectDev, device.as_bytes())?;
    }

    let endpoints = if endpoints.is_empty() {
        Endpoint::MEASUREMENTS.to_vec()
    } else {
        endpoints
    };

    let mut failed = false;
    for endpoint in endpoints {
        match controller.read(endpoint) {
            Ok(text) => print!("{}: {}", endpoint, text),
            Err(e) => {
                eprintln!("{}: {}", endpoint, e);
                failed = true;
            }
        }
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Simulated controller from settings plus command line overrides
fn sim_config(
    settings: &Settings,
    rx_fifo: Option<usize>,
    tx_fifo: Option<usize>,
    rx_trigger: Option<u8>,
) -> Result<SimUartConfig> {
    let mut config = settings.sim.clone();
    if let Some(size) = rx_fifo {
        config.rx_fifo_size = size;
    }
    if let Some(size) = tx_fifo {
        config.tx_fifo_size = size;
    }
    if let Some(level) = rx_trigger {
        let Some(index) = config.rx_trigger_levels.iter().position(|&l| l == level) else {
            bail!(
                "RX trigger {} not in {:?}",
                level,
                config.rx_trigger_levels
            );
        };
        config.initial_fcr = (config.initial_fcr & !uart_regs::bits::FCR_TRIGGER_MASK)
            | ((index as u8) << 6)
            | uart_regs::bits::FCR_ENABLE_FIFO;
    }
    Ok(config)
}

fn print_report(report: &survey::SurveyReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uart_probe::DeviceName;

    #[test]
    fn test_cli_parses_probe_endpoints() {
        let cli = Cli::try_parse_from([
            "uart-probe",
            "probe",
            "-d",
            "ttyS1",
            "rx-fifo-size",
            "tx_trig_level",
        ])
        .unwrap();
        match cli.command {
            Command::Probe { device, endpoints } => {
                assert_eq!(device.as_deref(), Some("ttyS1"));
                assert_eq!(endpoints, vec![Endpoint::RxFifoSize, Endpoint::TxTrigLevel]);
            }
            _ => panic!("expected probe command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_endpoint() {
        assert!(Cli::try_parse_from(["uart-probe", "probe", "fifo"]).is_err());
    }

    #[test]
    fn test_sim_config_overrides() {
        let settings = Settings::default();
        let config = sim_config(&settings, Some(64), None, Some(14)).unwrap();
        assert_eq!(config.rx_fifo_size, 64);
        assert_eq!(config.tx_fifo_size, 16);
        assert_eq!(config.initial_fcr & 0xC1, 0xC1);

        assert!(sim_config(&settings, None, None, Some(3)).is_err());
    }

    #[test]
    fn test_sim_survey_reports_trigger_override() {
        let settings = Settings::default();
        let config = sim_config(&settings, None, None, Some(4)).unwrap();
        let clock = VirtualClock::new();
        let registry = Arc::new(SimRegistry::new());
        registry.add("ttyS0", config, clock.clone());

        let mut controller = ProbeController::new(registry, clock);
        let report = survey::run(&mut controller, &["ttyS0".to_string()], &[]);
        assert_eq!(report.devices[0].readings[0].value, Some(4));
    }

    #[test]
    fn test_default_device_selection() {
        let device: DeviceName = Settings::default().default_device().unwrap();
        assert_eq!(device.as_str(), uart_probe::DEFAULT_DEVICE);
    }
}
