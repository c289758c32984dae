//! Survey of several devices through the control interface
//!
//! Each device is selected, all four measurements are read, and optionally
//! the driver's RX trigger setting is swept and re-measured. Devices that
//! are missing or busy are skipped rather than failing the survey.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};
use uart_probe::{Endpoint, ProbeController, ProbeError};
use uart_regs::{Clock, PortRegistry, TriggerTuning};

/// One endpoint read
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub endpoint: Endpoint,
    /// Measured byte count, if the read produced one
    pub value: Option<u32>,
    /// Endpoint text, or the error for failed reads
    pub text: String,
}

impl Reading {
    fn from_result(endpoint: Endpoint, result: Result<String, ProbeError>) -> Self {
        match result {
            Ok(text) => Self {
                endpoint,
                value: text.trim().parse().ok(),
                text: text.trim_end().to_string(),
            },
            Err(e) => Self {
                endpoint,
                value: None,
                text: format!("error: {}", e),
            },
        }
    }
}

/// RX trigger level measured at one driver setting
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub trigger_bytes: u32,
    pub reading: Reading,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub device: String,
    pub readings: Vec<Reading>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sweep: Vec<SweepPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedDevice {
    pub device: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SurveyReport {
    pub devices: Vec<DeviceReport>,
    pub skipped: Vec<SkippedDevice>,
}

/// Survey `devices`, sweeping the RX trigger over `sweep` when non-empty
///
/// The controller's selection is left on the last device surveyed.
pub fn run<R, C>(
    controller: &mut ProbeController<R, C>,
    devices: &[String],
    sweep: &[u32],
) -> SurveyReport
where
    R: PortRegistry + TriggerTuning,
    C: Clock,
{
    let mut report = SurveyReport::default();

    for device in devices {
        match survey_device(controller, device, sweep) {
            Ok(device_report) => report.devices.push(device_report),
            Err(reason) => {
                warn!("Skipping {}: {}", device, reason);
                report.skipped.push(SkippedDevice {
                    device: device.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        "Survey finished: {} measured, {} skipped",
        report.devices.len(),
        report.skipped.len()
    );
    report
}

fn survey_device<R, C>(
    controller: &mut ProbeController<R, C>,
    device: &str,
    sweep: &[u32],
) -> Result<DeviceReport, String>
where
    R: PortRegistry + TriggerTuning,
    C: Clock,
{
    controller
        .write(Endpoint::SelectDev, device.as_bytes())
        .map_err(|e| e.to_string())?;

    let mut readings = Vec::with_capacity(Endpoint::MEASUREMENTS.len());
    for endpoint in Endpoint::MEASUREMENTS {
        let result = controller.read(endpoint);
        if let Err(e @ (ProbeError::NotFound(_) | ProbeError::Busy(_))) = &result {
            return Err(e.to_string());
        }
        readings.push(Reading::from_result(endpoint, result));
    }

    let mut report = DeviceReport {
        device: device.to_string(),
        readings,
        sweep: Vec::new(),
        sweep_error: None,
    };
    if !sweep.is_empty() {
        sweep_rx_trigger(controller, &mut report, sweep);
    }
    Ok(report)
}

fn sweep_rx_trigger<R, C>(
    controller: &ProbeController<R, C>,
    report: &mut DeviceReport,
    sweep: &[u32],
) where
    R: PortRegistry + TriggerTuning,
    C: Clock,
{
    let device = report.device.clone();
    let original = match controller.registry().rx_trigger_bytes(&device) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Cannot sweep {}: {}", device, e);
            report.sweep_error = Some(e.to_string());
            return;
        }
    };

    for &bytes in sweep {
        let reading = match controller.registry().set_rx_trigger_bytes(&device, bytes) {
            Ok(()) => Reading::from_result(Endpoint::RxTrigLevel, controller.read(Endpoint::RxTrigLevel)),
            Err(e) => Reading {
                endpoint: Endpoint::RxTrigLevel,
                value: None,
                text: format!("error: {}", e),
            },
        };
        report.sweep.push(SweepPoint {
            trigger_bytes: bytes,
            reading,
        });
    }

    if let Err(e) = controller.registry().set_rx_trigger_bytes(&device, original) {
        warn!("Failed to restore {} RX trigger to {}: {}", device, original, e);
        report.sweep_error = Some(format!("restore failed: {}", e));
    }
}

impl fmt::Display for SurveyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for device in &self.devices {
            writeln!(f, "{}", device.device)?;
            for reading in &device.readings {
                writeln!(f, "  {:<14} {}", reading.endpoint.name(), reading.text)?;
            }
            for point in &device.sweep {
                writeln!(
                    f,
                    "  rx_trig_bytes={:<3} {}",
                    point.trigger_bytes, point.reading.text
                )?;
            }
            if let Some(e) = &device.sweep_error {
                writeln!(f, "  sweep: {}", e)?;
            }
        }
        for skipped in &self.skipped {
            writeln!(f, "{} skipped: {}", skipped.device, skipped.reason)?;
        }
        Ok(())
    }
}
