//! Round-trip latency measurement
//!
//! Sends a single byte through the tty layer and times how long the echo
//! takes to come back. Useful with a loopback plug, or with the far end
//! echoing, to see what the trigger level costs in latency.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::DetectError;

/// Configuration for a round-trip measurement
#[derive(Debug, Clone)]
pub struct RttConfig {
    pub baud_rate: u32,
    /// How long to wait for the echo
    pub timeout: Duration,
    pub test_byte: u8,
}

impl Default for RttConfig {
    fn default() -> Self {
        Self {
            baud_rate: 19_200,
            timeout: Duration::from_secs(1),
            test_byte: 0xA5,
        }
    }
}

/// A successful measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTrip {
    pub byte: u8,
    pub elapsed: Duration,
}

impl RoundTrip {
    pub fn micros(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1e6
    }
}

/// Device node for a bare tty name
pub fn device_path(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("/dev/{}", name)
    }
}

/// Open `port_name` at 8N1 without flow control and time one echo
pub async fn measure_round_trip(
    port_name: &str,
    config: &RttConfig,
) -> Result<RoundTrip, DetectError> {
    use tokio_serial::SerialPortBuilderExt;

    let path = device_path(port_name);
    debug!("Measuring round trip on {} at {} baud", path, config.baud_rate);

    let mut stream = tokio_serial::new(&path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| DetectError::OpenFailed {
            port: path.clone(),
            reason: e.to_string(),
        })?;

    // Drop anything left over from earlier traffic
    stream.clear(ClearBuffer::All)?;

    let result = round_trip(&mut stream, &path, config).await?;
    info!("RTT on {}: {:.2} us", path, result.micros());
    Ok(result)
}

/// Write the test byte to `stream` and wait for it to come back
pub async fn round_trip<S>(
    stream: &mut S,
    port: &str,
    config: &RttConfig,
) -> Result<RoundTrip, DetectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let io_error = |e: std::io::Error| DetectError::IoError {
        port: port.to_string(),
        reason: e.to_string(),
    };

    stream.write_all(&[config.test_byte]).await.map_err(io_error)?;
    stream.flush().await.map_err(io_error)?;
    let start = Instant::now();

    let mut buf = [0u8; 1];
    let n = match timeout(config.timeout, stream.read(&mut buf)).await {
        Ok(result) => result.map_err(io_error)?,
        Err(_) => {
            return Err(DetectError::Timeout {
                port: port.to_string(),
            })
        }
    };
    let elapsed = start.elapsed();

    if n == 0 {
        return Err(DetectError::IoError {
            port: port.to_string(),
            reason: "stream closed before echo".to_string(),
        });
    }
    if buf[0] != config.test_byte {
        return Err(DetectError::UnexpectedEcho {
            port: port.to_string(),
            sent: config.test_byte,
            received: buf[0],
        });
    }

    Ok(RoundTrip {
        byte: buf[0],
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_rtt_config_default() {
        let config = RttConfig::default();
        assert_eq!(config.baud_rate, 19_200);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.test_byte, 0xA5);
    }

    #[test]
    fn test_device_path() {
        assert_eq!(device_path("ttyS1"), "/dev/ttyS1");
        assert_eq!(device_path("/dev/ttyS1"), "/dev/ttyS1");
    }

    #[tokio::test]
    async fn test_echo_is_timed() {
        let (mut local, mut remote) = duplex(16);
        tokio::spawn(async move {
            let mut buf = [0u8; 1];
            remote.read_exact(&mut buf).await.unwrap();
            remote.write_all(&buf).await.unwrap();
        });

        let result = round_trip(&mut local, "loop", &RttConfig::default())
            .await
            .unwrap();
        assert_eq!(result.byte, 0xA5);
        assert!(result.elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wrong_echo() {
        let (mut local, mut remote) = duplex(16);
        tokio::spawn(async move {
            let mut buf = [0u8; 1];
            remote.read_exact(&mut buf).await.unwrap();
            remote.write_all(&[0x5A]).await.unwrap();
        });

        let err = round_trip(&mut local, "loop", &RttConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DetectError::UnexpectedEcho {
                sent: 0xA5,
                received: 0x5A,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let (mut local, _remote) = duplex(16);
        let config = RttConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let err = round_trip(&mut local, "loop", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Timeout { .. }));
    }
}
