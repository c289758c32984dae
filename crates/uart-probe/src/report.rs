//! Result formatting

use crate::error::ProbeError;
use crate::probe::ProbeKind;

/// Text reported when a probe ran out of attempts or time
pub fn sentinel(kind: ProbeKind) -> &'static str {
    match kind {
        ProbeKind::RxTrigger => "RX trigger test failed",
        ProbeKind::RxFifo => "RX FIFO: no overflow detected",
        ProbeKind::TxFifo | ProbeKind::TxTrigger => "TX loopback failed or no data received",
    }
}

/// Render a probe outcome as one line of endpoint text
///
/// Byte counts render in decimal and inconclusive runs render as the probe's
/// sentinel. Errors raised before probing are passed through untouched.
pub fn render(result: Result<u32, ProbeError>) -> Result<String, ProbeError> {
    match result {
        Ok(count) => Ok(format!("{}\n", count)),
        Err(ProbeError::Inconclusive(kind)) => Ok(format!("{}\n", sentinel(kind))),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_renders_decimal() {
        assert_eq!(render(Ok(16)).unwrap(), "16\n");
    }

    #[test]
    fn test_inconclusive_renders_sentinel() {
        let text = render(Err(ProbeError::Inconclusive(ProbeKind::RxFifo))).unwrap();
        assert!(text.contains("no overflow detected"));

        let text = render(Err(ProbeError::Inconclusive(ProbeKind::TxFifo))).unwrap();
        assert!(text.contains("loopback failed"));
        assert_ne!(text.trim(), "0");
    }

    #[test]
    fn test_rejections_pass_through() {
        assert!(matches!(
            render(Err(ProbeError::Busy("ttyS0".into()))),
            Err(ProbeError::Busy(_))
        ));
    }
}
