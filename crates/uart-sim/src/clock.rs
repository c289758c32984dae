//! Virtual time

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uart_regs::Clock;

/// Virtual time consumed by one idle polling iteration
pub const RELAX_TICK: Duration = Duration::from_micros(5);

/// Shared virtual clock
///
/// Time only moves when someone delays or relaxes on it. Clones share the
/// same timeline, so a simulated controller holding a clone sees the delays a
/// probe performs.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    nanos: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without blocking
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Total virtual time elapsed
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.elapsed()
    }

    fn delay(&self, duration: Duration) {
        self.advance(duration);
    }

    fn relax(&self) {
        self.advance(RELAX_TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_time() {
        let clock = VirtualClock::new();
        let other = clock.clone();
        clock.delay(Duration::from_millis(3));
        other.relax();
        assert_eq!(clock.now(), Duration::from_millis(3) + RELAX_TICK);
    }
}
