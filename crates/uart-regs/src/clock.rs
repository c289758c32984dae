//! Time source for probe delays and deadlines

use std::time::{Duration, Instant};

/// Time capability used by the probes
///
/// `now` is monotonic and measured from an arbitrary origin. Probes only ever
/// compare two readings of the same clock.
pub trait Clock {
    /// Current monotonic time
    fn now(&self) -> Duration;

    /// Block for at least `duration`
    fn delay(&self, duration: Duration);

    /// Hint issued once per idle polling iteration
    fn relax(&self) {}
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn delay(&self, duration: Duration) {
        (**self).delay(duration)
    }

    fn relax(&self) {
        (**self).relax()
    }
}

/// Delays at or below this are busy-waited rather than slept
const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

/// Wall clock backed by [`Instant`]
///
/// Short delays spin so that byte-time waits are not stretched by the
/// scheduler's sleep granularity.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn delay(&self, duration: Duration) {
        if duration <= SPIN_THRESHOLD {
            let start = Instant::now();
            while start.elapsed() < duration {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(duration);
        }
    }

    fn relax(&self) {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_delay_is_at_least_requested() {
        let clock = SystemClock::new();
        let start = clock.now();
        clock.delay(Duration::from_micros(100));
        assert!(clock.now() - start >= Duration::from_micros(100));
    }

    #[test]
    fn test_clock_by_reference() {
        fn elapsed<C: Clock>(clock: C) -> Duration {
            clock.now()
        }
        let clock = SystemClock::new();
        let _ = elapsed(&clock);
    }
}
