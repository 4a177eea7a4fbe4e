//! Time sources for the decision engine, in microseconds.

use std::sync::atomic::{AtomicU64, Ordering};

use quanta::Instant;

pub trait Clock: Send + Sync {
    /// Current time in microseconds since an arbitrary origin.
    fn now_us(&self) -> u64;
}

/// Monotonic TSC-backed clock; time 0 is the moment of construction.
pub struct MonotonicClock {
    clock: quanta::Clock,
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        let clock = quanta::Clock::new();
        let origin = clock.now();
        MonotonicClock { clock, origin }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.clock.now().duration_since(self.origin).as_micros() as u64
    }
}

/// Externally driven clock for trace replay and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        ManualClock {
            now_us: AtomicU64::new(start_us),
        }
    }

    pub fn set(&self, now_us: u64) {
        self.now_us.store(now_us, Ordering::Release);
    }

    pub fn advance(&self, delta_us: u64) {
        self.now_us.fetch_add(delta_us, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_us(), 10);
        clock.advance(490);
        assert_eq!(clock.now_us(), 500);
        clock.set(42);
        assert_eq!(clock.now_us(), 42);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now_us();
        assert!(b >= a + 1_000, "expected at least 1ms to elapse: a={a}, b={b}");
    }
}
