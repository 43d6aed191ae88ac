//! Blocking delays.
//!
//! Device drivers take a [Delay] instead of calling [std::thread::sleep] directly, so the same
//! protocol code can run on real time or on a virtual clock (see
//! [crate::lcd::hd44780::sim::SimDelay]).
use std::fmt::Debug;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::{Duration, Instant};

pub trait Delay: Debug {
    /// Blocks for at least `duration`.
    fn delay(&mut self, duration: Duration);

    fn delay_us(&mut self, us: u64) {
        self.delay(Duration::from_micros(us));
    }

    fn delay_ms(&mut self, ms: u64) {
        self.delay(Duration::from_millis(ms));
    }
}

/// Busy-waits on the monotonic clock.
///
/// Precise down to a few microseconds, at the cost of keeping the core busy. Suited for the short
/// enable pulses of parallel buses, where the scheduler granularity of [SleepDelay] would stretch
/// every write by tens of microseconds.
#[derive(Debug, Default, Copy, Clone)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay(&mut self, duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            spin_loop();
        }
    }
}

/// Yields the thread to the OS scheduler. Never returns early, but may oversleep.
#[derive(Debug, Default, Copy, Clone)]
pub struct SleepDelay;

impl Delay for SleepDelay {
    fn delay(&mut self, duration: Duration) {
        sleep(duration);
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }
}
