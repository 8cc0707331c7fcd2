//! Kernel time, backed by whichever timer and clock drivers are available.
//!
//! Every function degrades gracefully: before a timer is installed (or
//! while none can be started) [`now`] returns 0 and [`wait_micros`] returns
//! immediately, so early boot code can call them unconditionally.

use lantern_driver_api::class::{Clock, Timer};
use lantern_driver_api::{ClockDriver, Date, Time, TimerDriver};

use crate::reference::DriverReference;

static TIMER: DriverReference<Timer> = DriverReference::activating();
static CLOCK: DriverReference<Clock> = DriverReference::activating();

fn timer() -> Option<&'static dyn TimerDriver> {
    TIMER.get()
}

/// Microseconds on the active timer, truncated to 32 bits. 0 without a timer.
pub fn now() -> u32 {
    timer().map_or(0, |timer| timer.now())
}

/// Microseconds on the active timer. 0 without a timer.
pub fn now64() -> u64 {
    timer().map_or(0, |timer| timer.now64())
}

/// Busy-waits for `micros` microseconds, or not at all without a timer.
pub fn wait_micros(micros: u32) {
    if let Some(timer) = timer() {
        timer.wait(micros);
    }
}

/// Wall-clock date and time from the active clock.
pub fn date_time() -> Option<(Date, Time)> {
    let clock: &dyn ClockDriver = CLOCK.get()?;
    Some((clock.date(), clock.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global registry is never initialized in unit tests.
    #[test]
    fn degrades_without_registry() {
        assert_eq!(now(), 0);
        assert_eq!(now64(), 0);
        wait_micros(1_000_000);
        assert!(date_time().is_none());
    }
}
