//! Category interfaces for processors, clocks, timers and interrupt
//! controllers.
//!
//! A driver exposes one of these by overriding the matching `as_*` accessor
//! on [`Driver`](crate::Driver). Consumers reach them through a
//! [`DriverClass`](crate::DriverClass) cast after looking the driver up.

/// A CPU driver.
///
/// Measurement queries default to "no sensors": zero counts and zero values.
pub trait ProcessorDriver: Send + Sync {
    /// Architecture name, e.g. `"aarch64"`.
    fn arch(&self) -> &'static str;

    /// Number of cores.
    fn cores(&self) -> u32 {
        1
    }

    /// Identifier of the core executing the call.
    fn active_core(&self) -> u32 {
        0
    }

    /// Number of temperature sensors.
    fn temperature_count(&self) -> u32 {
        0
    }

    /// Reading of sensor `index`, in kelvin.
    fn temperature(&self, index: u32) -> f32 {
        let _ = index;
        0.0
    }

    /// Number of clocks.
    fn clock_count(&self) -> u32 {
        0
    }

    /// Configured rate of clock `index`, in hertz.
    fn clock_hz(&self, index: u32) -> u32 {
        let _ = index;
        0
    }

    /// Rate clock `index` is actually running at, in hertz. 0 if unknown.
    fn clock_active_hz(&self, index: u32) -> u32 {
        let _ = index;
        0
    }

    /// Sets clock `index`. Returns `false` if unsupported.
    fn set_clock_hz(&self, index: u32, hz: u32) -> bool {
        let _ = (index, hz);
        false
    }
}

/// A calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    /// Full year, e.g. 2024.
    pub year: u16,
    /// Month, `0..=11`.
    pub month: u8,
    /// Day of month, `0..=30`.
    pub day: u8,
}

/// A time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    /// `0..=23`.
    pub hours: u8,
    /// `0..=59`.
    pub minutes: u8,
    /// `0..=59`.
    pub seconds: u8,
}

/// A real-time clock.
pub trait ClockDriver: Send + Sync {
    /// Current date.
    fn date(&self) -> Date;

    /// Current time of day.
    fn time(&self) -> Time;
}

/// A free-running monotonic microsecond timer.
pub trait TimerDriver: Send + Sync {
    /// Low 32 bits of the counter, in microseconds.
    fn now(&self) -> u32 {
        // Truncation is the point: the 32-bit counter wraps.
        #[allow(clippy::cast_possible_truncation)]
        let low = self.now64() as u32;
        low
    }

    /// Full counter, in microseconds.
    fn now64(&self) -> u64;

    /// Busy-waits for `micros` microseconds.
    fn wait(&self, micros: u32) {
        let until = self.now64() + u64::from(micros);
        while self.now64() < until {
            core::hint::spin_loop();
        }
    }
}

/// An interrupt controller.
pub trait InterruptDriver: Send + Sync {
    /// Lowest IRQ number handled.
    fn min_irq(&self) -> u32 {
        0
    }

    /// Highest IRQ number handled.
    fn max_irq(&self) -> u32;

    /// Routes `irq` to `cpu` and unmasks it, replacing any previous routing.
    fn enable_irq(&self, cpu: u32, irq: u32);

    /// Masks `irq` for `cpu`.
    fn disable_irq(&self, cpu: u32, irq: u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};

    struct Counter(AtomicU64);

    impl TimerDriver for Counter {
        fn now64(&self) -> u64 {
            self.0.fetch_add(10, Ordering::Relaxed)
        }
    }

    #[test]
    fn now_truncates_counter() {
        let t = Counter(AtomicU64::new(0x1_0000_0005));
        assert_eq!(t.now(), 5);
    }

    #[test]
    fn default_wait_polls_until_deadline() {
        let t = Counter(AtomicU64::new(0));
        t.wait(100);
        assert!(t.0.load(Ordering::Relaxed) >= 100);
    }

    struct Cpu;

    impl ProcessorDriver for Cpu {
        fn arch(&self) -> &'static str {
            "x86_64"
        }
    }

    #[test]
    fn processor_defaults_report_no_sensors() {
        assert_eq!(Cpu.cores(), 1);
        assert_eq!(Cpu.temperature_count(), 0);
        assert!(!Cpu.set_clock_hz(0, 1_000_000));
    }
}
