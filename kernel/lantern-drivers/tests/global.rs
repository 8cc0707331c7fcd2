//! The global registry and the consumers built on it.
//!
//! Runs as a single test: the global registry can only be initialized once
//! per process.

use lantern_driver_api::class::Timer;
use lantern_driver_api::identity::TIMER;
use lantern_driver_api::{Driver, DriverType, TimerDriver};
use lantern_drivers::{DriverReference, RegistryConfig, registry, time, try_registry};

struct Counter;

impl TimerDriver for Counter {
    fn now64(&self) -> u64 {
        0x1_0000_0040
    }

    fn wait(&self, _micros: u32) {}
}

impl Driver for Counter {
    fn driver_type(&self) -> &DriverType {
        &TIMER
    }

    fn name(&self) -> &str {
        "counter"
    }

    fn as_timer(&self) -> Option<&dyn TimerDriver> {
        Some(self)
    }
}

static COUNTER: Counter = Counter;
static SYSTEM_TIMER: DriverReference<Timer> = DriverReference::activating();

#[test]
fn global_registry_lifecycle() {
    // Before init: consumers degrade instead of failing.
    assert!(try_registry().is_none());
    assert!(SYSTEM_TIMER.get().is_none());
    assert_eq!(time::now64(), 0);

    lantern_drivers::init(RegistryConfig {
        autostart_builtin: false,
    });

    // No timer yet.
    assert!(SYSTEM_TIMER.get().is_none());
    assert_eq!(time::now(), 0);
    time::wait_micros(10);

    let handle = registry().install(&COUNTER, true).unwrap();
    assert!(!handle.is_running());

    // Resolving activates the timer.
    assert_eq!(SYSTEM_TIMER.get().map(|t| t.now64()), Some(0x1_0000_0040));
    assert!(handle.is_running());
    assert_eq!(time::now64(), 0x1_0000_0040);
    assert_eq!(time::now(), 0x40);
    assert!(time::date_time().is_none());

    registry().log_summary();

    // A second init is an invariant violation.
    let second = std::panic::catch_unwind(|| lantern_drivers::init(RegistryConfig::default()));
    assert!(second.is_err());
}
