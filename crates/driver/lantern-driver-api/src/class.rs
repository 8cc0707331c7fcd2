//! Typed downcasting.
//!
//! A [`DriverClass`] ties a type record to the interface a consumer wants
//! once a matching driver has been found. The registry matches on
//! [`is_a`](crate::is_a), then hands the instance to [`DriverClass::cast`],
//! which uses the explicit `as_*` accessors on [`Driver`]. No `Any`, no
//! `TypeId`.

use crate::driver::Driver;
use crate::hw::{ClockDriver, InterruptDriver, ProcessorDriver, TimerDriver};
use crate::identity::{self, DriverType};

/// A driver class usable as a typed lookup key.
pub trait DriverClass {
    /// The type every match must be (or refine).
    const TYPE: &'static DriverType;

    /// What a consumer receives for a match.
    type Interface: ?Sized + 'static;

    /// Converts a matching driver to its interface.
    ///
    /// Returns `None` if the driver claims the type but does not expose the
    /// interface, which is a driver bug the caller should treat as "not
    /// found".
    fn cast(driver: &'static dyn Driver) -> Option<&'static Self::Interface>;
}

macro_rules! generic_class {
    ($(#[$meta:meta])* $name:ident => $ty:path) => {
        $(#[$meta])*
        pub struct $name;

        impl DriverClass for $name {
            const TYPE: &'static DriverType = &$ty;
            type Interface = dyn Driver;

            fn cast(driver: &'static dyn Driver) -> Option<&'static dyn Driver> {
                Some(driver)
            }
        }
    };
}

macro_rules! interface_class {
    ($(#[$meta:meta])* $name:ident => $ty:path, $iface:ident, $accessor:ident) => {
        $(#[$meta])*
        pub struct $name;

        impl DriverClass for $name {
            const TYPE: &'static DriverType = &$ty;
            type Interface = dyn $iface;

            fn cast(driver: &'static dyn Driver) -> Option<&'static dyn $iface> {
                driver.$accessor()
            }
        }
    };
}

generic_class!(
    /// Any driver at all.
    AnyDriver => identity::DRIVER
);
generic_class!(
    /// Any hardware driver.
    Hardware => identity::HARDWARE
);
generic_class!(
    /// Any software service.
    Software => identity::SOFTWARE
);
generic_class!(
    /// Any resident service, whatever it wraps.
    Resident => identity::RESIDENT
);

interface_class!(
    /// CPU drivers.
    Processor => identity::PROCESSOR, ProcessorDriver, as_processor
);
interface_class!(
    /// Real-time clocks.
    Clock => identity::CLOCK, ClockDriver, as_clock
);
interface_class!(
    /// Monotonic timers.
    Timer => identity::TIMER, TimerDriver, as_timer
);
interface_class!(
    /// Interrupt controllers.
    Interrupt => identity::INTERRUPT, InterruptDriver, as_interrupt
);
