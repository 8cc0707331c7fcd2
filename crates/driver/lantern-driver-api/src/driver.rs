//! The driver-author contract.

use crate::capability::Capabilities;
use crate::context::DriverContext;
use crate::error::DriverError;
use crate::hw::{ClockDriver, InterruptDriver, ProcessorDriver, TimerDriver};
use crate::identity::DriverType;

/// A hardware or software component managed by the driver registry.
///
/// Instances are shared `'static` values, so every method takes `&self`;
/// mutable driver state belongs behind the driver's own locks or atomics.
///
/// The lifecycle hooks are called by the registry only, one at a time per
/// instance. They must complete in bounded time and tolerate being called
/// again after a failed start. Resources subscribed through the hook's
/// [`DriverContext`] are dropped by the registry when the driver stops or
/// fails to start.
pub trait Driver: Send + Sync {
    /// The most-derived type record of this instance.
    fn driver_type(&self) -> &DriverType;

    /// Instance name, e.g. `"bcm2835-timer"`.
    fn name(&self) -> &str;

    /// Human-readable description. Defaults to the type's description.
    fn description(&self) -> &str {
        self.driver_type().description
    }

    /// Base address of the device, or 0 where that is meaningless.
    fn address(&self) -> u64 {
        0
    }

    /// Operations this driver type permits. Defaults to all of them.
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    /// Brings the driver up.
    ///
    /// # Errors
    ///
    /// Returns the reason the driver could not start; the instance is then
    /// marked failed.
    fn on_start(&self, _cx: &DriverContext<'_>) -> Result<(), DriverError> {
        Ok(())
    }

    /// Shuts the driver down.
    ///
    /// # Errors
    ///
    /// Returns the reason the driver refused to stop; it stays running.
    fn on_stop(&self, _cx: &DriverContext<'_>) -> Result<(), DriverError> {
        Ok(())
    }

    /// Handles an IRQ line this running driver subscribed to.
    ///
    /// Runs in interrupt context with the registry catalog locked; it must
    /// not call back into the registry.
    fn on_irq(&self, _irq: u8) {}

    /// This driver's processor interface, if it is one.
    fn as_processor(&self) -> Option<&dyn ProcessorDriver> {
        None
    }

    /// This driver's clock interface, if it is one.
    fn as_clock(&self) -> Option<&dyn ClockDriver> {
        None
    }

    /// This driver's timer interface, if it is one.
    fn as_timer(&self) -> Option<&dyn TimerDriver> {
        None
    }

    /// This driver's interrupt controller interface, if it is one.
    fn as_interrupt(&self) -> Option<&dyn InterruptDriver> {
        None
    }
}

impl core::fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name())
            .field("type", &self.driver_type().name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InstanceId;
    use crate::identity::SOFTWARE;
    use crate::resource::Resources;

    struct Null;

    impl Driver for Null {
        fn driver_type(&self) -> &DriverType {
            &SOFTWARE
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    #[test]
    fn defaults() {
        let d = Null;
        let resources = Resources::new();
        let cx = DriverContext::new(InstanceId::next(), &resources);
        assert_eq!(d.description(), "Software Service");
        assert_eq!(d.address(), 0);
        assert_eq!(d.capabilities(), Capabilities::all());
        assert_eq!(d.on_start(&cx), Ok(()));
        assert_eq!(d.on_stop(&cx), Ok(()));
        d.on_irq(1);
        assert!(resources.is_empty());
        assert!(d.as_timer().is_none());
        assert!(d.as_clock().is_none());
        assert!(d.as_processor().is_none());
        assert!(d.as_interrupt().is_none());
    }
}
