//! Resident-service policy.
//!
//! A resident service may be started but never stopped or restarted.
//! [`ResidentService`] wraps any [`TypedDriver`] and enforces that,
//! inserting a `resident` node above the wrapped type in the identity chain
//! so the service is found both as a resident and as what it wraps.

use crate::capability::Capabilities;
use crate::context::DriverContext;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::hw::{ClockDriver, InterruptDriver, ProcessorDriver, TimerDriver};
use crate::identity::{DriverType, RESIDENT_ID, TypedDriver};

/// Reason reported when something tries to stop a resident service.
pub const STOP_REFUSED: &str = "A resident service driver cannot be stopped";

/// A driver that cannot be stopped or restarted once started.
///
/// ```ignore
/// static SCHEDULER: ResidentService<Scheduler> = ResidentService::new(Scheduler::new());
/// ```
pub struct ResidentService<D: TypedDriver> {
    inner: D,
    ty: DriverType,
}

impl<D: TypedDriver> ResidentService<D> {
    /// Wraps `inner`. The resident node keeps the wrapped type's category.
    pub const fn new(inner: D) -> Self {
        Self {
            inner,
            ty: DriverType::new(
                RESIDENT_ID,
                "resident",
                "Resident Service",
                D::TYPE.category,
                Some(D::TYPE),
            ),
        }
    }

    /// The wrapped driver.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: TypedDriver> Driver for ResidentService<D> {
    fn driver_type(&self) -> &DriverType {
        &self.ty
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn address(&self) -> u64 {
        self.inner.address()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities() - Capabilities::STOPPABLE
    }

    fn on_start(&self, cx: &DriverContext<'_>) -> Result<(), DriverError> {
        self.inner.on_start(cx)
    }

    fn on_stop(&self, _cx: &DriverContext<'_>) -> Result<(), DriverError> {
        Err(DriverError::PolicyViolation(STOP_REFUSED))
    }

    fn on_irq(&self, irq: u8) {
        self.inner.on_irq(irq);
    }

    fn as_processor(&self) -> Option<&dyn ProcessorDriver> {
        self.inner.as_processor()
    }

    fn as_clock(&self) -> Option<&dyn ClockDriver> {
        self.inner.as_clock()
    }

    fn as_timer(&self) -> Option<&dyn TimerDriver> {
        self.inner.as_timer()
    }

    fn as_interrupt(&self) -> Option<&dyn InterruptDriver> {
        self.inner.as_interrupt()
    }
}
