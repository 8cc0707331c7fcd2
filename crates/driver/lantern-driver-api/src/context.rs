//! What a lifecycle hook knows about the instance it runs for.
//!
//! The registry gives every installed instance an [`InstanceId`] and passes
//! a [`DriverContext`] to `on_start` and `on_stop`. Hooks use it to identify
//! themselves to shared resources ([`ExclusiveSlot`](crate::ExclusiveSlot))
//! and to subscribe to memory and IRQ lines.
//!
//! Instance identity never comes from a driver's address: stateless
//! zero-sized drivers may all live at the same one.

use core::fmt;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::DriverError;
use crate::resource::{MemoryRange, Resources};

/// Reason reported when a memory subscription collides with another driver.
pub const MEMORY_IN_USE: &str = "Memory range is in use by another driver";

/// Unique identity of one installed driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(NonZeroUsize);

static NEXT_INSTANCE: AtomicUsize = AtomicUsize::new(1);

impl InstanceId {
    /// Allocates a fresh id, never handed out before.
    pub fn next() -> Self {
        let raw = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        match NonZeroUsize::new(raw) {
            Some(id) => Self(id),
            None => panic!("driver instance ids exhausted"),
        }
    }

    /// The raw, non-zero value.
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arbitrates memory between instances. Implemented by the registry.
pub trait ResourceArbiter: Sync {
    /// Adds `range` to `holder` unless an instance other than `claimant`
    /// already holds part of it. Returns `true` if added.
    ///
    /// The check and the insert are atomic with respect to other claims.
    fn claim_memory(&self, claimant: InstanceId, holder: &Resources, range: MemoryRange) -> bool;
}

/// The instance a lifecycle hook runs for.
pub struct DriverContext<'a> {
    instance: InstanceId,
    resources: &'a Resources,
    arbiter: Option<&'a dyn ResourceArbiter>,
}

impl<'a> DriverContext<'a> {
    /// A context without arbitration: memory subscriptions always succeed.
    pub const fn new(instance: InstanceId, resources: &'a Resources) -> Self {
        Self {
            instance,
            resources,
            arbiter: None,
        }
    }

    /// A context whose memory subscriptions are checked by `arbiter`.
    pub const fn arbitrated(
        instance: InstanceId,
        resources: &'a Resources,
        arbiter: &'a dyn ResourceArbiter,
    ) -> Self {
        Self {
            instance,
            resources,
            arbiter: Some(arbiter),
        }
    }

    /// The running instance.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Everything the instance currently holds.
    pub fn resources(&self) -> &'a Resources {
        self.resources
    }

    /// Subscribes to `len` bytes of physical memory at `start`.
    ///
    /// # Errors
    ///
    /// [`DriverError::AlreadyClaimed`] if another active driver holds any
    /// part of the range.
    pub fn subscribe_memory(&self, start: usize, len: usize) -> Result<(), DriverError> {
        let range = MemoryRange::new(start, len);
        match self.arbiter {
            Some(arbiter) if !arbiter.claim_memory(self.instance, self.resources, range) => {
                Err(DriverError::AlreadyClaimed(MEMORY_IN_USE))
            }
            Some(_) => Ok(()),
            None => {
                self.resources.add_memory(range);
                Ok(())
            }
        }
    }

    /// Drops a memory subscription, or the part of one that `start..start+len`
    /// covers.
    pub fn unsubscribe_memory(&self, start: usize, len: usize) {
        self.resources.remove_memory(MemoryRange::new(start, len));
    }

    /// Subscribes to an IRQ line.
    pub fn subscribe_irq(&self, irq: u8) {
        self.resources.subscribe_irq(irq);
    }

    /// Drops an IRQ subscription.
    pub fn unsubscribe_irq(&self, irq: u8) {
        self.resources.unsubscribe_irq(irq);
    }
}

impl fmt::Debug for DriverContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverContext")
            .field("instance", &self.instance)
            .field("arbitrated", &self.arbiter.is_some())
            .finish_non_exhaustive()
    }
}
