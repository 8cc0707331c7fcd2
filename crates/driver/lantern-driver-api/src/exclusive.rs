//! Mutually exclusive driver categories.
//!
//! Some categories allow only one active instance kernel-wide: there is one
//! CPU driver, whatever the number of candidates installed. Each candidate
//! claims the category's [`ExclusiveSlot`] from its start hook and releases
//! it from its stop hook. Claimants are told apart by [`InstanceId`], so
//! stateless zero-sized drivers compete like any other.
//!
//! ```ignore
//! fn on_start(&self, cx: &DriverContext<'_>) -> Result<(), DriverError> {
//!     PROCESSOR_SLOT.claim(cx)?;
//!     // bring the core up
//!     Ok(())
//! }
//! ```

use lantern_core::sync::OwnerSlot;

use crate::context::{DriverContext, InstanceId};
use crate::error::DriverError;
use crate::identity::{self, DriverType};

/// The single-owner marker for one exclusive category.
pub struct ExclusiveSlot {
    category: &'static DriverType,
    reason: &'static str,
    slot: OwnerSlot,
}

impl ExclusiveSlot {
    /// Creates a vacant slot for `category`. `reason` is reported to losing
    /// claimants.
    pub const fn new(category: &'static DriverType, reason: &'static str) -> Self {
        Self {
            category,
            reason,
            slot: OwnerSlot::new(),
        }
    }

    /// The category this slot guards.
    pub fn category(&self) -> &'static DriverType {
        self.category
    }

    /// Claims the slot for the instance `cx` runs for. Claiming again as
    /// the current owner succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AlreadyClaimed`] if a different instance holds
    /// the slot.
    pub fn claim(&self, cx: &DriverContext<'_>) -> Result<(), DriverError> {
        self.slot
            .claim(cx.instance().get())
            .map_err(|_| DriverError::AlreadyClaimed(self.reason))
    }

    /// Releases the slot if the instance `cx` runs for holds it. Returns
    /// `true` if released.
    pub fn release(&self, cx: &DriverContext<'_>) -> bool {
        self.slot.release(cx.instance().get())
    }

    /// Returns `true` if `instance` holds the slot.
    pub fn is_claimed_by(&self, instance: InstanceId) -> bool {
        self.slot.is_held_by(instance.get())
    }

    /// Returns `true` if anyone holds the slot.
    pub fn is_claimed(&self) -> bool {
        self.slot.owner().is_some()
    }
}

/// The processor category: exactly one active CPU driver.
pub static PROCESSOR_SLOT: ExclusiveSlot =
    ExclusiveSlot::new(&identity::PROCESSOR, "A CPU driver is already active");
