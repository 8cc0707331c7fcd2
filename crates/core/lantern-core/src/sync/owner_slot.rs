//! Single-owner claim marker.
//!
//! An [`OwnerSlot`] records which owner currently holds some exclusive
//! role, such as "the active CPU driver". Claiming is a
//! single compare-and-swap, so it is safe from any core and from interrupt
//! context, and needs no lock.

use super::loom_compat::{AtomicUsize, Ordering};

const VACANT: usize = 0;

/// A lock-free slot that at most one owner can hold at a time.
///
/// Owners are identified by a non-zero token handed out by the caller. An
/// object's address is not a usable token: zero-sized values may share one.
pub struct OwnerSlot {
    owner: AtomicUsize,
}

impl OwnerSlot {
    /// Creates an unclaimed slot.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            owner: AtomicUsize::new(VACANT),
        }
    }

    /// Creates an unclaimed slot.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            owner: AtomicUsize::new(VACANT),
        }
    }

    /// Claims the slot for `token`.
    ///
    /// Succeeds if the slot was vacant or already held by `token`.
    ///
    /// # Errors
    ///
    /// Returns the current owner's token if another owner holds the slot.
    pub fn claim(&self, token: usize) -> Result<(), usize> {
        debug_assert_ne!(token, VACANT, "owner token must be non-zero");
        match self
            .owner
            .compare_exchange(VACANT, token, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(current) if current == token => Ok(()),
            Err(current) => Err(current),
        }
    }

    /// Releases the slot if `token` holds it. Returns `true` if released.
    pub fn release(&self, token: usize) -> bool {
        self.owner
            .compare_exchange(token, VACANT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns the current owner's token, or `None` if vacant.
    pub fn owner(&self) -> Option<usize> {
        match self.owner.load(Ordering::Acquire) {
            VACANT => None,
            token => Some(token),
        }
    }

    /// Returns `true` if `token` currently holds the slot.
    pub fn is_held_by(&self, token: usize) -> bool {
        self.owner() == Some(token)
    }
}

impl Default for OwnerSlot {
    fn default() -> Self {
        Self::new()
    }
}
