//! Synchronization primitives for the kernel.
//!
//! Provides [`CriticalSection`] (per-core interrupt masking), [`IrqSpinLock`]
//! and [`SpinLock`] suitable for `static` items and usable before any
//! allocator or scheduler exists, and [`OwnerSlot`] for single-owner roles.

mod critical_section;
mod irq_spinlock;
mod owner_slot;
mod spinlock;

pub(crate) mod loom_compat;

pub use critical_section::{CriticalSection, interrupts_masked};
pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use owner_slot::OwnerSlot;
pub use spinlock::{SpinLock, SpinLockGuard};
