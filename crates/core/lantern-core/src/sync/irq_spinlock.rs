//! Interrupt-safe spin lock.
//!
//! Enters a [`CriticalSection`] before acquiring the inner spin lock and
//! leaves it after release. This prevents deadlocks when a lock is shared
//! between interrupt handlers and normal kernel code, and keeps the holder
//! from being preempted while other cores spin.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use super::CriticalSection;

/// A spin lock that masks interrupts on the current core while held.
pub struct IrqSpinLock<T> {
    locked: AtomicBool,
    name: &'static str,
    data: UnsafeCell<T>,
}

// SAFETY: Same reasoning as SpinLock: atomic ops ensure exclusive access.
unsafe impl<T: Send> Send for IrqSpinLock<T> {}
unsafe impl<T: Send> Sync for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    /// Creates a new unlocked `IrqSpinLock`.
    pub const fn new(value: T) -> Self {
        Self::named("<unnamed>", value)
    }

    /// Creates a new unlocked `IrqSpinLock` with a name for diagnostics.
    pub const fn named(name: &'static str, value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            name,
            data: UnsafeCell::new(value),
        }
    }

    /// Returns the diagnostic name given at construction.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the lock, masking interrupts first.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let section = CriticalSection::enter();

        // TTAS spin to acquire.
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return IrqSpinLockGuard {
                    lock: self,
                    _section: section,
                };
            }
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// On failure the critical section is left again before returning.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T>> {
        let section = CriticalSection::enter();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqSpinLockGuard {
                lock: self,
                _section: section,
            })
        } else {
            None
        }
    }

    /// Runs `f` with exclusive access to the protected data.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }
}

/// RAII guard that releases the lock and then leaves the critical section.
pub struct IrqSpinLockGuard<'a, T> {
    lock: &'a IrqSpinLock<T>,
    // Dropped after `Drop::drop` releases the lock, so interrupts stay
    // masked until the lock word is clear.
    _section: CriticalSection,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
