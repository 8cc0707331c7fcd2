//! Scoped interrupt masking for the current core.
//!
//! A [`CriticalSection`] saves the interrupt mask, masks interrupts, and
//! restores the saved mask when it is dropped. Because the guard restores
//! whatever state it found, sections nest: only the outermost drop unmasks.
//!
//! Masking interrupts only defers preemption on the *current* core. Data
//! shared between cores still needs a lock; see
//! [`IrqSpinLock`](super::IrqSpinLock), which layers a spin lock on top.

use core::marker::PhantomData;

/// RAII guard that keeps interrupts masked on the current core.
///
/// Acquisition is [`CriticalSection::enter`]; release is the guard's `Drop`,
/// so every exit path (including `?` and early `return`) restores the mask.
pub struct CriticalSection {
    saved: usize,
    // The saved mask belongs to this core: the guard must not migrate.
    _not_send: PhantomData<*const ()>,
}

impl CriticalSection {
    /// Masks interrupts on the current core until the guard is dropped.
    #[must_use = "the critical section ends as soon as the guard is dropped"]
    #[inline]
    pub fn enter() -> Self {
        Self {
            saved: arch::save_and_mask(),
            _not_send: PhantomData,
        }
    }

    /// Runs `f` inside a critical section.
    #[inline]
    pub fn with<R>(f: impl FnOnce() -> R) -> R {
        let _section = Self::enter();
        f()
    }

    /// Returns `true` if interrupts were already masked when this section
    /// was entered (i.e. the section is nested).
    pub fn is_nested(&self) -> bool {
        arch::is_masked(self.saved)
    }
}

impl Drop for CriticalSection {
    #[inline]
    fn drop(&mut self) {
        arch::restore(self.saved);
    }
}

/// Returns `true` if interrupts are currently masked on this core.
pub fn interrupts_masked() -> bool {
    arch::is_masked(arch::read_mask())
}

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
mod arch {
    const IF: usize = 1 << 9;

    #[inline]
    pub(super) fn save_and_mask() -> usize {
        let flags: u64;
        // SAFETY: Reading RFLAGS and disabling interrupts is safe in kernel mode.
        unsafe {
            core::arch::asm!("pushfq", "pop {}", "cli", out(reg) flags, options(nomem));
        }
        flags as usize
    }

    #[inline]
    pub(super) fn read_mask() -> usize {
        let flags: u64;
        // SAFETY: Reading RFLAGS has no side effects.
        unsafe {
            core::arch::asm!("pushfq", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        flags as usize
    }

    #[inline]
    pub(super) fn restore(flags: usize) {
        // Only the IF bit is restored.
        if flags & IF != 0 {
            // SAFETY: Re-enabling interrupts restores the state saved on entry.
            unsafe {
                core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
            }
        }
    }

    #[inline]
    pub(super) fn is_masked(flags: usize) -> bool {
        flags & IF == 0
    }
}

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod arch {
    const IF: usize = 1 << 9;

    #[inline]
    pub(super) fn save_and_mask() -> usize {
        let flags: u32;
        // SAFETY: Reading EFLAGS and disabling interrupts is safe in kernel mode.
        unsafe {
            core::arch::asm!("pushfd", "pop {}", "cli", out(reg) flags, options(nomem));
        }
        flags as usize
    }

    #[inline]
    pub(super) fn read_mask() -> usize {
        let flags: u32;
        // SAFETY: Reading EFLAGS has no side effects.
        unsafe {
            core::arch::asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        flags as usize
    }

    #[inline]
    pub(super) fn restore(flags: usize) {
        if flags & IF != 0 {
            // SAFETY: Re-enabling interrupts restores the state saved on entry.
            unsafe {
                core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
            }
        }
    }

    #[inline]
    pub(super) fn is_masked(flags: usize) -> bool {
        flags & IF == 0
    }
}

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
mod arch {
    // DAIF.I
    const IRQ_MASK: usize = 1 << 7;

    #[inline]
    pub(super) fn save_and_mask() -> usize {
        let flags: u64;
        // SAFETY: Reading DAIF and masking interrupts is safe in kernel mode.
        unsafe {
            core::arch::asm!("mrs {}, DAIF", "msr DAIFSet, #0xf", out(reg) flags, options(nomem));
        }
        flags as usize
    }

    #[inline]
    pub(super) fn read_mask() -> usize {
        let flags: u64;
        // SAFETY: Reading DAIF has no side effects.
        unsafe {
            core::arch::asm!("mrs {}, DAIF", out(reg) flags, options(nomem, nostack));
        }
        flags as usize
    }

    #[inline]
    pub(super) fn restore(flags: usize) {
        // SAFETY: Restoring DAIF is safe; we are restoring a previous state.
        unsafe {
            core::arch::asm!(
                "msr DAIF, {}",
                in(reg) flags as u64,
                options(nomem, nostack, preserves_flags),
            );
        }
    }

    #[inline]
    pub(super) fn is_masked(flags: usize) -> bool {
        flags & IRQ_MASK != 0
    }
}

#[cfg(all(target_os = "none", target_arch = "arm"))]
mod arch {
    // CPSR.I and CPSR.F
    const IRQ_MASK: usize = 1 << 7;
    const FIQ_MASK: usize = 1 << 6;

    #[inline]
    pub(super) fn save_and_mask() -> usize {
        let cpsr: u32;
        // SAFETY: Reading CPSR and masking IRQ/FIQ is safe in a privileged mode.
        unsafe {
            core::arch::asm!("mrs {}, cpsr", "cpsid if", out(reg) cpsr, options(nomem, nostack));
        }
        cpsr as usize
    }

    #[inline]
    pub(super) fn read_mask() -> usize {
        let cpsr: u32;
        // SAFETY: Reading CPSR has no side effects.
        unsafe {
            core::arch::asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack));
        }
        cpsr as usize
    }

    #[inline]
    pub(super) fn restore(cpsr: usize) {
        if cpsr & IRQ_MASK == 0 {
            // SAFETY: Unmasking IRQs restores the state saved on entry.
            unsafe { core::arch::asm!("cpsie i", options(nomem, nostack)) };
        }
        if cpsr & FIQ_MASK == 0 {
            // SAFETY: Unmasking FIQs restores the state saved on entry.
            unsafe { core::arch::asm!("cpsie f", options(nomem, nostack)) };
        }
    }

    #[inline]
    pub(super) fn is_masked(cpsr: usize) -> bool {
        cpsr & IRQ_MASK != 0
    }
}

// Host builds have no interrupts to mask. Unit tests emulate the mask per
// thread so nesting and release-on-every-path can be observed.
#[cfg(not(target_os = "none"))]
mod arch {
    const MASKED: usize = 1;

    #[cfg(test)]
    std::thread_local! {
        static HOST_MASK: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
    }

    #[inline]
    pub(super) fn save_and_mask() -> usize {
        #[cfg(test)]
        {
            HOST_MASK.with(|mask| mask.replace(MASKED))
        }
        #[cfg(not(test))]
        {
            0
        }
    }

    #[inline]
    pub(super) fn read_mask() -> usize {
        #[cfg(test)]
        {
            HOST_MASK.with(core::cell::Cell::get)
        }
        #[cfg(not(test))]
        {
            0
        }
    }

    #[inline]
    pub(super) fn restore(saved: usize) {
        #[cfg(test)]
        HOST_MASK.with(|mask| mask.set(saved));
        #[cfg(not(test))]
        let _ = saved;
    }

    #[inline]
    pub(super) fn is_masked(saved: usize) -> bool {
        saved & MASKED != 0
    }
}
