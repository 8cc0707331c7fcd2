//! Loom compatibility shim.
//!
//! When compiled with `cfg(loom)`, re-exports loom's atomics so primitives
//! built on this module can be model-checked by loom's deterministic
//! scheduler. Otherwise, re-exports `core::sync::atomic`.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicUsize, Ordering};
