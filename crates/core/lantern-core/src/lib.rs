//! Core primitives for the Lantern kernel.
//!
//! This crate holds the host-testable leaves of the driver framework:
//! the scoped [`CriticalSection`](sync::CriticalSection), the locks built on
//! top of it, the single-owner [`OwnerSlot`](sync::OwnerSlot) used by
//! exclusive driver categories, and the leveled logging macros every other
//! crate reports through.
//!
//! By living outside the kernel crates these can be tested with
//! `cargo test` (and `loom`, via `RUSTFLAGS="--cfg loom"`) on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod log;
pub mod sync;
