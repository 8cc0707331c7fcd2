//! Driver model for the Lantern kernel.
//!
//! This crate defines what a driver *is*, independent of where it is kept:
//!
//! - **Identity** -- [`DriverType`] records linked into single-parent chains,
//!   walked by [`is_a`] instead of relying on native runtime type info.
//! - **Contract** -- the [`Driver`] trait: identity, capability policy, and
//!   the `on_start` / `on_stop` lifecycle hooks.
//! - **Classes** -- [`DriverClass`] pairs a type record with the interface
//!   ([`TimerDriver`], [`ClockDriver`], ...) a consumer gets after a
//!   successful downcast.
//! - **Policy** -- [`Capabilities`], the [`ResidentService`] wrapper, and
//!   [`ExclusiveSlot`] for categories with a single active instance.
//! - **Context** -- the [`DriverContext`] a hook runs with: the instance's
//!   [`InstanceId`] and the [`Resources`] it subscribes to.
//!
//! The registry that installs and sequences drivers lives in
//! `lantern-drivers`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod capability;
pub mod class;
pub mod context;
pub mod driver;
pub mod error;
pub mod exclusive;
pub mod hw;
pub mod identity;
pub mod resident;
pub mod resource;
pub mod state;

// Re-export all public types at the crate root for ergonomic imports.
pub use capability::Capabilities;
pub use class::DriverClass;
pub use context::{DriverContext, InstanceId, ResourceArbiter};
pub use driver::Driver;
pub use error::DriverError;
pub use exclusive::{ExclusiveSlot, PROCESSOR_SLOT};
pub use hw::{ClockDriver, Date, InterruptDriver, ProcessorDriver, Time, TimerDriver};
pub use identity::{DriverCategory, DriverType, DriverTypeId, TypedDriver, is_a};
pub use resident::ResidentService;
pub use resource::{IrqSet, MemoryRange, Resources};
pub use state::{DriverState, Operation};
