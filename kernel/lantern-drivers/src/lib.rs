//! Lantern driver framework: registry, lifecycle and references.
//!
//! Bring-up code builds `'static` driver instances and installs them into
//! the [`Registry`]. Kernel subsystems then reach drivers by class through
//! a [`DriverReference`], which resolves (and optionally starts) a match on
//! demand and notices when its target goes away.
//!
//! ```ignore
//! lantern_drivers::init(RegistryConfig::default());
//! bringup::install_all(registry(), BOARD)?;
//! registry().log_summary();
//!
//! let start = lantern_drivers::time::now64();
//! ```
//!
//! Lifecycle transitions are serialized per instance and run their hooks
//! inside a critical section.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bringup;
pub mod config;
pub mod events;
mod lifecycle;
pub mod reference;
pub mod registry;
pub mod summary;
pub mod time;

pub use events::{DriverEvent, Listener};
pub use reference::{DriverReference, Resolve};
pub use registry::{
    DriverHandle, InstallOptions, Registry, RegistryConfig, Startup, registry, try_registry,
};

/// Initializes the driver framework: applies the build-time log ceiling and
/// sets up the global registry.
///
/// # Panics
///
/// Panics if called more than once.
pub fn init(config: RegistryConfig) {
    lantern_core::log::set_max_level(config::MAX_LOG_LEVEL);
    registry::init(config);
}
