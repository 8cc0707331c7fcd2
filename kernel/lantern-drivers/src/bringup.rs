//! Built-in driver bring-up.
//!
//! A board describes its drivers as a static table; [`install_all`]
//! installs every entry as built-in and then starts the automatic ones in
//! table order.
//!
//! ```ignore
//! static BOARD: &[BuiltinDriver] = &[
//!     BuiltinDriver::automatic(&ARM_CPU),
//!     BuiltinDriver::automatic(&SYSTEM_TIMER),
//!     BuiltinDriver::on_demand(&PL031_RTC),
//! ];
//!
//! bringup::install_all(registry(), BOARD)?;
//! ```

use alloc::vec::Vec;
use core::fmt;

use lantern_core::{kerr, kinfo};
use lantern_driver_api::{Driver, DriverError, DriverState};

use crate::registry::{DriverHandle, InstallOptions, Registry, Startup};

/// One entry of a board's driver table.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDriver {
    /// The instance.
    pub driver: &'static dyn Driver,
    /// When to start it.
    pub startup: Startup,
}

impl BuiltinDriver {
    /// An entry started during bring-up.
    pub const fn automatic(driver: &'static dyn Driver) -> Self {
        Self {
            driver,
            startup: Startup::Automatic,
        }
    }

    /// An entry started only when something asks for it.
    pub const fn on_demand(driver: &'static dyn Driver) -> Self {
        Self {
            driver,
            startup: Startup::OnDemand,
        }
    }
}

/// Outcome of a successful bring-up.
#[derive(Debug, Default)]
pub struct BringupReport {
    /// Drivers installed.
    pub installed: usize,
    /// Automatic drivers now running.
    pub started: usize,
    /// Automatic drivers that failed to start, with the reason.
    pub failed: Vec<(&'static str, DriverError)>,
}

/// A bring-up that cannot continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringupError {
    /// A driver could not be installed.
    Install {
        /// The driver's name.
        driver: &'static str,
        /// Why.
        error: DriverError,
    },
    /// Two drivers of an exclusive category were both meant to start.
    ExclusiveConflict {
        /// The driver that lost.
        driver: &'static str,
        /// The category's reason.
        reason: &'static str,
    },
}

impl fmt::Display for BringupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install { driver, error } => write!(f, "cannot install {driver}: {error}"),
            Self::ExclusiveConflict { driver, reason } => {
                write!(f, "exclusive conflict starting {driver}: {reason}")
            }
        }
    }
}

/// Installs every entry of `table`, then starts the automatic ones.
///
/// An ordinary start failure is logged and recorded in the report.
///
/// # Errors
///
/// [`BringupError::Install`] if an entry cannot be installed, and
/// [`BringupError::ExclusiveConflict`] if an automatic driver lost an
/// exclusive claim, which means the table itself is wrong.
pub fn install_all(
    registry: &Registry,
    table: &[BuiltinDriver],
) -> Result<BringupReport, BringupError> {
    let mut report = BringupReport::default();
    let mut handles = Vec::with_capacity(table.len());

    for entry in table {
        let handle = registry
            .install_with(
                entry.driver,
                InstallOptions {
                    startup: entry.startup,
                    ..InstallOptions::builtin()
                },
            )
            .map_err(|error| BringupError::Install {
                driver: entry.driver.name(),
                error,
            })?;
        handles.push(handle);
    }
    report.installed = handles.len();

    for handle in handles.iter().filter(|h| h.startup() == Startup::Automatic) {
        match start_once(registry, handle) {
            Ok(()) => report.started += 1,
            Err(DriverError::AlreadyClaimed(reason)) => {
                kerr!(
                    "drivers: {} conflicts with an active driver: {}",
                    handle.name(),
                    reason
                );
                return Err(BringupError::ExclusiveConflict {
                    driver: handle.name(),
                    reason,
                });
            }
            Err(error) => report.failed.push((handle.name(), error)),
        }
    }

    kinfo!(
        "drivers: bring-up installed {}, started {}, failed {}",
        report.installed,
        report.started,
        report.failed.len()
    );
    Ok(report)
}

/// Starts `handle` unless autostart on install already tried.
fn start_once(registry: &Registry, handle: &DriverHandle) -> Result<(), DriverError> {
    match handle.state() {
        DriverState::Running => Ok(()),
        DriverState::Failed => Err(handle
            .last_failure()
            .unwrap_or(DriverError::HookFailure("start failed"))),
        _ => registry.start(handle),
    }
}
