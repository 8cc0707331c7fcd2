//! The driver registry.
//!
//! A catalog of installed driver instances, in installation order. The
//! registry owns membership, not memory: instances are `&'static` and
//! uninstalling one never destroys it.
//!
//! All lifecycle transitions go through the registry so it can log them and
//! notify [listeners](crate::events). The catalog is guarded by an
//! [`IrqSpinLock`] that is never held while a driver hook runs.
//!
//! The kernel uses one global registry, set up once with [`init`] and
//! reached through [`registry`]. Tests build their own with
//! [`Registry::new`].

use alloc::sync::Arc;
use alloc::vec::{self, Vec};
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use lantern_core::sync::{IrqSpinLock, SpinLock};
use lantern_core::{kdebug, kfatal, kinfo, kwarn};
use lantern_driver_api::identity::DriverType;
use lantern_driver_api::{
    Capabilities, Driver, DriverClass, DriverError, DriverState, DriverTypeId, InstanceId,
    MemoryRange, Operation, ResourceArbiter, Resources,
};

use crate::config;
use crate::events::{DriverEvent, Listener, Listeners};
use crate::lifecycle::Lifecycle;

// ---------------------------------------------------------------------------
// Configuration and install options
// ---------------------------------------------------------------------------

/// Runtime registry configuration, passed to [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Start built-in drivers with [`Startup::Automatic`] as soon as they
    /// are installed.
    pub autostart_builtin: bool,
}

impl RegistryConfig {
    /// The build-time defaults from [`config`](crate::config).
    pub const DEFAULT: Self = Self {
        autostart_builtin: config::AUTOSTART_BUILTIN,
    };
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// When a driver should be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Startup {
    /// During bring-up, or on install when autostart is configured.
    #[default]
    Automatic,
    /// Only when something asks for it.
    OnDemand,
}

/// Options for [`Registry::install_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallOptions {
    /// Part of the kernel image rather than loaded later.
    pub builtin: bool,
    /// Start policy.
    pub startup: Startup,
    /// Narrows the driver type's capabilities for this instance. The result
    /// is the intersection, so a policy can never be widened.
    pub capabilities: Option<Capabilities>,
}

impl InstallOptions {
    /// Options for a built-in driver.
    pub const fn builtin() -> Self {
        Self {
            builtin: true,
            startup: Startup::Automatic,
            capabilities: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Entries and handles
// ---------------------------------------------------------------------------

/// Registry record for one installed instance.
struct Entry {
    driver: &'static dyn Driver,
    builtin: bool,
    startup: Startup,
    lifecycle: Lifecycle,
}

/// A shared handle to an installed (or formerly installed) driver.
///
/// Handles stay valid after the driver is uninstalled; they then report
/// [`is_installed`](Self::is_installed) `false` and every transition fails
/// with [`DriverError::NotInstalled`]. A handle belongs to the registry that
/// issued it.
#[derive(Clone)]
pub struct DriverHandle {
    entry: Arc<Entry>,
}

impl DriverHandle {
    /// The driver instance.
    pub fn driver(&self) -> &'static dyn Driver {
        self.entry.driver
    }

    /// The id issued to this installation. A driver that is uninstalled and
    /// installed again gets a new one.
    pub fn instance(&self) -> InstanceId {
        self.entry.lifecycle.instance()
    }

    /// The memory ranges and IRQ lines the driver currently holds.
    pub fn resources(&self) -> &Resources {
        self.entry.lifecycle.resources()
    }

    /// The instance name.
    pub fn name(&self) -> &'static str {
        self.entry.driver.name()
    }

    /// The instance's most-derived type.
    pub fn driver_type(&self) -> &'static DriverType {
        self.entry.driver.driver_type()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.entry.lifecycle.state()
    }

    /// Shorthand for `state() == Running`.
    pub fn is_running(&self) -> bool {
        self.state() == DriverState::Running
    }

    /// `false` once the driver has been uninstalled.
    pub fn is_installed(&self) -> bool {
        self.entry.lifecycle.is_attached()
    }

    /// Whether the driver was installed as part of the kernel image.
    pub fn is_builtin(&self) -> bool {
        self.entry.builtin
    }

    /// The driver's start policy.
    pub fn startup(&self) -> Startup {
        self.entry.startup
    }

    /// The effective capability policy.
    pub fn capabilities(&self) -> Capabilities {
        self.entry.lifecycle.capabilities()
    }

    /// Whether the disabled flag is set.
    pub fn is_disabled(&self) -> bool {
        self.entry.lifecycle.is_disabled()
    }

    /// The most recent hook failure, kept for diagnostics.
    pub fn last_failure(&self) -> Option<DriverError> {
        self.entry.lifecycle.last_failure()
    }

    /// Returns `true` if the instance is `wanted` or refines it.
    pub fn is_a(&self, wanted: DriverTypeId) -> bool {
        self.driver_type().is_a(wanted)
    }

    /// Downcasts to a class interface.
    pub fn cast<C: DriverClass>(&self) -> Option<&'static C::Interface> {
        if self.is_a(C::TYPE.id) {
            C::cast(self.entry.driver)
        } else {
            None
        }
    }

    /// Whether `driver` is the object this handle was installed with.
    ///
    /// Zero-sized drivers of different types may share an address, so the
    /// address alone does not decide it: the type and name must match too.
    fn refers_to(&self, driver: &dyn Driver) -> bool {
        let installed = self.entry.driver;
        core::ptr::addr_eq(core::ptr::from_ref(installed), core::ptr::from_ref(driver))
            && installed.driver_type().id == driver.driver_type().id
            && installed.name() == driver.name()
    }
}

impl PartialEq for DriverHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

impl Eq for DriverHandle {}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverHandle")
            .field("name", &self.name())
            .field("type", &self.driver_type().name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Snapshot iterator over matching handles, in install order.
pub type Matches = vec::IntoIter<DriverHandle>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A catalog of installed drivers.
pub struct Registry {
    catalog: IrqSpinLock<Vec<DriverHandle>>,
    listeners: Listeners,
    autostart_builtin: AtomicBool,
    /// Serializes memory claims so check-then-insert is atomic.
    memory_claims: SpinLock<()>,
}

impl Registry {
    /// Creates an empty registry.
    pub const fn new(config: RegistryConfig) -> Self {
        Self {
            catalog: IrqSpinLock::named("drivers", Vec::new()),
            listeners: Listeners::new(),
            autostart_builtin: AtomicBool::new(config.autostart_builtin),
            memory_claims: SpinLock::new(()),
        }
    }

    fn configure(&self, config: RegistryConfig) {
        self.autostart_builtin
            .store(config.autostart_builtin, Ordering::Release);
    }

    /// Registers a lifecycle event listener.
    pub fn subscribe(&self, listener: Listener) {
        self.listeners.subscribe(listener);
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn unsubscribe(&self, listener: Listener) -> bool {
        self.listeners.unsubscribe(listener)
    }

    // -- membership ---------------------------------------------------------

    /// Installs `driver` in the stopped state.
    ///
    /// A built-in driver is started straight away if the registry is
    /// configured to autostart; a failure to start is logged and does not
    /// fail the install.
    ///
    /// # Errors
    ///
    /// [`DriverError::AlreadyInstalled`] if `driver` is already present.
    pub fn install(
        &self,
        driver: &'static dyn Driver,
        builtin: bool,
    ) -> Result<DriverHandle, DriverError> {
        self.install_with(
            driver,
            InstallOptions {
                builtin,
                ..InstallOptions::default()
            },
        )
    }

    /// Installs `driver` with explicit options.
    ///
    /// # Errors
    ///
    /// [`DriverError::AlreadyInstalled`] if `driver` is already present.
    pub fn install_with(
        &self,
        driver: &'static dyn Driver,
        options: InstallOptions,
    ) -> Result<DriverHandle, DriverError> {
        let mut capabilities = driver.capabilities();
        if let Some(narrowed) = options.capabilities {
            capabilities &= narrowed;
        }
        let handle = DriverHandle {
            entry: Arc::new(Entry {
                driver,
                builtin: options.builtin,
                startup: options.startup,
                lifecycle: Lifecycle::new(capabilities),
            }),
        };

        {
            let mut catalog = self.catalog.lock();
            if catalog.iter().any(|h| h.refers_to(driver)) {
                return Err(DriverError::AlreadyInstalled);
            }
            catalog.push(handle.clone());
        }

        kdebug!(
            "drivers: installed {} ({})",
            handle.name(),
            handle.driver_type().name
        );
        self.listeners.emit(&DriverEvent::Installed(&handle));

        if options.builtin
            && options.startup == Startup::Automatic
            && self.autostart_builtin.load(Ordering::Acquire)
        {
            // Logged inside start().
            let _ = self.start(&handle);
        }

        Ok(handle)
    }

    /// Removes a stopped driver from the registry.
    ///
    /// Outstanding handles and [`DriverReference`](crate::DriverReference)s
    /// observe the removal on their next access.
    ///
    /// # Errors
    ///
    /// [`DriverError::InvalidTransition`] unless the driver is stopped;
    /// [`DriverError::NotInstalled`] if it was already removed.
    pub fn uninstall(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        handle.entry.lifecycle.detach()?;
        self.catalog.lock().retain(|h| h != handle);
        kdebug!("drivers: uninstalled {}", handle.name());
        self.listeners.emit(&DriverEvent::Uninstalled(handle));
        Ok(())
    }

    /// Number of installed drivers.
    pub fn len(&self) -> usize {
        self.catalog.lock().len()
    }

    /// Returns `true` if nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- lookup -------------------------------------------------------------

    /// Snapshot of every installed instance that is `wanted`, in install
    /// order. Later installs and removals do not affect the iterator.
    pub fn iter(&self, wanted: DriverTypeId) -> Matches {
        self.snapshot(|h| h.is_a(wanted))
    }

    fn snapshot(&self, filter: impl Fn(&DriverHandle) -> bool) -> Matches {
        self.catalog
            .lock()
            .iter()
            .filter(|h| filter(h))
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// The first installed instance that is `wanted`. Never starts it.
    pub fn find(&self, wanted: DriverTypeId) -> Option<DriverHandle> {
        self.catalog.lock().iter().find(|h| h.is_a(wanted)).cloned()
    }

    /// The first running instance that is `wanted`.
    pub fn find_active(&self, wanted: DriverTypeId) -> Option<DriverHandle> {
        self.catalog
            .lock()
            .iter()
            .find(|h| h.is_a(wanted) && h.is_running())
            .cloned()
    }

    /// The next instance that is `wanted`, installed after `after`.
    ///
    /// Returns `None` if `after` is no longer installed.
    pub fn find_next(&self, after: &DriverHandle, wanted: DriverTypeId) -> Option<DriverHandle> {
        let catalog = self.catalog.lock();
        let position = catalog.iter().position(|h| h == after)?;
        catalog[position + 1..]
            .iter()
            .find(|h| h.is_a(wanted))
            .cloned()
    }

    /// A running instance that is `wanted`, starting one if needed.
    ///
    /// Prefers an instance that is already running. Otherwise tries each
    /// stopped candidate in install order; a candidate that fails to start
    /// is logged and skipped. Returns `None` if nothing could be activated.
    pub fn find_and_activate(&self, wanted: DriverTypeId) -> Option<DriverHandle> {
        self.activate_first(|h| h.is_a(wanted))
    }

    fn activate_first(&self, filter: impl Fn(&DriverHandle) -> bool) -> Option<DriverHandle> {
        let candidates = self.snapshot(filter);
        if let Some(running) = candidates.as_slice().iter().find(|h| h.is_running()) {
            return Some(running.clone());
        }
        for candidate in candidates {
            if candidate.state() != DriverState::Stopped {
                continue;
            }
            match self.start(&candidate) {
                Ok(()) => return Some(candidate),
                Err(error) => kwarn!(
                    "drivers: unable to activate {}: {}",
                    candidate.name(),
                    error
                ),
            }
        }
        None
    }

    // -- typed lookup -------------------------------------------------------

    /// The first installed driver of class `C`, with its interface.
    pub fn get<C: DriverClass>(&self) -> Option<(DriverHandle, &'static C::Interface)> {
        self.catalog.lock().iter().find_map(typed::<C>)
    }

    /// A running driver of class `C`, starting one if needed.
    pub fn get_and_activate<C: DriverClass>(
        &self,
    ) -> Option<(DriverHandle, &'static C::Interface)> {
        self.activate_first(|h| h.cast::<C>().is_some())
            .as_ref()
            .and_then(typed::<C>)
    }

    /// Like [`get`](Self::get), but reports absence as an error.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotFound`] if no driver of class `C` is installed.
    pub fn require<C: DriverClass>(
        &self,
    ) -> Result<(DriverHandle, &'static C::Interface), DriverError> {
        self.get::<C>().ok_or(DriverError::NotFound(C::TYPE.id))
    }

    // -- resources ----------------------------------------------------------

    /// Returns `true` if an installed driver holds any of the `len` bytes
    /// at `start`. Only active drivers hold memory.
    pub fn is_memory_in_use(&self, start: usize, len: usize) -> bool {
        self.memory_holder(MemoryRange::new(start, len), None)
            .is_some()
    }

    fn memory_holder(
        &self,
        range: MemoryRange,
        except: Option<InstanceId>,
    ) -> Option<DriverHandle> {
        self.catalog
            .lock()
            .iter()
            .find(|h| Some(h.instance()) != except && h.resources().holds_memory(range))
            .cloned()
    }

    /// Running drivers subscribed to `irq`, in install order.
    pub fn irq_subscribers(&self, irq: u8) -> Matches {
        self.snapshot(|h| h.is_running() && h.resources().irqs().contains(irq))
    }

    /// Delivers `irq` to every running subscriber. Returns how many were
    /// called.
    ///
    /// Subscribers run with the catalog locked, so nothing is allocated
    /// here and this is safe from interrupt context.
    pub fn dispatch_irq(&self, irq: u8) -> usize {
        let catalog = self.catalog.lock();
        let mut delivered = 0;
        for handle in catalog
            .iter()
            .filter(|h| h.is_running() && h.resources().irqs().contains(irq))
        {
            handle.driver().on_irq(irq);
            delivered += 1;
        }
        delivered
    }

    // -- lifecycle ----------------------------------------------------------

    /// Starts a stopped driver.
    ///
    /// # Errors
    ///
    /// The hook's error (the driver is then `failed`), or
    /// [`DriverError::InvalidTransition`] if it is not stopped or is
    /// disabled.
    pub fn start(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        kinfo!("drivers: starting {}", handle.name());
        let arbiter: &dyn ResourceArbiter = self;
        match handle.entry.lifecycle.start(handle.entry.driver, Some(arbiter)) {
            Ok(()) => {
                self.listeners.emit(&DriverEvent::Started(handle));
                Ok(())
            }
            Err(error) => {
                kwarn!("drivers: unable to start {}: {}", handle.name(), error);
                // Refusals leave the state alone; anything else came from
                // the hook and left the driver failed.
                if !matches!(
                    error,
                    DriverError::InvalidTransition { .. } | DriverError::NotInstalled
                ) {
                    self.listeners.emit(&DriverEvent::Failed(handle, error));
                }
                Err(error)
            }
        }
    }

    /// Stops a running driver.
    ///
    /// # Errors
    ///
    /// [`DriverError::PolicyViolation`] if the driver may not be stopped,
    /// [`DriverError::InvalidTransition`] if it is not running, or the
    /// hook's error (the driver then stays running).
    pub fn stop(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        kinfo!("drivers: stopping {}", handle.name());
        let arbiter: &dyn ResourceArbiter = self;
        match handle.entry.lifecycle.stop(handle.entry.driver, Some(arbiter)) {
            Ok(()) => {
                self.listeners.emit(&DriverEvent::Stopped(handle));
                Ok(())
            }
            Err(error) => {
                kwarn!("drivers: unable to stop {}: {}", handle.name(), error);
                Err(error)
            }
        }
    }

    /// Stops then starts a driver. A stopped driver is just started.
    ///
    /// If the stop fails, the start is not attempted.
    ///
    /// # Errors
    ///
    /// [`DriverError::PolicyViolation`] if the driver may not be restarted,
    /// otherwise whatever [`stop`](Self::stop) or [`start`](Self::start)
    /// reported.
    pub fn restart(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        handle.entry.lifecycle.permit(Operation::Restart)?;
        if handle.state() == DriverState::Running {
            self.stop(handle)?;
        }
        self.start(handle)
    }

    /// Prevents future starts. A running driver keeps running.
    ///
    /// # Errors
    ///
    /// [`DriverError::PolicyViolation`] if the driver may not be disabled.
    pub fn disable(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        handle.entry.lifecycle.disable()?;
        kinfo!("drivers: disabled {}", handle.name());
        Ok(())
    }

    /// Lifts a [`disable`](Self::disable).
    ///
    /// # Errors
    ///
    /// [`DriverError::NotInstalled`] if the driver was uninstalled.
    pub fn enable(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        handle.entry.lifecycle.enable()?;
        kinfo!("drivers: enabled {}", handle.name());
        Ok(())
    }

    /// Returns a failed driver to stopped so it can be started again.
    ///
    /// # Errors
    ///
    /// [`DriverError::InvalidTransition`] unless the driver has failed.
    pub fn recover(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        handle.entry.lifecycle.recover()?;
        kdebug!("drivers: recovered {}", handle.name());
        Ok(())
    }
}

impl ResourceArbiter for Registry {
    fn claim_memory(&self, claimant: InstanceId, holder: &Resources, range: MemoryRange) -> bool {
        let _claims = self.memory_claims.lock();
        if let Some(owner) = self.memory_holder(range, Some(claimant)) {
            kwarn!(
                "drivers: memory {} requested by {} is held by {}",
                range,
                claimant,
                owner.name()
            );
            return false;
        }
        holder.add_memory(range);
        true
    }
}

fn typed<C: DriverClass>(handle: &DriverHandle) -> Option<(DriverHandle, &'static C::Interface)> {
    handle.cast::<C>().map(|iface| (handle.clone(), iface))
}

// ---------------------------------------------------------------------------
// Global instance
// ---------------------------------------------------------------------------

static REGISTRY: Registry = Registry::new(RegistryConfig::DEFAULT);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global registry.
///
/// Must be called exactly once, before any driver is installed.
///
/// # Panics
///
/// Panics if called a second time.
pub fn init(config: RegistryConfig) {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        kfatal!("drivers: registry initialized twice");
        panic!("driver registry initialized twice");
    }
    REGISTRY.configure(config);
    kdebug!(
        "drivers: registry ready (autostart builtin: {})",
        config.autostart_builtin
    );
}

/// The global registry.
///
/// # Panics
///
/// Panics if [`init`] has not been called.
pub fn registry() -> &'static Registry {
    match try_registry() {
        Some(registry) => registry,
        None => {
            kfatal!("drivers: registry used before init");
            panic!("driver registry not initialized - call registry::init() first");
        }
    }
}

/// The global registry, or `None` before [`init`].
pub fn try_registry() -> Option<&'static Registry> {
    INITIALIZED
        .load(Ordering::Acquire)
        .then_some(&REGISTRY)
}
