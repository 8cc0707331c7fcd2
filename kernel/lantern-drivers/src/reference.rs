//! Typed weak references to drivers.
//!
//! A [`DriverReference`] names a driver class, not an instance. It resolves
//! against the registry on first use and caches the handle it found. The
//! cache is re-validated on every access, so a reference never yields a
//! driver that has been uninstalled or has failed; it re-resolves instead,
//! and reports `None` when nothing suitable is installed.
//!
//! A reference can also be bound to one instance with
//! [`DriverReference::assign`]. A bound reference never re-resolves: once
//! its target is uninstalled or fails, it reports `None` until it is
//! reassigned or [reset](DriverReference::reset).
//!
//! ```ignore
//! static TIMER: DriverReference<Timer> = DriverReference::activating();
//!
//! if let Some(timer) = TIMER.get() {
//!     timer.wait(100);
//! }
//! ```

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use lantern_core::sync::SpinLock;
use lantern_driver_api::{DriverClass, DriverError, DriverState};

use crate::registry::{self, DriverHandle, Registry};

/// How a reference finds its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolve {
    /// Take the first installed match as-is.
    Find,
    /// Take a running match, starting one if needed.
    Activate,
}

struct Cache {
    handle: Option<DriverHandle>,
    /// Set by `assign`: the target is fixed, not looked up.
    bound: bool,
    on_terminated: Option<fn()>,
}

/// A typed weak reference to a driver of class `C`.
pub struct DriverReference<C: DriverClass> {
    mode: Resolve,
    cache: SpinLock<Cache>,
    resolving: AtomicBool,
    _class: PhantomData<fn() -> C>,
}

impl<C: DriverClass> DriverReference<C> {
    /// A reference to the first installed, non-failed match. Never starts
    /// anything.
    pub const fn new() -> Self {
        Self::with_options(Resolve::Find, None)
    }

    /// A reference resolved with [`Registry::get_and_activate`].
    pub const fn activating() -> Self {
        Self::with_options(Resolve::Activate, None)
    }

    /// A reference with an explicit mode and termination callback.
    ///
    /// `on_terminated` runs once each time a cached target is found to be
    /// gone.
    pub const fn with_options(mode: Resolve, on_terminated: Option<fn()>) -> Self {
        Self {
            mode,
            cache: SpinLock::new(Cache {
                handle: None,
                bound: false,
                on_terminated,
            }),
            resolving: AtomicBool::new(false),
            _class: PhantomData,
        }
    }

    /// The resolution mode.
    pub fn mode(&self) -> Resolve {
        self.mode
    }

    /// Sets the termination callback.
    pub fn on_terminated(&self, callback: fn()) {
        self.cache.lock().on_terminated = Some(callback);
    }

    /// Drops the cached target without calling the termination callback,
    /// and unbinds an [assigned](Self::assign) reference.
    pub fn reset(&self) {
        let mut cache = self.cache.lock();
        cache.handle = None;
        cache.bound = false;
    }

    /// Binds the reference to `handle`'s instance.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotInstalled`] if the driver was uninstalled, or
    /// [`DriverError::NotFound`] if it is not of class `C`.
    pub fn assign(&self, handle: &DriverHandle) -> Result<(), DriverError> {
        if !handle.is_installed() {
            return Err(DriverError::NotInstalled);
        }
        if handle.cast::<C>().is_none() {
            return Err(DriverError::NotFound(C::TYPE.id));
        }
        let mut cache = self.cache.lock();
        cache.handle = Some(handle.clone());
        cache.bound = true;
        Ok(())
    }

    /// Returns `true` if the reference was bound with [`assign`](Self::assign).
    pub fn is_bound(&self) -> bool {
        self.cache.lock().bound
    }

    /// The target's interface, resolved against the global registry.
    ///
    /// Returns `None` before the registry is initialized.
    pub fn get(&self) -> Option<&'static C::Interface> {
        self.get_in(registry::try_registry()?)
    }

    /// The target's handle, resolved against the global registry.
    pub fn handle(&self) -> Option<DriverHandle> {
        self.handle_in(registry::try_registry()?)
    }

    /// The target's interface, resolved against `registry`.
    pub fn get_in(&self, registry: &Registry) -> Option<&'static C::Interface> {
        self.handle_in(registry)?.cast::<C>()
    }

    /// The target's handle, resolved against `registry`.
    ///
    /// A reference must always be resolved against the same registry.
    /// While a resolution is in progress (for example, a start hook that
    /// resolves the reference that is starting it), further resolutions of
    /// this reference return `None`.
    pub fn handle_in(&self, registry: &Registry) -> Option<DriverHandle> {
        if let Some(handle) = self.cached() {
            return Some(handle);
        }
        if self.is_bound() {
            return None;
        }

        if self.resolving.swap(true, Ordering::AcqRel) {
            return None;
        }
        let found = match self.mode {
            Resolve::Find => registry
                .iter(C::TYPE.id)
                .find(|h| h.state() != DriverState::Failed && h.cast::<C>().is_some()),
            Resolve::Activate => registry.get_and_activate::<C>().map(|(handle, _)| handle),
        };
        self.resolving.store(false, Ordering::Release);

        if let Some(handle) = &found {
            let mut cache = self.cache.lock();
            // An assign() that raced with this lookup wins.
            if cache.bound {
                return cache.handle.clone();
            }
            cache.handle = Some(handle.clone());
        }
        found
    }

    /// Returns the cached handle if it is still usable, clearing it and
    /// running the termination callback if not.
    fn cached(&self) -> Option<DriverHandle> {
        let terminated = {
            let mut cache = self.cache.lock();
            let handle = cache.handle.as_ref()?;
            if self.is_usable(handle, cache.bound) {
                return Some(handle.clone());
            }
            cache.handle = None;
            cache.on_terminated
        };
        if let Some(callback) = terminated {
            callback();
        }
        None
    }

    fn is_usable(&self, handle: &DriverHandle, bound: bool) -> bool {
        if !handle.is_installed() {
            return false;
        }
        match (self.mode, handle.state()) {
            (_, DriverState::Failed) => false,
            _ if bound => true,
            (Resolve::Activate, state) => state == DriverState::Running,
            (Resolve::Find, _) => true,
        }
    }
}

impl<C: DriverClass> Default for DriverReference<C> {
    fn default() -> Self {
        Self::new()
    }
}
