//! Lifecycle event notification.
//!
//! Listeners are plain function pointers so they can be registered from
//! anywhere, including before the heap is up. They are called after the
//! registry has released its catalog lock, so a listener may query the
//! registry. Listeners run with whatever interrupt state the caller had.

use alloc::vec::Vec;

use lantern_core::sync::SpinLock;
use lantern_driver_api::DriverError;

use crate::registry::DriverHandle;

/// Something that happened to an installed driver.
#[derive(Debug, Clone, Copy)]
pub enum DriverEvent<'a> {
    /// The driver joined the registry.
    Installed(&'a DriverHandle),
    /// The driver started successfully.
    Started(&'a DriverHandle),
    /// The driver stopped.
    Stopped(&'a DriverHandle),
    /// A start attempt failed.
    Failed(&'a DriverHandle, DriverError),
    /// The driver left the registry.
    Uninstalled(&'a DriverHandle),
}

impl<'a> DriverEvent<'a> {
    /// The driver the event is about.
    pub fn driver(&self) -> &'a DriverHandle {
        match *self {
            Self::Installed(handle)
            | Self::Started(handle)
            | Self::Stopped(handle)
            | Self::Failed(handle, _)
            | Self::Uninstalled(handle) => handle,
        }
    }
}

/// Event callback.
pub type Listener = fn(&DriverEvent<'_>);

/// The set of registered listeners.
pub(crate) struct Listeners {
    list: SpinLock<Vec<Listener>>,
}

impl Listeners {
    pub(crate) const fn new() -> Self {
        Self {
            list: SpinLock::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, listener: Listener) {
        self.list.lock().push(listener);
    }

    /// Removes `listener`. Returns `true` if it was registered.
    pub(crate) fn unsubscribe(&self, listener: Listener) -> bool {
        let mut list = self.list.lock();
        let before = list.len();
        list.retain(|l| *l as usize != listener as usize);
        list.len() != before
    }

    pub(crate) fn emit(&self, event: &DriverEvent<'_>) {
        // Snapshot so a listener may subscribe or unsubscribe.
        let listeners = self.list.lock().clone();
        for listener in listeners {
            listener(event);
        }
    }
}
