//! Per-instance lifecycle state machine.
//!
//! Every installed driver owns a [`Lifecycle`]. It holds the instance's
//! state, its orthogonal disabled flag, the effective capability policy and
//! the most recent failure.
//!
//! A transition claims the instance by swapping the state into `Starting`
//! or `Stopping` with a single compare-and-swap. A concurrent or re-entrant
//! transition on the same instance sees the transient state and is refused
//! with [`DriverError::InvalidTransition`] instead of spinning, so a hook
//! that calls back into its own instance cannot deadlock. Transitions on
//! different instances never contend.
//!
//! Hooks run inside a [`CriticalSection`], so they are not preempted on the
//! current core. No lock is held while a hook runs.
//!
//! The lifecycle also owns the instance's [`InstanceId`] and the
//! [`Resources`] its hooks subscribe to. Those are dropped whenever the
//! instance goes idle: after a successful stop or a failed start.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use lantern_core::sync::{CriticalSection, SpinLock};
use lantern_driver_api::{
    Capabilities, Driver, DriverContext, DriverError, DriverState, InstanceId, Operation,
    ResourceArbiter, Resources,
};

/// Raw state of an instance that has left the registry.
const DETACHED: u8 = u8::MAX;

/// Lifecycle bookkeeping for one installed instance.
pub(crate) struct Lifecycle {
    instance: InstanceId,
    resources: Resources,
    state: AtomicU8,
    disabled: AtomicBool,
    capabilities: Capabilities,
    last_failure: SpinLock<Option<DriverError>>,
}

impl Lifecycle {
    /// A fresh, stopped lifecycle with the given policy and a new instance
    /// id.
    pub(crate) fn new(capabilities: Capabilities) -> Self {
        Self {
            instance: InstanceId::next(),
            resources: Resources::new(),
            state: AtomicU8::new(DriverState::Stopped as u8),
            disabled: AtomicBool::new(false),
            capabilities,
            last_failure: SpinLock::new(None),
        }
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub(crate) fn instance(&self) -> InstanceId {
        self.instance
    }

    pub(crate) fn resources(&self) -> &Resources {
        &self.resources
    }

    fn context<'a>(&'a self, arbiter: Option<&'a dyn ResourceArbiter>) -> DriverContext<'a> {
        match arbiter {
            Some(arbiter) => DriverContext::arbitrated(self.instance, &self.resources, arbiter),
            None => DriverContext::new(self.instance, &self.resources),
        }
    }

    /// `false` once the instance has been uninstalled.
    pub(crate) fn is_attached(&self) -> bool {
        self.state.load(Ordering::Acquire) != DETACHED
    }

    /// The state as observers see it: `Disabled` overlays an idle state
    /// while the disabled flag is set.
    pub(crate) fn state(&self) -> DriverState {
        let raw = DriverState::from_u8(self.state.load(Ordering::Acquire))
            .unwrap_or(DriverState::Stopped);
        self.report(raw)
    }

    fn report(&self, raw: DriverState) -> DriverState {
        match raw {
            DriverState::Stopped | DriverState::Failed if self.disabled.load(Ordering::Acquire) => {
                DriverState::Disabled
            }
            other => other,
        }
    }

    pub(crate) fn last_failure(&self) -> Option<DriverError> {
        *self.last_failure.lock()
    }

    fn record(&self, error: DriverError) {
        *self.last_failure.lock() = Some(error);
    }

    /// Moves the raw state from `from` to `to`, or explains why not.
    fn claim(&self, operation: Operation, from: u8, to: u8) -> Result<(), DriverError> {
        match self
            .state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(DETACHED) => Err(DriverError::NotInstalled),
            Err(raw) => Err(DriverError::InvalidTransition {
                operation,
                state: self.report(DriverState::from_u8(raw).unwrap_or(DriverState::Stopped)),
            }),
        }
    }

    /// Checks the capability policy for `operation`.
    ///
    /// # Errors
    ///
    /// [`DriverError::PolicyViolation`] if the instance does not permit it.
    pub(crate) fn permit(&self, operation: Operation) -> Result<(), DriverError> {
        let caps = self.capabilities;
        let (allowed, reason) = match operation {
            Operation::Stop => (caps.can_stop(), "This driver cannot be stopped"),
            Operation::Restart => (caps.can_restart(), "This driver cannot be restarted"),
            Operation::Disable => (caps.can_disable(), "This driver cannot be disabled"),
            _ => return Ok(()),
        };
        if allowed {
            Ok(())
        } else {
            Err(DriverError::PolicyViolation(reason))
        }
    }

    /// `stopped` → `starting` → `running` | `failed`.
    pub(crate) fn start(
        &self,
        driver: &dyn Driver,
        arbiter: Option<&dyn ResourceArbiter>,
    ) -> Result<(), DriverError> {
        let _section = CriticalSection::enter();

        if self.disabled.load(Ordering::Acquire) && self.is_attached() {
            return Err(DriverError::InvalidTransition {
                operation: Operation::Start,
                state: self.state(),
            });
        }
        self.claim(
            Operation::Start,
            DriverState::Stopped as u8,
            DriverState::Starting as u8,
        )?;

        match driver.on_start(&self.context(arbiter)) {
            Ok(()) => {
                self.state
                    .store(DriverState::Running as u8, Ordering::Release);
                Ok(())
            }
            Err(error) => {
                self.resources.clear();
                self.record(error);
                self.state.store(DriverState::Failed as u8, Ordering::Release);
                Err(error)
            }
        }
    }

    /// `running` → `stopping` → `stopped`, or back to `running` if the hook
    /// refuses.
    pub(crate) fn stop(
        &self,
        driver: &dyn Driver,
        arbiter: Option<&dyn ResourceArbiter>,
    ) -> Result<(), DriverError> {
        self.permit(Operation::Stop)?;
        let _section = CriticalSection::enter();

        self.claim(
            Operation::Stop,
            DriverState::Running as u8,
            DriverState::Stopping as u8,
        )?;

        match driver.on_stop(&self.context(arbiter)) {
            Ok(()) => {
                self.resources.clear();
                self.state
                    .store(DriverState::Stopped as u8, Ordering::Release);
                Ok(())
            }
            Err(error) => {
                self.record(error);
                self.state
                    .store(DriverState::Running as u8, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Sets the disabled flag. A running instance keeps running.
    pub(crate) fn disable(&self) -> Result<(), DriverError> {
        self.permit(Operation::Disable)?;
        if !self.is_attached() {
            return Err(DriverError::NotInstalled);
        }
        self.disabled.store(true, Ordering::Release);
        Ok(())
    }

    /// Clears the disabled flag.
    pub(crate) fn enable(&self) -> Result<(), DriverError> {
        if !self.is_attached() {
            return Err(DriverError::NotInstalled);
        }
        self.disabled.store(false, Ordering::Release);
        Ok(())
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// `failed` → `stopped`, so the next start runs the hook again.
    pub(crate) fn recover(&self) -> Result<(), DriverError> {
        let _section = CriticalSection::enter();
        self.claim(
            Operation::Recover,
            DriverState::Failed as u8,
            DriverState::Stopped as u8,
        )
    }

    /// `stopped` → detached. After this every transition fails with
    /// [`DriverError::NotInstalled`].
    pub(crate) fn detach(&self) -> Result<(), DriverError> {
        let _section = CriticalSection::enter();
        self.claim(Operation::Uninstall, DriverState::Stopped as u8, DETACHED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicU32;
    use lantern_driver_api::DriverType;
    use lantern_driver_api::identity::SOFTWARE;

    /// Hooks that succeed or fail on command and count their calls.
    struct Probe {
        fail_start: AtomicBool,
        fail_stop: AtomicBool,
        starts: AtomicU32,
        stops: AtomicU32,
    }

    impl Probe {
        const fn new() -> Self {
            Self {
                fail_start: AtomicBool::new(false),
                fail_stop: AtomicBool::new(false),
                starts: AtomicU32::new(0),
                stops: AtomicU32::new(0),
            }
        }
    }

    impl Driver for Probe {
        fn driver_type(&self) -> &DriverType {
            &SOFTWARE
        }

        fn name(&self) -> &str {
            "probe"
        }

        fn on_start(&self, cx: &DriverContext<'_>) -> Result<(), DriverError> {
            self.starts.fetch_add(1, Ordering::Relaxed);
            cx.subscribe_memory(0xfe20_1000, 0x1000)?;
            cx.subscribe_irq(57);
            if self.fail_start.load(Ordering::Relaxed) {
                Err(DriverError::HookFailure("no device"))
            } else {
                Ok(())
            }
        }

        fn on_stop(&self, _cx: &DriverContext<'_>) -> Result<(), DriverError> {
            self.stops.fetch_add(1, Ordering::Relaxed);
            if self.fail_stop.load(Ordering::Relaxed) {
                Err(DriverError::HookFailure("busy"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn start_then_stop() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        assert_eq!(lc.state(), DriverState::Stopped);
        lc.start(&probe, None).unwrap();
        assert_eq!(lc.state(), DriverState::Running);
        lc.stop(&probe, None).unwrap();
        assert_eq!(lc.state(), DriverState::Stopped);
        assert_eq!(probe.starts.load(Ordering::Relaxed), 1);
        assert_eq!(probe.stops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn failed_start_is_recorded() {
        let probe = Probe::new();
        probe.fail_start.store(true, Ordering::Relaxed);
        let lc = Lifecycle::new(Capabilities::all());
        assert_eq!(lc.start(&probe, None), Err(DriverError::HookFailure("no device")));
        assert_eq!(lc.state(), DriverState::Failed);
        assert_eq!(lc.last_failure(), Some(DriverError::HookFailure("no device")));
    }

    #[test]
    fn start_requires_stopped() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap();
        assert_eq!(
            lc.start(&probe, None),
            Err(DriverError::InvalidTransition {
                operation: Operation::Start,
                state: DriverState::Running,
            })
        );
        assert_eq!(probe.starts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn stop_without_capability_leaves_state() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::RESIDENT);
        lc.start(&probe, None).unwrap();
        assert_eq!(
            lc.stop(&probe, None),
            Err(DriverError::PolicyViolation("This driver cannot be stopped"))
        );
        assert_eq!(lc.state(), DriverState::Running);
        assert_eq!(probe.stops.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn refused_stop_keeps_running() {
        let probe = Probe::new();
        probe.fail_stop.store(true, Ordering::Relaxed);
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap();
        assert_eq!(lc.stop(&probe, None), Err(DriverError::HookFailure("busy")));
        assert_eq!(lc.state(), DriverState::Running);
    }

    #[test]
    fn stop_requires_running() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        assert_eq!(
            lc.stop(&probe, None),
            Err(DriverError::InvalidTransition {
                operation: Operation::Stop,
                state: DriverState::Stopped,
            })
        );
    }

    #[test]
    fn disabled_instance_cannot_start() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        lc.disable().unwrap();
        assert_eq!(lc.state(), DriverState::Disabled);
        assert_eq!(
            lc.start(&probe, None),
            Err(DriverError::InvalidTransition {
                operation: Operation::Start,
                state: DriverState::Disabled,
            })
        );
        assert_eq!(probe.starts.load(Ordering::Relaxed), 0);
        lc.enable().unwrap();
        lc.start(&probe, None).unwrap();
    }

    #[test]
    fn disabling_running_instance_does_not_stop_it() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap();
        lc.disable().unwrap();
        assert_eq!(lc.state(), DriverState::Running);
        lc.stop(&probe, None).unwrap();
        assert_eq!(lc.state(), DriverState::Disabled);
    }

    #[test]
    fn disable_needs_capability() {
        let lc = Lifecycle::new(Capabilities::STOPPABLE);
        assert_eq!(
            lc.disable(),
            Err(DriverError::PolicyViolation("This driver cannot be disabled"))
        );
        assert!(!lc.is_disabled());
    }

    #[test]
    fn recover_allows_retry() {
        let probe = Probe::new();
        probe.fail_start.store(true, Ordering::Relaxed);
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap_err();
        lc.recover().unwrap();
        probe.fail_start.store(false, Ordering::Relaxed);
        lc.start(&probe, None).unwrap();
        assert_eq!(probe.starts.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn detached_refuses_everything() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        lc.detach().unwrap();
        assert!(!lc.is_attached());
        assert_eq!(lc.start(&probe, None), Err(DriverError::NotInstalled));
        assert_eq!(lc.enable(), Err(DriverError::NotInstalled));
        assert_eq!(lc.detach(), Err(DriverError::NotInstalled));
    }

    #[test]
    fn detach_requires_stopped() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap();
        assert_eq!(
            lc.detach(),
            Err(DriverError::InvalidTransition {
                operation: Operation::Uninstall,
                state: DriverState::Running,
            })
        );
        assert!(lc.is_attached());
    }

    /// A hook that re-enters its own lifecycle is refused, not deadlocked.
    #[test]
    fn reentrant_transition_is_refused() {
        struct Reentrant {
            lc: Lifecycle,
            inner: SpinLock<Option<DriverError>>,
        }

        impl Driver for Reentrant {
            fn driver_type(&self) -> &DriverType {
                &SOFTWARE
            }

            fn name(&self) -> &str {
                "reentrant"
            }

            fn on_start(&self, _cx: &DriverContext<'_>) -> Result<(), DriverError> {
                *self.inner.lock() = self.lc.start(self, None).err();
                Ok(())
            }
        }

        let driver = Reentrant {
            lc: Lifecycle::new(Capabilities::all()),
            inner: SpinLock::new(None),
        };
        driver.lc.start(&driver, None).unwrap();
        assert_eq!(
            *driver.inner.lock(),
            Some(DriverError::InvalidTransition {
                operation: Operation::Start,
                state: DriverState::Starting,
            })
        );
        assert_eq!(driver.lc.state(), DriverState::Running);
    }

    #[test]
    fn resources_are_held_while_running() {
        let probe = Probe::new();
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap();
        assert!(lc.resources().irqs().contains(57));
        assert_eq!(lc.resources().memory().len(), 1);

        probe.fail_stop.store(true, Ordering::Relaxed);
        lc.stop(&probe, None).unwrap_err();
        assert!(!lc.resources().is_empty(), "still running, still held");

        probe.fail_stop.store(false, Ordering::Relaxed);
        lc.stop(&probe, None).unwrap();
        assert!(lc.resources().is_empty());
    }

    #[test]
    fn failed_start_drops_resources() {
        let probe = Probe::new();
        probe.fail_start.store(true, Ordering::Relaxed);
        let lc = Lifecycle::new(Capabilities::all());
        lc.start(&probe, None).unwrap_err();
        assert!(lc.resources().is_empty());
    }

    #[test]
    fn each_lifecycle_is_a_distinct_instance() {
        let a = Lifecycle::new(Capabilities::all());
        let b = Lifecycle::new(Capabilities::all());
        assert_ne!(a.instance(), b.instance());
    }
}
