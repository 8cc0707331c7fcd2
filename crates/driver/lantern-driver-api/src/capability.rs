//! Lifecycle capability policy.

bitflags::bitflags! {
    /// Lifecycle operations a driver instance permits.
    ///
    /// A driver type declares its default through
    /// [`Driver::capabilities`](crate::Driver::capabilities); the registry
    /// may narrow it per instance at install time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// The instance may be stopped once running.
        const STOP = 1 << 0;
        /// The instance may be restarted (stop followed by start).
        const RESTART = 1 << 1;
        /// The instance may be disabled, preventing future starts.
        const DISABLE = 1 << 2;

        /// Stop and restart together.
        const STOPPABLE = Self::STOP.bits() | Self::RESTART.bits();
    }
}

impl Capabilities {
    /// Policy for services that must keep running once started.
    pub const RESIDENT: Self = Self::DISABLE;

    /// Returns `true` if the instance may be stopped.
    pub const fn can_stop(self) -> bool {
        self.contains(Self::STOP)
    }

    /// Returns `true` if the instance may be restarted.
    pub const fn can_restart(self) -> bool {
        self.contains(Self::RESTART)
    }

    /// Returns `true` if the instance may be disabled.
    pub const fn can_disable(self) -> bool {
        self.contains(Self::DISABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_includes_every_operation() {
        let caps = Capabilities::all();
        assert!(caps.can_stop());
        assert!(caps.can_restart());
        assert!(caps.can_disable());
    }

    #[test]
    fn resident_policy_forbids_stop_and_restart() {
        let caps = Capabilities::RESIDENT;
        assert!(!caps.can_stop());
        assert!(!caps.can_restart());
        assert!(caps.can_disable());
        assert_eq!(Capabilities::all() - Capabilities::STOPPABLE, caps);
    }
}
