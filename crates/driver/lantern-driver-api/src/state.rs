//! Observable driver states and the operations that move between them.

use core::fmt;

/// Lifecycle state of an installed driver instance.
///
/// ```text
///            start            hook ok
/// Stopped ──────────▶ Starting ──────▶ Running
///    ▲                   │                │ stop
///    │ recover           │ hook err       ▼
/// Failed ◀───────────────┘            Stopping ──▶ Stopped
/// ```
///
/// `Disabled` is not a separate position in the machine: it is reported
/// for a non-running instance whose disabled flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverState {
    /// Installed and idle. The initial state.
    Stopped = 0,
    /// `on_start` is running.
    Starting = 1,
    /// Started successfully.
    Running = 2,
    /// `on_stop` is running.
    Stopping = 3,
    /// Idle and barred from starting.
    Disabled = 4,
    /// The last start attempt failed.
    Failed = 5,
}

impl DriverState {
    /// Decodes a raw state byte, as stored in an atomic.
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Stopped,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            4 => Self::Disabled,
            5 => Self::Failed,
            _ => return None,
        })
    }

    /// Returns `true` while a hook is executing.
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    /// Lowercase name, as used in log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Disabled => "disabled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle or registry operation, named in transition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Adding an instance to the registry.
    Install,
    /// Starting an instance.
    Start,
    /// Stopping an instance.
    Stop,
    /// Stopping then starting an instance.
    Restart,
    /// Barring an instance from starting.
    Disable,
    /// Lifting a disable.
    Enable,
    /// Returning a failed instance to stopped.
    Recover,
    /// Removing an instance from the registry.
    Uninstall,
}

impl Operation {
    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Disable => "disable",
            Self::Enable => "enable",
            Self::Recover => "recover",
            Self::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        for state in [
            DriverState::Stopped,
            DriverState::Starting,
            DriverState::Running,
            DriverState::Stopping,
            DriverState::Disabled,
            DriverState::Failed,
        ] {
            assert_eq!(DriverState::from_u8(state as u8), Some(state));
        }
        assert_eq!(DriverState::from_u8(6), None);
    }

    #[test]
    fn only_hook_states_are_transitioning() {
        assert!(DriverState::Starting.is_transitioning());
        assert!(DriverState::Stopping.is_transitioning());
        assert!(!DriverState::Running.is_transitioning());
        assert!(!DriverState::Failed.is_transitioning());
    }

    #[test]
    fn display_names() {
        assert_eq!(format!("{}", DriverState::Running), "running");
        assert_eq!(format!("{}", Operation::Restart), "restart");
    }
}
