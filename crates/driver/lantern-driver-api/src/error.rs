//! Driver error types.

use core::fmt;

use crate::identity::DriverTypeId;
use crate::state::{DriverState, Operation};

/// Errors that can occur during driver lifecycle and registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The instance's capability policy forbids the operation.
    PolicyViolation(&'static str),
    /// An exclusive role is already held by a different instance.
    AlreadyClaimed(&'static str),
    /// A lifecycle hook reported failure.
    HookFailure(&'static str),
    /// No installed driver matches the requested type.
    NotFound(DriverTypeId),
    /// The operation is not valid in the instance's current state.
    InvalidTransition {
        /// The rejected operation.
        operation: Operation,
        /// The state the instance was in.
        state: DriverState,
    },
    /// The instance is already in the registry.
    AlreadyInstalled,
    /// The instance is no longer in the registry.
    NotInstalled,
}

impl DriverError {
    /// Returns the human-readable reason carried by the error, if any.
    pub const fn reason(&self) -> Option<&'static str> {
        match self {
            Self::PolicyViolation(reason)
            | Self::AlreadyClaimed(reason)
            | Self::HookFailure(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyViolation(reason) => write!(f, "policy violation: {reason}"),
            Self::AlreadyClaimed(reason) => write!(f, "already claimed: {reason}"),
            Self::HookFailure(reason) => f.write_str(reason),
            Self::NotFound(id) => write!(f, "no driver of type {id}"),
            Self::InvalidTransition { operation, state } => {
                write!(f, "cannot {operation} a driver that is {state}")
            }
            Self::AlreadyInstalled => f.write_str("driver already installed"),
            Self::NotInstalled => f.write_str("driver not installed"),
        }
    }
}
