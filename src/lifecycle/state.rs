//! Service state as observed on the panel
//!
//! ```text
//! Uncreated --create--> Active <--suspend/unsuspend--> Suspended
//!                          \                              /
//!                           +---------terminate----------+--> Terminated
//! ```
//!
//! The panel is the only source of truth; the state is derived from the
//! server lookup at the start of each operation and checked before any
//! state-changing call is made.

use std::fmt;

use super::identity::ServerRef;
use super::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Suspend,
    Unsuspend,
    Terminate,
    ChangePassword,
    ChangePackage,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Suspend => "suspend",
            Self::Unsuspend => "unsuspend",
            Self::Terminate => "terminate",
            Self::ChangePassword => "change-password",
            Self::ChangePackage => "change-package",
        }
    }

    pub fn missing_server_message(&self) -> &'static str {
        match self {
            Self::Create => "Failed to create server because it is already created.",
            Self::Suspend => "Failed to suspend server because it doesn't exist.",
            Self::Unsuspend => "Failed to unsuspend server because it doesn't exist.",
            Self::Terminate => "Failed to terminate server because it doesn't exist.",
            Self::ChangePassword => "Failed to change password because linked server doesn't exist.",
            Self::ChangePackage => "Failed to change package of server because it doesn't exist.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uncreated,
    Active,
    Suspended,
    Terminated,
}

impl ServiceState {
    /// State implied by a server lookup. An id-only hit (legacy mapping)
    /// carries no suspension flag and counts as active.
    pub fn observe(server: Option<&ServerRef>) -> Self {
        match server {
            None => Self::Uncreated,
            Some(ServerRef::Record(server)) if server.is_suspended() => Self::Suspended,
            Some(_) => Self::Active,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Self::Active | Self::Suspended)
    }

    /// Check `operation` is valid from this state and return the state it
    /// leads to
    pub fn transition(self, operation: Operation) -> Result<Self, LifecycleError> {
        match (operation, self) {
            (Operation::Create, Self::Uncreated) => Ok(Self::Active),
            (Operation::Create, _) => Err(LifecycleError::AlreadyCreated),
            (_, state) if !state.exists() => Err(LifecycleError::ServerMissing(operation)),
            (Operation::Suspend, _) => Ok(Self::Suspended),
            (Operation::Unsuspend, _) => Ok(Self::Active),
            (Operation::Terminate, _) => Ok(Self::Terminated),
            (Operation::ChangePassword | Operation::ChangePackage, state) => Ok(state),
        }
    }
}
