//! Worker lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Lifecycle states of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Precache in progress.
    Installing,
    /// Installed, waiting for the previous version to let go.
    Installed,
    /// Purging stale namespaces and claiming clients.
    Activating,
    /// Serving intercepted requests.
    Activated,
    /// Install failed, or replaced by a newer version.
    Terminated,
}

/// Host-driven events that move a worker between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    InstallSucceeded,
    InstallFailed,
    Activate,
    ActivationFinished,
    Terminate,
}

impl LifecycleEvent {
    fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::InstallSucceeded => "finish install",
            LifecycleEvent::InstallFailed => "fail install",
            LifecycleEvent::Activate => "activate",
            LifecycleEvent::ActivationFinished => "finish activation",
            LifecycleEvent::Terminate => "terminate",
        }
    }
}

impl WorkerState {
    /// Apply `event`, returning the next state.
    ///
    /// Activation always ends in `Activated`, even when purging stale
    /// namespaces failed; the failure is reported separately.
    pub fn transition(self, event: LifecycleEvent) -> Result<WorkerState, Error> {
        use LifecycleEvent as E;
        use WorkerState as S;

        match (self, event) {
            (S::Installing, E::InstallSucceeded) => Ok(S::Installed),
            (S::Installing, E::InstallFailed) => Ok(S::Terminated),
            (S::Installed, E::Activate) => Ok(S::Activating),
            (S::Activating, E::ActivationFinished) => Ok(S::Activated),
            (_, E::Terminate) => Ok(S::Terminated),
            (state, event) => Err(Error::InvalidState { event: event.name(), state }),
        }
    }

    /// Only an activated worker intercepts requests.
    pub fn can_intercept(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
