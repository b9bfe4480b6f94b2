//! Mutable supervisor state and its read-only snapshots.

use serde::Serialize;
use std::time::Instant;

use crate::launch::ShellHandle;

/// Owned exclusively by the [`crate::Supervisor`]; nothing outside the crate
/// can touch these fields.
#[derive(Debug, Default)]
pub(crate) struct SupervisorState {
    /// Believed liveness of the worker, reconciled every tick
    pub is_running: bool,
    /// Strategy responsible for the current or last worker
    pub running_strategy: Option<String>,
    /// Set by an explicit stop; suppresses restarts until the next start
    pub user_stopped: bool,
    /// Guards against overlapping restart attempts
    pub is_restarting: bool,
    /// When the current launch began; used once for the grace check
    pub launch_pending_since: Option<Instant>,
    /// Shell that ran the strategy script (not the worker)
    pub shell: Option<Box<dyn ShellHandle>>,
}

impl SupervisorState {
    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            is_running: self.is_running,
            running_strategy: self.running_strategy.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub is_running: bool,
    pub running_strategy: Option<String>,
}

/// Internal flags, exposed read-only for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorDiagnostics {
    pub user_stopped: bool,
    pub is_restarting: bool,
    pub launch_pending: bool,
    pub restart_pending: bool,
    pub has_shell: bool,
}
