//! Auto-restart bookkeeping.
//!
//! A lost worker is not relaunched immediately: the restart is queued for
//! `restart_delay`, and `is_restarting` is held from the moment it is queued
//! until `restart_cooldown` after the attempt (or until a launch succeeds).
//! The guard therefore always expires, even if the relaunch silently fails.

use std::time::{Duration, Instant};

use crate::catalog::Strategy;
use crate::state::SupervisorState;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRestart {
    strategy: String,
    due: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct RestartPolicy {
    pending: Option<PendingRestart>,
    cooldown_until: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RestartDecision {
    Launch(Strategy),
    /// The strategy is gone (or was never a worker launcher).
    Abandon,
    /// The user stopped while the restart was queued.
    Skip,
    /// The worker came back on its own before the restart was due.
    WorkerAlive,
}

impl RestartPolicy {
    pub fn schedule(
        &mut self,
        state: &mut SupervisorState,
        strategy: String,
        now: Instant,
        delay: Duration,
    ) {
        state.is_restarting = true;
        self.cooldown_until = None;
        self.pending = Some(PendingRestart {
            strategy,
            due: now + delay,
        });
    }

    /// Hands out the queued strategy once it is due and starts the cool-down.
    pub fn take_due(&mut self, now: Instant, cooldown: Duration) -> Option<String> {
        if self.pending.as_ref().is_some_and(|pending| pending.due <= now) {
            self.cooldown_until = Some(now + cooldown);
            return self.pending.take().map(|pending| pending.strategy);
        }
        None
    }

    pub fn expire_cooldown(&mut self, state: &mut SupervisorState, now: Instant) {
        if self.cooldown_until.is_some_and(|until| until <= now) {
            self.cooldown_until = None;
            if state.is_restarting {
                tracing::debug!("Restart cool-down elapsed");
            }
            state.is_restarting = false;
        }
    }

    pub fn on_launched(&mut self) {
        self.cooldown_until = None;
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.cooldown_until = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Re-validates a queued restart. `resolved` is the catalog entry for the
/// queued name, if it still exists. `worker_present` is only consulted when
/// everything else allows the launch.
pub(crate) fn decide(
    state: &SupervisorState,
    resolved: Option<Strategy>,
    worker_present: impl FnOnce() -> bool,
) -> RestartDecision {
    match resolved {
        None => RestartDecision::Abandon,
        Some(strategy) if strategy.is_service() => RestartDecision::Abandon,
        Some(_) if state.user_stopped => RestartDecision::Skip,
        Some(_) if state.is_running || worker_present() => RestartDecision::WorkerAlive,
        Some(strategy) => RestartDecision::Launch(strategy),
    }
}
