//! Liveness reconciliation.
//!
//! One call per tick compares what the process table says with what the
//! supervisor believes. Rules run in a fixed order:
//!
//! 1. **Grace check** for a pending launch. While the window is open an absent
//!    worker is tolerated; a present one confirms the launch. Once the window
//!    closes the pending mark is cleared *before* anything else, so the
//!    timeout can fire at most once per launch.
//! 2. **Recovered**: the worker is there but we thought it was not (started
//!    outside the supervisor, or liveness lagged the launch).
//! 3. **Lost**: the worker vanished. Explicit stop wins over the auto-restart
//!    setting, which wins over retrying.

use std::time::Instant;

use crate::config::SupervisorTimings;
use crate::state::SupervisorState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    Recovered,
    Lost {
        strategy: Option<String>,
        restart: bool,
    },
    StartupTimedOut {
        strategy: Option<String>,
    },
}

/// `auto_restart` is only consulted when the worker was lost.
pub(crate) fn reconcile(
    state: &mut SupervisorState,
    worker_present: bool,
    now: Instant,
    timings: &SupervisorTimings,
    auto_restart: impl FnOnce() -> bool,
) -> ReconcileOutcome {
    if let Some(since) = state.launch_pending_since {
        if !state.is_running || state.user_stopped {
            state.launch_pending_since = None;
        } else if worker_present {
            state.launch_pending_since = None;
            tracing::debug!(
                strategy = ?state.running_strategy,
                "Worker confirmed for pending launch"
            );
        } else if now.saturating_duration_since(since) >= timings.grace_window() {
            state.launch_pending_since = None;
            if let Some(mut shell) = state.shell.take() {
                let outcome = shell.abort(timings.shell_abort_wait());
                tracing::debug!(?outcome, "Aborted launcher shell after startup timeout");
            }
            state.is_running = false;
            let strategy = state.running_strategy.take();
            tracing::warn!(
                strategy = ?strategy,
                grace_ms = timings.grace_window_ms,
                "Worker did not start within grace window"
            );
            return ReconcileOutcome::StartupTimedOut { strategy };
        } else {
            return ReconcileOutcome::Unchanged;
        }
    }

    if worker_present && !state.is_running {
        state.is_running = true;
        tracing::info!(strategy = ?state.running_strategy, "Worker process detected");
        return ReconcileOutcome::Recovered;
    }

    if !worker_present && state.is_running {
        state.is_running = false;
        state.shell = None;
        let strategy = state.running_strategy.clone();

        if state.user_stopped {
            state.running_strategy = None;
            state.is_restarting = false;
            tracing::info!(strategy = ?strategy, "Worker stopped after explicit stop");
            return ReconcileOutcome::Lost {
                strategy,
                restart: false,
            };
        }

        if !auto_restart() {
            state.running_strategy = None;
            state.is_restarting = false;
            tracing::warn!(strategy = ?strategy, "Worker exited unexpectedly; auto-restart disabled");
            return ReconcileOutcome::Lost {
                strategy,
                restart: false,
            };
        }

        let restart = strategy.is_some() && !state.is_restarting;
        tracing::warn!(
            strategy = ?strategy,
            restart,
            already_restarting = state.is_restarting,
            "Worker exited unexpectedly"
        );
        return ReconcileOutcome::Lost { strategy, restart };
    }

    ReconcileOutcome::Unchanged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{AbortOutcome, ShellHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct CountingShell(Arc<AtomicUsize>);

    impl ShellHandle for CountingShell {
        fn id(&self) -> u32 {
            4242
        }

        fn abort(&mut self, _wait: Duration) -> AbortOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            AbortOutcome::Killed
        }
    }

    fn timings() -> SupervisorTimings {
        SupervisorTimings::default()
    }

    fn launched(strategy: &str, at: Instant, aborts: &Arc<AtomicUsize>) -> SupervisorState {
        SupervisorState {
            is_running: true,
            running_strategy: Some(strategy.to_string()),
            launch_pending_since: Some(at),
            shell: Some(Box::new(CountingShell(Arc::clone(aborts)))),
            ..SupervisorState::default()
        }
    }

    fn running(strategy: &str) -> SupervisorState {
        SupervisorState {
            is_running: true,
            running_strategy: Some(strategy.to_string()),
            ..SupervisorState::default()
        }
    }

    #[test]
    fn test_absent_worker_tolerated_inside_grace_window() {
        let start = Instant::now();
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = launched("general", start, &aborts);

        let outcome = reconcile(&mut state, false, start + Duration::from_secs(4), &timings(), || true);

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(state.is_running);
        assert!(state.launch_pending_since.is_some());
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_startup_timeout_fires_once() {
        let start = Instant::now();
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = launched("general", start, &aborts);

        let first = reconcile(&mut state, false, start + Duration::from_secs(5), &timings(), || true);
        assert_eq!(
            first,
            ReconcileOutcome::StartupTimedOut {
                strategy: Some("general".to_string())
            }
        );
        assert!(!state.is_running);
        assert!(state.running_strategy.is_none());
        assert!(state.launch_pending_since.is_none());
        assert!(state.shell.is_none());
        assert_eq!(aborts.load(Ordering::SeqCst), 1);

        for secs in 6..12 {
            let later = reconcile(&mut state, false, start + Duration::from_secs(secs), &timings(), || true);
            assert_eq!(later, ReconcileOutcome::Unchanged);
        }
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_present_worker_confirms_launch() {
        let start = Instant::now();
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = launched("general", start, &aborts);

        let outcome = reconcile(&mut state, true, start + Duration::from_secs(2), &timings(), || true);

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(state.launch_pending_since.is_none());
        assert!(state.shell.is_some());

        let late = reconcile(&mut state, true, start + Duration::from_secs(30), &timings(), || true);
        assert_eq!(late, ReconcileOutcome::Unchanged);
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_present_worker_at_expiry_falls_through() {
        let start = Instant::now();
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = launched("general", start, &aborts);

        let outcome = reconcile(&mut state, true, start + Duration::from_secs(9), &timings(), || true);

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(state.is_running);
        assert_eq!(state.running_strategy.as_deref(), Some("general"));
    }

    #[test]
    fn test_pending_mark_dropped_after_explicit_stop() {
        let start = Instant::now();
        let aborts = Arc::new(AtomicUsize::new(0));
        let mut state = launched("general", start, &aborts);
        state.user_stopped = true;
        state.is_running = false;

        let outcome = reconcile(&mut state, false, start + Duration::from_secs(10), &timings(), || true);

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(state.launch_pending_since.is_none());
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_external_worker_is_recovered() {
        let mut state = SupervisorState::default();

        let outcome = reconcile(&mut state, true, Instant::now(), &timings(), || true);

        assert_eq!(outcome, ReconcileOutcome::Recovered);
        assert!(state.is_running);
        assert!(state.running_strategy.is_none());
    }

    #[test]
    fn test_lost_after_user_stop_never_restarts() {
        let mut state = running("general");
        state.user_stopped = true;
        state.is_restarting = true;

        let outcome = reconcile(&mut state, false, Instant::now(), &timings(), || {
            panic!("auto-restart setting must not be consulted after an explicit stop")
        });

        assert_eq!(
            outcome,
            ReconcileOutcome::Lost {
                strategy: Some("general".to_string()),
                restart: false
            }
        );
        assert!(state.running_strategy.is_none());
        assert!(!state.is_restarting);
    }

    #[test]
    fn test_lost_with_auto_restart_disabled_resets_state() {
        let mut state = running("general");
        state.is_restarting = true;

        let outcome = reconcile(&mut state, false, Instant::now(), &timings(), || false);

        assert_eq!(
            outcome,
            ReconcileOutcome::Lost {
                strategy: Some("general".to_string()),
                restart: false
            }
        );
        assert!(!state.is_running);
        assert!(state.running_strategy.is_none());
        assert!(!state.is_restarting);
    }

    #[test]
    fn test_lost_with_auto_restart_requests_restart() {
        let mut state = running("general");

        let outcome = reconcile(&mut state, false, Instant::now(), &timings(), || true);

        assert_eq!(
            outcome,
            ReconcileOutcome::Lost {
                strategy: Some("general".to_string()),
                restart: true
            }
        );
        assert!(!state.is_running);
        assert_eq!(state.running_strategy.as_deref(), Some("general"));
    }

    #[test]
    fn test_lost_while_restarting_does_not_double_schedule() {
        let mut state = running("general");
        state.is_restarting = true;

        let outcome = reconcile(&mut state, false, Instant::now(), &timings(), || true);

        assert_eq!(
            outcome,
            ReconcileOutcome::Lost {
                strategy: Some("general".to_string()),
                restart: false
            }
        );
        assert!(state.is_restarting);
    }

    #[test]
    fn test_lost_external_worker_has_nothing_to_restart() {
        let mut state = SupervisorState {
            is_running: true,
            ..SupervisorState::default()
        };

        let outcome = reconcile(&mut state, false, Instant::now(), &timings(), || true);

        assert_eq!(
            outcome,
            ReconcileOutcome::Lost {
                strategy: None,
                restart: false
            }
        );
    }

    #[test]
    fn test_matching_state_is_unchanged() {
        let mut idle = SupervisorState::default();
        assert_eq!(
            reconcile(&mut idle, false, Instant::now(), &timings(), || true),
            ReconcileOutcome::Unchanged
        );

        let mut busy = running("general");
        assert_eq!(
            reconcile(&mut busy, true, Instant::now(), &timings(), || true),
            ReconcileOutcome::Unchanged
        );
    }
}
