//! Supervisor - the public facade over launch, liveness and restart logic.
//!
//! The supervisor is:
//! - **Synchronous**: every call runs to completion on the caller's thread
//! - **Single-owner**: methods take `&mut self`; callers that need sharing
//!   wrap it in [`crate::runtime::SupervisorRuntime`] or their own mutex
//! - **Tick-driven**: `tick()` must be called periodically (nominally 1s)
//!
//! ```rust,ignore
//! use supervisor_core::{AppPaths, Supervisor};
//!
//! let mut supervisor = Supervisor::from_paths(&AppPaths::default())?;
//! supervisor.start("general")?;
//! loop {
//!     supervisor.tick();
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//! }
//! ```

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{Strategy, StrategyCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::{
    ConfigStore, JsonConfigStore, SupervisorTimings, AUTO_RESTART_STRATEGY,
    AUTO_START_LAST_STRATEGY, CLOSE_WINWS_ON_EXIT, LAST_STRATEGY,
};
use crate::error::{LaunchError, Result, SupervisorError};
use crate::events::{EventRecord, EventSink, NullSink, SupervisorEvent};
use crate::launch::{Launcher, ScriptLauncher};
use crate::monitor::{reconcile, ReconcileOutcome};
use crate::paths::AppPaths;
use crate::probe::{KillReport, ProcessProbe, SysinfoProbe, WORKER_PROCESS_NAME};
use crate::restart::{decide, RestartDecision, RestartPolicy};
use crate::state::{SupervisorDiagnostics, SupervisorState, SupervisorStatus};

pub struct Supervisor {
    catalog: StrategyCatalog,
    probe: Box<dyn ProcessProbe>,
    launcher: Box<dyn Launcher>,
    config: Box<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    events: Box<dyn EventSink>,
    timings: SupervisorTimings,
    state: SupervisorState,
    restart: RestartPolicy,
    /// Liveness checks are skipped until this instant (set by explicit stop)
    ticks_paused_until: Option<Instant>,
}

impl Supervisor {
    /// Timings are read from the store once, here.
    pub fn new(
        catalog: StrategyCatalog,
        probe: Box<dyn ProcessProbe>,
        launcher: Box<dyn Launcher>,
        config: Box<dyn ConfigStore>,
    ) -> Self {
        let timings = SupervisorTimings::from_store(config.as_ref());
        Self {
            catalog,
            probe,
            launcher,
            config,
            clock: Arc::new(SystemClock),
            events: Box::new(NullSink),
            timings,
            state: SupervisorState::default(),
            restart: RestartPolicy::default(),
            ticks_paused_until: None,
        }
    }

    /// Production wiring: JSON settings, sysinfo probe, hidden script launcher.
    pub fn from_paths(paths: &AppPaths) -> Result<Self> {
        let config = JsonConfigStore::open(paths.config_file())?;
        let timings = SupervisorTimings::from_store(&config);
        let probe = SysinfoProbe::new(WORKER_PROCESS_NAME, timings.terminate_wait());
        Ok(Self::new(
            StrategyCatalog::new(paths.strategy_dir()),
            Box::new(probe),
            Box::new(ScriptLauncher),
            Box::new(config),
        ))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn with_timings(mut self, timings: SupervisorTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    pub fn timings(&self) -> &SupervisorTimings {
        &self.timings
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Public contract
    // ─────────────────────────────────────────────────────────────────────────

    /// Launches `name` from the catalog. Does not wait for the worker; a
    /// launch that never produces one is reported later by `tick()`.
    pub fn start(&mut self, name: &str) -> Result<()> {
        let strategy = self
            .catalog
            .resolve(name.trim())
            .ok_or(SupervisorError::NoStrategySelected)?;
        if !strategy.script.is_file() {
            return Err(SupervisorError::ScriptNotFound(strategy.script));
        }
        if self.state.is_running {
            if let Some(current) = &self.state.running_strategy {
                return Err(SupervisorError::AlreadyRunning {
                    strategy: current.clone(),
                });
            }
        }
        // Belief lags the process table until the first tick; look before
        // launching a second worker.
        if !strategy.is_service() && (self.state.is_running || self.probe.is_worker_running()) {
            if !self.state.is_running {
                self.state.is_running = true;
                tracing::info!("Worker process detected before launch; adopting it");
            }
            return Err(SupervisorError::WorkerAlreadyRunning);
        }

        self.restart.cancel();
        self.ticks_paused_until = None;
        self.launch(&strategy, false)
    }

    /// Explicit stop. Intent flags are committed before any process is
    /// touched so a concurrently queued tick can never read a half-stopped
    /// state and schedule a restart. Safe to call repeatedly.
    pub fn stop(&mut self) -> KillReport {
        self.stop_with(true)
    }

    /// Same as [`Self::stop`] without emitting events (application exit).
    pub fn stop_silently(&mut self) -> KillReport {
        self.stop_with(false)
    }

    pub fn status(&self) -> SupervisorStatus {
        self.state.status()
    }

    pub fn diagnostics(&self) -> SupervisorDiagnostics {
        SupervisorDiagnostics {
            user_stopped: self.state.user_stopped,
            is_restarting: self.state.is_restarting,
            launch_pending: self.state.launch_pending_since.is_some(),
            restart_pending: self.restart.is_pending(),
            has_shell: self.state.shell.is_some(),
        }
    }

    /// One liveness check. Runs any due restart first, then reconciles the
    /// believed state against the process table.
    pub fn tick(&mut self) -> ReconcileOutcome {
        let now = self.clock.now();

        if let Some(until) = self.ticks_paused_until {
            if now < until {
                return ReconcileOutcome::Unchanged;
            }
            self.ticks_paused_until = None;
        }

        if let Some(strategy) = self.restart.take_due(now, self.timings.restart_cooldown()) {
            self.run_restart(&strategy);
        }
        self.restart.expire_cooldown(&mut self.state, now);

        let worker_present = self.probe.is_worker_running();
        let config = &self.config;
        let outcome = reconcile(&mut self.state, worker_present, now, &self.timings, || {
            config.get_bool(AUTO_RESTART_STRATEGY, false)
        });

        match &outcome {
            ReconcileOutcome::Unchanged | ReconcileOutcome::Recovered => {}
            ReconcileOutcome::StartupTimedOut { strategy } => {
                if let Some(strategy) = strategy {
                    self.emit(SupervisorEvent::StartupTimeout {
                        strategy: strategy.clone(),
                    });
                }
            }
            ReconcileOutcome::Lost { strategy, restart } => {
                if self.state.user_stopped {
                    return outcome;
                }
                self.emit(SupervisorEvent::WorkerLost {
                    strategy: strategy.clone(),
                    restart_scheduled: *restart,
                });
                if let (true, Some(strategy)) = (*restart, strategy) {
                    let delay = self.timings.restart_delay();
                    self.restart
                        .schedule(&mut self.state, strategy.clone(), now, delay);
                    tracing::info!(strategy = %strategy, delay_ms = self.timings.restart_delay_ms, "Restart scheduled");
                    self.emit(SupervisorEvent::RestartScheduled {
                        strategy: strategy.clone(),
                        delay_ms: self.timings.restart_delay_ms,
                    });
                }
            }
        }

        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Application lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn last_strategy(&self) -> Option<String> {
        let last = self.config.get_string(LAST_STRATEGY, "");
        (!last.trim().is_empty()).then_some(last)
    }

    /// Starts the remembered strategy when `auto_start_last_strategy` is on.
    /// Returns whether a launch happened.
    pub fn resume_last_strategy(&mut self) -> Result<bool> {
        if !self.config.get_bool(AUTO_START_LAST_STRATEGY, false) {
            return Ok(false);
        }
        let Some(last) = self.last_strategy() else {
            return Ok(false);
        };
        if self.catalog.find(&last).is_none() {
            tracing::info!(strategy = %last, "Last strategy no longer in catalog; not resuming");
            return Ok(false);
        }
        if self.state.is_running {
            return Ok(false);
        }

        tracing::info!(strategy = %last, "Resuming last strategy");
        match self.start(&last) {
            Ok(()) => Ok(true),
            Err(SupervisorError::AlreadyRunning { .. } | SupervisorError::WorkerAlreadyRunning) => {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Exit hook: stops the worker when `close_winws_on_exit` is on.
    pub fn shutdown(&mut self) -> Option<KillReport> {
        if !self.config.get_bool(CLOSE_WINWS_ON_EXIT, true) {
            tracing::info!("Leaving worker running on exit");
            return None;
        }
        Some(self.stop_silently())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn launch(&mut self, strategy: &Strategy, restart: bool) -> Result<()> {
        let shell = self
            .launcher
            .launch(strategy)
            .map_err(|err| match err {
                LaunchError::ScriptNotFound(path) => SupervisorError::ScriptNotFound(path),
                source => SupervisorError::LaunchFailed {
                    strategy: strategy.name.clone(),
                    source,
                },
            })?;

        self.state.shell = Some(shell);
        self.state.running_strategy = Some(strategy.name.clone());
        self.state.user_stopped = false;
        self.state.is_restarting = false;
        self.restart.on_launched();

        if strategy.is_service() {
            self.state.launch_pending_since = None;
            tracing::info!(strategy = %strategy.name, "Service script launched; skipping worker checks");
        } else {
            self.state.is_running = true;
            self.state.launch_pending_since = Some(self.clock.now());
            if let Err(err) = self
                .config
                .set(LAST_STRATEGY, Value::String(strategy.name.clone()))
            {
                tracing::warn!(error = %err, "Failed to persist last strategy");
            }
        }

        self.emit(SupervisorEvent::Started {
            strategy: strategy.name.clone(),
            restart,
        });
        Ok(())
    }

    fn run_restart(&mut self, name: &str) {
        let resolved = self.catalog.find(name);
        let probe = &mut self.probe;
        match decide(&self.state, resolved, || probe.is_worker_running()) {
            RestartDecision::Launch(strategy) => {
                tracing::info!(strategy = %strategy.name, "Restarting strategy");
                if let Err(err) = self.launch(&strategy, true) {
                    tracing::warn!(strategy = %strategy.name, error = %err, "Restart launch failed");
                    self.state.running_strategy = None;
                    self.emit(SupervisorEvent::RestartFailed {
                        strategy: strategy.name,
                        reason: err.to_string(),
                    });
                }
            }
            RestartDecision::Abandon => {
                tracing::warn!(strategy = %name, "Strategy unavailable; restart abandoned");
                self.state.running_strategy = None;
                self.emit(SupervisorEvent::RestartAbandoned {
                    strategy: name.to_string(),
                });
            }
            RestartDecision::Skip => {
                tracing::debug!(strategy = %name, "Restart skipped after explicit stop");
            }
            RestartDecision::WorkerAlive => {
                tracing::info!(strategy = %name, "Worker is back; restart dropped");
                self.restart.cancel();
                self.state.is_restarting = false;
            }
        }
    }

    fn stop_with(&mut self, report: bool) -> KillReport {
        let was_active = self.state.is_running
            || self.state.running_strategy.is_some()
            || self.state.shell.is_some()
            || self.restart.is_pending();

        self.state.user_stopped = true;
        self.state.running_strategy = None;
        self.state.is_restarting = false;
        self.state.launch_pending_since = None;
        self.restart.cancel();

        let kill = self.probe.terminate_worker();
        if let Some(mut shell) = self.state.shell.take() {
            shell.abort(self.timings.shell_abort_wait());
        }
        self.state.is_running = false;
        self.ticks_paused_until = Some(self.clock.now() + self.timings.stop_debounce());

        if was_active || !kill.is_empty() {
            tracing::info!(killed = kill.killed, failed = kill.failed, "Worker stopped");
        }
        if report {
            if kill.failed > 0 {
                self.emit(SupervisorEvent::TerminateFailed {
                    survivors: kill.failed,
                });
            }
            if was_active || !kill.is_empty() {
                self.emit(SupervisorEvent::Stopped {
                    killed: kill.killed,
                });
            }
        }
        kill
    }

    fn emit(&self, event: SupervisorEvent) {
        self.events.emit(EventRecord::now(event));
    }
}
