//! Worker process inspection.
//!
//! The worker is identified by executable name alone. The process table is
//! re-read on every call; entries that vanish mid-scan or cannot be inspected
//! simply do not match.

use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, Signal, System};

pub const WORKER_PROCESS_NAME: &str = "winws.exe";

pub trait ProcessProbe: Send {
    fn is_worker_running(&mut self) -> bool;

    /// Graceful termination for every match, then force-kill for survivors.
    fn terminate_worker(&mut self) -> KillReport;
}

/// Outcome of [`ProcessProbe::terminate_worker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KillReport {
    /// Matches that are gone (terminated or force-killed)
    pub killed: usize,
    /// Matches that refused even the force-kill
    pub failed: usize,
}

impl KillReport {
    /// Nothing matched, so there was nothing to stop.
    pub fn is_empty(&self) -> bool {
        self.killed == 0 && self.failed == 0
    }
}

/// Compares process names case-insensitively, ignoring an `.exe` suffix on
/// either side so the same name works on every platform.
pub fn matches_worker_name(candidate: &str, worker: &str) -> bool {
    let candidate = strip_exe(candidate);
    !candidate.is_empty() && candidate.eq_ignore_ascii_case(strip_exe(worker))
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

pub struct SysinfoProbe {
    worker_name: String,
    terminate_wait: Duration,
    system: System,
}

impl SysinfoProbe {
    pub fn new(worker_name: impl Into<String>, terminate_wait: Duration) -> Self {
        Self {
            worker_name: worker_name.into(),
            terminate_wait,
            system: System::new(),
        }
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    fn matching_pids(&mut self) -> Vec<Pid> {
        self.system.refresh_processes();
        self.system
            .processes()
            .iter()
            .filter(|(_, process)| matches_worker_name(process.name(), &self.worker_name))
            .map(|(pid, _)| *pid)
            .collect()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn is_worker_running(&mut self) -> bool {
        !self.matching_pids().is_empty()
    }

    fn terminate_worker(&mut self) -> KillReport {
        let targets = self.matching_pids();
        if targets.is_empty() {
            tracing::debug!(worker = %self.worker_name, "No worker processes to stop");
            return KillReport::default();
        }

        // Signal::Term is unsupported on Windows; kill_with returns None there.
        let signalled = targets
            .iter()
            .filter_map(|pid| self.system.process(*pid))
            .filter(|process| process.kill_with(Signal::Term).unwrap_or(false))
            .count();
        if signalled > 0 {
            thread::sleep(self.terminate_wait);
        }

        let survivors: Vec<Pid> = self
            .matching_pids()
            .into_iter()
            .filter(|pid| targets.contains(pid))
            .collect();
        let failed = survivors
            .iter()
            .filter(|pid| {
                self.system
                    .process(**pid)
                    .map(|process| !process.kill())
                    .unwrap_or(false)
            })
            .count();

        let report = KillReport {
            killed: targets.len() - failed,
            failed,
        };
        tracing::info!(
            worker = %self.worker_name,
            matched = targets.len(),
            signalled,
            force_killed = survivors.len() - failed,
            failed,
            "Worker termination finished"
        );
        report
    }
}

/// Polls until the worker is gone. Returns `true` if it disappeared in time.
pub fn wait_for_worker_exit(
    probe: &mut dyn ProcessProbe,
    timeout: Duration,
    poll: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !probe.is_worker_running() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(poll);
    }
}
