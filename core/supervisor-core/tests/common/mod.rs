//! Shared fakes for supervisor integration tests.
//!
//! A [`FakeWorld`] stands in for the OS: it holds whether the worker is in the
//! process table and records every launch, abort and terminate request.

#![allow(dead_code)]

use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use supervisor_core::{
    AbortOutcome, EventRecord, KillReport, LaunchError, Launcher, ManualClock, MemoryConfigStore,
    ProcessProbe, ReconcileOutcome, ShellHandle, Strategy, StrategyCatalog, Supervisor,
    SupervisorEvent,
};
use tempfile::TempDir;

#[derive(Debug, Default)]
pub struct WorldState {
    pub worker_present: bool,
    /// Worker survives terminate requests
    pub stubborn_worker: bool,
    /// Every launch fails to spawn
    pub fail_launches: bool,
    pub launches: Vec<String>,
    pub shell_aborts: usize,
    pub terminate_calls: usize,
    pub probe_checks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeWorld(Arc<Mutex<WorldState>>);

impl FakeWorld {
    pub fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.0.lock().unwrap()
    }

    pub fn set_worker(&self, present: bool) {
        self.lock().worker_present = present;
    }

    pub fn launches(&self) -> Vec<String> {
        self.lock().launches.clone()
    }

    pub fn shell_aborts(&self) -> usize {
        self.lock().shell_aborts
    }
}

pub struct FakeProbe(pub FakeWorld);

impl ProcessProbe for FakeProbe {
    fn is_worker_running(&mut self) -> bool {
        let mut world = self.0.lock();
        world.probe_checks += 1;
        world.worker_present
    }

    fn terminate_worker(&mut self) -> KillReport {
        let mut world = self.0.lock();
        world.terminate_calls += 1;
        if !world.worker_present {
            return KillReport::default();
        }
        if world.stubborn_worker {
            return KillReport {
                killed: 0,
                failed: 1,
            };
        }
        world.worker_present = false;
        KillReport {
            killed: 1,
            failed: 0,
        }
    }
}

pub struct FakeLauncher(pub FakeWorld);

impl Launcher for FakeLauncher {
    fn launch(&mut self, strategy: &Strategy) -> Result<Box<dyn ShellHandle>, LaunchError> {
        let mut world = self.0.lock();
        if world.fail_launches {
            return Err(LaunchError::Spawn {
                path: strategy.script.clone(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
            });
        }
        world.launches.push(strategy.name.clone());
        let id = world.launches.len() as u32;
        Ok(Box::new(FakeShell {
            world: self.0.clone(),
            id,
        }))
    }
}

#[derive(Debug)]
pub struct FakeShell {
    world: FakeWorld,
    id: u32,
}

impl ShellHandle for FakeShell {
    fn id(&self) -> u32 {
        self.id
    }

    fn abort(&mut self, _wait: Duration) -> AbortOutcome {
        self.world.lock().shell_aborts += 1;
        AbortOutcome::Killed
    }
}

/// A supervisor wired to fakes, a manual clock and a channel sink.
pub struct Harness {
    pub supervisor: Supervisor,
    pub world: FakeWorld,
    pub clock: Arc<ManualClock>,
    pub events: Receiver<EventRecord>,
    pub dir: TempDir,
}

pub const STRATEGIES: &[&str] = &["A", "B", "general", "service_install"];

impl Harness {
    pub fn new(config: MemoryConfigStore) -> Self {
        let dir = TempDir::new().unwrap();
        for name in STRATEGIES {
            std::fs::write(dir.path().join(format!("{name}.bat")), "@echo off\n").unwrap();
        }

        let world = FakeWorld::default();
        let clock = Arc::new(ManualClock::new());
        let (tx, events) = mpsc::channel();

        let supervisor = Supervisor::new(
            StrategyCatalog::new(dir.path()),
            Box::new(FakeProbe(world.clone())),
            Box::new(FakeLauncher(world.clone())),
            Box::new(config),
        )
        .with_clock(clock.clone())
        .with_event_sink(Box::new(tx));

        Self {
            supervisor,
            world,
            clock,
            events,
            dir,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    /// Advances one nominal tick interval and ticks.
    pub fn step(&mut self) -> ReconcileOutcome {
        self.advance_ms(1_000);
        self.supervisor.tick()
    }

    pub fn drain_events(&self) -> Vec<SupervisorEvent> {
        self.events.try_iter().map(|record| record.event).collect()
    }
}

pub fn auto_restart() -> MemoryConfigStore {
    MemoryConfigStore::default().with(supervisor_core::AUTO_RESTART_STRATEGY, true)
}
