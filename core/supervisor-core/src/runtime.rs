//! Actor thread that owns a [`Supervisor`].
//!
//! The thread is the only place the supervisor is mutated. Commands arrive
//! over a channel and are served in order; between commands the thread ticks
//! the supervisor every `tick_interval`. A queued `stop` therefore can never
//! interleave with a tick half-way through.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Result, SupervisorError};
use crate::monitor::ReconcileOutcome;
use crate::probe::KillReport;
use crate::state::{SupervisorDiagnostics, SupervisorStatus};
use crate::supervisor::Supervisor;

enum Command {
    Start {
        name: String,
        reply: Sender<Result<()>>,
    },
    Stop {
        reply: Sender<KillReport>,
    },
    Status {
        reply: Sender<SupervisorStatus>,
    },
    Diagnostics {
        reply: Sender<SupervisorDiagnostics>,
    },
    ResumeLast {
        reply: Sender<Result<bool>>,
    },
    Tick {
        reply: Sender<ReconcileOutcome>,
    },
    Shutdown {
        reply: Option<Sender<Option<KillReport>>>,
    },
    Dismiss,
}

/// Handle to the supervisor thread. Dropping it shuts the thread down.
pub struct SupervisorRuntime {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorRuntime {
    pub fn spawn(supervisor: Supervisor) -> Self {
        let (commands, inbox) = mpsc::channel();
        let thread = thread::spawn(move || run(supervisor, inbox));
        Self {
            commands,
            thread: Some(thread),
        }
    }

    pub fn start(&self, name: &str) -> Result<()> {
        self.request(|reply| Command::Start {
            name: name.to_string(),
            reply,
        })?
    }

    pub fn stop(&self) -> Result<KillReport> {
        self.request(|reply| Command::Stop { reply })
    }

    pub fn status(&self) -> Result<SupervisorStatus> {
        self.request(|reply| Command::Status { reply })
    }

    pub fn diagnostics(&self) -> Result<SupervisorDiagnostics> {
        self.request(|reply| Command::Diagnostics { reply })
    }

    pub fn resume_last_strategy(&self) -> Result<bool> {
        self.request(|reply| Command::ResumeLast { reply })?
    }

    /// Runs a liveness check now instead of waiting for the interval.
    pub fn tick(&self) -> Result<ReconcileOutcome> {
        self.request(|reply| Command::Tick { reply })
    }

    /// Runs the exit stop (subject to `close_winws_on_exit`) and joins the thread.
    pub fn shutdown(mut self) -> Result<Option<KillReport>> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(Command::Shutdown { reply: Some(reply) })
            .map_err(|_| SupervisorError::RuntimeStopped)?;
        let report = response.recv().map_err(|_| SupervisorError::RuntimeStopped)?;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Supervisor thread panicked");
            }
        }
        Ok(report)
    }

    /// Ends the thread without the exit stop. For callers that never launched
    /// anything and must leave a worker owned by someone else alone.
    pub fn dismiss(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Dismiss);
            if thread.join().is_err() {
                tracing::error!("Supervisor thread panicked");
            }
        }
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| SupervisorError::RuntimeStopped)?;
        response.recv().map_err(|_| SupervisorError::RuntimeStopped)
    }
}

impl Drop for SupervisorRuntime {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown { reply: None });
            let _ = thread.join();
        }
    }
}

fn run(mut supervisor: Supervisor, inbox: Receiver<Command>) {
    let interval = supervisor
        .timings()
        .tick_interval()
        .max(Duration::from_millis(10));
    let mut next_tick = Instant::now() + interval;
    tracing::debug!(interval_ms = interval.as_millis() as u64, "Supervisor thread started");

    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        let command = match inbox.recv_timeout(timeout) {
            Ok(command) => command,
            Err(RecvTimeoutError::Timeout) => {
                supervisor.tick();
                next_tick = advance(next_tick, interval);
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                supervisor.shutdown();
                break;
            }
        };

        match command {
            Command::Start { name, reply } => {
                let _ = reply.send(supervisor.start(&name));
            }
            Command::Stop { reply } => {
                let _ = reply.send(supervisor.stop());
            }
            Command::Status { reply } => {
                let _ = reply.send(supervisor.status());
            }
            Command::Diagnostics { reply } => {
                let _ = reply.send(supervisor.diagnostics());
            }
            Command::ResumeLast { reply } => {
                let _ = reply.send(supervisor.resume_last_strategy());
            }
            Command::Tick { reply } => {
                let _ = reply.send(supervisor.tick());
                next_tick = Instant::now() + interval;
            }
            Command::Shutdown { reply } => {
                let report = supervisor.shutdown();
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
                break;
            }
            Command::Dismiss => {
                tracing::debug!("Supervisor dismissed without exit stop");
                break;
            }
        }

        // A busy command stream must not starve liveness checks.
        if Instant::now() >= next_tick {
            supervisor.tick();
            next_tick = advance(next_tick, interval);
        }
    }

    tracing::debug!("Supervisor thread stopped");
}

/// Next deadline after a tick; resyncs instead of bursting when behind.
fn advance(next_tick: Instant, interval: Duration) -> Instant {
    let next = next_tick + interval;
    let now = Instant::now();
    if next <= now {
        now + interval
    } else {
        next
    }
}
