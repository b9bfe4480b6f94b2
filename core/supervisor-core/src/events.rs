//! Conditions the supervisor reports asynchronously.
//!
//! `tick()` has no caller waiting on a result, so everything it detects is
//! pushed through an [`EventSink`]. Synchronous calls emit events too, which
//! keeps a single feed for whatever renders them (logs, tray balloons, ...).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// A strategy script was launched.
    Started { strategy: String, restart: bool },
    /// The worker never appeared within the grace window; the launch was aborted.
    StartupTimeout { strategy: String },
    /// The worker disappeared without an explicit stop.
    WorkerLost {
        strategy: Option<String>,
        restart_scheduled: bool,
    },
    /// A relaunch is queued.
    RestartScheduled { strategy: String, delay_ms: u64 },
    /// The relaunch could not spawn the script.
    RestartFailed { strategy: String, reason: String },
    /// The strategy vanished from the catalog before it could be relaunched.
    RestartAbandoned { strategy: String },
    /// An explicit stop finished.
    Stopped { killed: usize },
    /// Some worker processes survived the force-kill.
    TerminateFailed { survivors: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SupervisorEvent,
}

impl EventRecord {
    pub fn now(event: SupervisorEvent) -> Self {
        Self {
            recorded_at: Utc::now(),
            event,
        }
    }
}

pub trait EventSink: Send {
    fn emit(&self, record: EventRecord);
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _record: EventRecord) {}
}

impl EventSink for mpsc::Sender<EventRecord> {
    fn emit(&self, record: EventRecord) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(record);
    }
}
