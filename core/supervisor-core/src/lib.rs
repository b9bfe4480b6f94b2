//! # supervisor-core
//!
//! Launches `winws.exe` strategy scripts, watches the worker process and
//! brings it back when it dies unexpectedly.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. [`SupervisorRuntime`] runs the
//!   supervisor on its own thread when a caller wants one.
//! - **Not thread-safe**: [`Supervisor`] takes `&mut self`; callers provide their
//!   own synchronization or use the runtime actor.
//! - **Graceful degradation**: Missing directories and malformed settings return
//!   empty/default values, not errors.
//! - **User intent wins**: An explicit stop always beats the auto-restart
//!   setting, which always beats retrying.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use supervisor_core::{AppPaths, Supervisor, SupervisorRuntime};
//!
//! let supervisor = Supervisor::from_paths(&AppPaths::default())?;
//! let runtime = SupervisorRuntime::spawn(supervisor);
//! runtime.start("general")?;
//! println!("{:?}", runtime.status()?);
//! runtime.shutdown()?;
//! ```

// Public modules
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod launch;
pub mod monitor;
pub mod paths;
pub mod probe;
pub mod runtime;
pub mod state;
pub mod supervisor;

mod restart;

// Re-export commonly used items at crate root
pub use catalog::{is_service_script, Strategy, StrategyCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use error::{ConfigError, LaunchError, Result, SupervisorError};
pub use events::{EventRecord, EventSink, NullSink, SupervisorEvent};
pub use launch::{AbortOutcome, Launcher, ScriptLauncher, ShellHandle};
pub use monitor::ReconcileOutcome;
pub use paths::AppPaths;
pub use probe::{wait_for_worker_exit, KillReport, ProcessProbe, SysinfoProbe, WORKER_PROCESS_NAME};
pub use runtime::SupervisorRuntime;
pub use state::{SupervisorDiagnostics, SupervisorStatus};
pub use supervisor::Supervisor;
