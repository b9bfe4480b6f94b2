//! Error types for supervisor-core operations.
//!
//! Only synchronous calls return these. Conditions detected while ticking are
//! reported as [`crate::events::SupervisorEvent`]s instead.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Launch Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures while spawning a strategy script.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Strategy script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Failed to spawn strategy script {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Settings Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures while reading or writing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings I/O error: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings serialization failed: {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Supervisor Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors returned by the supervisor facade and its runtime handle.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    // ─────────────────────────────────────────────────────────────────────
    // Caller input
    // ─────────────────────────────────────────────────────────────────────
    #[error("No strategy selected")]
    NoStrategySelected,

    #[error("Strategy script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Strategy {strategy} is already running")]
    AlreadyRunning { strategy: String },

    #[error("A winws worker is already running")]
    WorkerAlreadyRunning,

    // ─────────────────────────────────────────────────────────────────────
    // Process creation
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to launch strategy {strategy}: {source}")]
    LaunchFailed {
        strategy: String,
        #[source]
        source: LaunchError,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Environment
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Supervisor runtime is no longer running")]
    RuntimeStopped,
}

/// Convenience type alias for Results using SupervisorError.
pub type Result<T> = std::result::Result<T, SupervisorError>;

impl From<SupervisorError> for String {
    fn from(err: SupervisorError) -> String {
        err.to_string()
    }
}
