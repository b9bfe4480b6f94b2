//! Settings consumed by the supervisor.
//!
//! The settings store belongs to whoever embeds the supervisor; the core only
//! reads a handful of keys and writes `last_strategy`. Two stores ship here:
//!
//! - [`JsonConfigStore`]: the `app.json` file, re-read on every access so edits
//!   made by other tools are picked up, merged over [`default_settings`].
//! - [`MemoryConfigStore`]: a plain map, for tests and embedding.
//!
//! Timing constants live in [`SupervisorTimings`]; the JSON store may override
//! them through an optional `timings` object.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const AUTO_RESTART_STRATEGY: &str = "auto_restart_strategy";
pub const AUTO_START_LAST_STRATEGY: &str = "auto_start_last_strategy";
pub const LAST_STRATEGY: &str = "last_strategy";
pub const CLOSE_WINWS_ON_EXIT: &str = "close_winws_on_exit";
pub const TIMINGS: &str = "timings";

pub fn default_settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert(AUTO_RESTART_STRATEGY.to_string(), Value::Bool(false));
    settings.insert(AUTO_START_LAST_STRATEGY.to_string(), Value::Bool(false));
    settings.insert(LAST_STRATEGY.to_string(), Value::String(String::new()));
    settings.insert(CLOSE_WINWS_ON_EXIT.to_string(), Value::Bool(true));
    settings
}

pub trait ConfigStore: Send {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError>;

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON file store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Opens the store, creating the file with defaults when it is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            store.save(&default_settings())?;
            tracing::info!(path = %store.path.display(), "Created settings file with defaults");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file and overlays it on the defaults. Unreadable or malformed
    /// files degrade to defaults.
    pub fn load(&self) -> Map<String, Value> {
        let mut settings = default_settings();
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Failed to read settings; using defaults");
                return settings;
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(stored)) => settings.extend(stored),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Settings file is not a JSON object; using defaults");
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Settings file malformed; using defaults");
            }
        }
        settings
    }

    fn save(&self, settings: &Map<String, Value>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let payload = serde_json::to_vec_pretty(settings).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload).map_err(|source| ConfigError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.load().remove(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut settings = self.load();
        settings.insert(key.to_string(), value);
        self.save(&settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    settings: Map<String, Value>,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self {
            settings: default_settings(),
        }
    }
}

impl MemoryConfigStore {
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.settings.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        self.settings.insert(key.to_string(), value);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timings
// ─────────────────────────────────────────────────────────────────────────────

/// Supervisor deadlines, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorTimings {
    /// How long a fresh launch may run without a visible worker
    pub grace_window_ms: u64,
    /// Delay between detecting an unexpected death and relaunching
    pub restart_delay_ms: u64,
    /// How long the restart-in-progress guard holds after a relaunch attempt
    pub restart_cooldown_ms: u64,
    /// Period of the liveness check
    pub tick_interval_ms: u64,
    /// Graceful wait before the launcher shell is force-killed
    pub shell_abort_wait_ms: u64,
    /// Graceful wait before surviving workers are force-killed
    pub terminate_wait_ms: u64,
    /// Liveness checks are suspended this long after an explicit stop
    pub stop_debounce_ms: u64,
    /// Delay before resuming the last strategy on startup
    pub auto_start_delay_ms: u64,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            grace_window_ms: 5_000,
            restart_delay_ms: 1_000,
            restart_cooldown_ms: 2_000,
            tick_interval_ms: 1_000,
            shell_abort_wait_ms: 2_000,
            terminate_wait_ms: 500,
            stop_debounce_ms: 2_000,
            auto_start_delay_ms: 1_000,
        }
    }
}

impl SupervisorTimings {
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let Some(value) = store.get(TIMINGS) else {
            return Self::default();
        };
        serde_json::from_value(value).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Invalid timings in settings; using defaults");
            Self::default()
        })
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_millis(self.restart_cooldown_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn shell_abort_wait(&self) -> Duration {
        Duration::from_millis(self.shell_abort_wait_ms)
    }

    pub fn terminate_wait(&self) -> Duration {
        Duration::from_millis(self.terminate_wait_ms)
    }

    pub fn stop_debounce(&self) -> Duration {
        Duration::from_millis(self.stop_debounce_ms)
    }

    pub fn auto_start_delay(&self) -> Duration {
        Duration::from_millis(self.auto_start_delay_ms)
    }
}
