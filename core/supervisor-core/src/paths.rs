//! Path management for the supervisor.
//!
//! Everything lives beside the supervisor executable, matching the layout the
//! strategy bundle ships with:
//!
//! ```text
//! <base>/
//! ├── winws/              # strategy scripts + worker binary
//! └── app/
//!     ├── config/app.json # settings
//!     └── logs/           # rolling supervisor logs
//! ```
//!
//! `AppPaths::with_root()` exists so tests can point everything at a temp dir.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub const STRATEGY_DIR_NAME: &str = "winws";
const APP_DIR_NAME: &str = "app";
const CONFIG_DIR_NAME: &str = "config";
const FALLBACK_DIR_NAME: &str = "winws-supervisor";

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Base directory (default: directory of the running executable)
    root: PathBuf,
    /// Directory holding strategy scripts (default: <root>/winws)
    strategy_dir: PathBuf,
    /// Settings file (default: <root>/app/config/app.json)
    config_file: PathBuf,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::with_root(default_root())
    }
}

impl AppPaths {
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            strategy_dir: root.join(STRATEGY_DIR_NAME),
            config_file: root
                .join(APP_DIR_NAME)
                .join(CONFIG_DIR_NAME)
                .join("app.json"),
            root,
        }
    }

    pub fn with_strategy_dir(mut self, dir: PathBuf) -> Self {
        self.strategy_dir = dir;
        self
    }

    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = path;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn strategy_dir(&self) -> &Path {
        &self.strategy_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Logs go to `app/logs` when the settings file sits in the bundle's
    /// `app/config/` layout, otherwise into the settings file's own directory.
    pub fn log_dir(&self) -> PathBuf {
        let Some(config_dir) = self
            .config_file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        else {
            return self.root.join(APP_DIR_NAME).join("logs");
        };
        match config_dir.parent() {
            Some(app)
                if config_dir.file_name() == Some(OsStr::new(CONFIG_DIR_NAME))
                    && app.file_name() == Some(OsStr::new(APP_DIR_NAME)) =>
            {
                app.join("logs")
            }
            _ => config_dir.to_path_buf(),
        }
    }
}

/// Executable directory, then the per-user data dir, then the CWD.
fn default_root() -> PathBuf {
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        return dir;
    }
    dirs::data_local_dir()
        .map(|dir| dir.join(FALLBACK_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}
