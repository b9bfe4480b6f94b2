//! Strategy discovery.
//!
//! A strategy is a `.bat` script in the strategy directory; its name is the
//! file name without the extension. The listing is re-read on every call and
//! is always sorted by name. A missing directory is a valid, empty catalog.

use fs_err as fs;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const SCRIPT_EXTENSION: &str = "bat";

/// Scripts with this name prefix manage the bundle (install a Windows service,
/// check for updates) rather than launch the worker.
pub const SERVICE_SCRIPT_PREFIX: &str = "service";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strategy {
    pub name: String,
    pub script: PathBuf,
}

impl Strategy {
    pub fn is_service(&self) -> bool {
        is_service_script(&self.name)
    }
}

pub fn is_service_script(name: &str) -> bool {
    name.get(..SERVICE_SCRIPT_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SERVICE_SCRIPT_PREFIX))
}

#[derive(Debug, Clone)]
pub struct StrategyCatalog {
    dir: PathBuf,
}

impl StrategyCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn list(&self) -> Vec<Strategy> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(
                    dir = %self.dir.display(),
                    error = %err,
                    "Strategy directory unavailable; catalog is empty"
                );
                return Vec::new();
            }
        };

        let mut strategies: Vec<Strategy> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let is_script = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION));
                if !is_script {
                    return None;
                }
                let name = path.file_stem()?.to_str()?.to_string();
                Some(Strategy { name, script: path })
            })
            .collect();

        strategies.sort_by(|a, b| a.name.cmp(&b.name));
        strategies
    }

    pub fn find(&self, name: &str) -> Option<Strategy> {
        self.list().into_iter().find(|strategy| strategy.name == name)
    }

    /// Where the script for `name` would live, whether or not it exists.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{SCRIPT_EXTENSION}"))
    }

    /// Resolves a strategy name straight to its script without listing the
    /// directory. Returns `None` for names that are not plain file stems.
    pub fn resolve(&self, name: &str) -> Option<Strategy> {
        if !is_plain_name(name) {
            return None;
        }
        Some(Strategy {
            name: name.to_string(),
            script: self.script_path(name),
        })
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "@echo off\r\n").unwrap();
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let catalog = StrategyCatalog::new(temp.path().join("winws"));

        assert!(catalog.list().is_empty());
        assert!(catalog.find("general").is_none());
    }

    #[test]
    fn test_lists_bat_files_sorted_without_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "general (ALT).bat");
        touch(temp.path(), "discord.bat");
        touch(temp.path(), "general.BAT");
        touch(temp.path(), "readme.txt");
        touch(temp.path(), "winws.exe");
        std::fs::create_dir(temp.path().join("lists.bat")).unwrap();

        let names: Vec<String> = StrategyCatalog::new(temp.path())
            .list()
            .into_iter()
            .map(|strategy| strategy.name)
            .collect();

        assert_eq!(names, vec!["discord", "general", "general (ALT)"]);
    }

    #[test]
    fn test_find_returns_script_path() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "general.bat");
        let catalog = StrategyCatalog::new(temp.path());

        let strategy = catalog.find("general").unwrap();
        assert_eq!(strategy.script, temp.path().join("general.bat"));
        assert!(catalog.find("General").is_none());
    }

    #[test]
    fn test_service_prefix_is_case_insensitive() {
        assert!(is_service_script("service"));
        assert!(is_service_script("Service_install"));
        assert!(is_service_script("SERVICE remove"));
        assert!(!is_service_script("general"));
        assert!(!is_service_script("serv"));
        assert!(!is_service_script("my service"));
    }

    #[test]
    fn test_resolve_rejects_path_like_names() {
        let catalog = StrategyCatalog::new("/opt/winws");
        assert!(catalog.resolve("").is_none());
        assert!(catalog.resolve("   ").is_none());
        assert!(catalog.resolve("..").is_none());
        assert!(catalog.resolve("../evil").is_none());
        assert!(catalog.resolve("C:\\evil").is_none());

        let strategy = catalog.resolve("general").unwrap();
        assert_eq!(strategy.script, PathBuf::from("/opt/winws/general.bat"));
    }
}
