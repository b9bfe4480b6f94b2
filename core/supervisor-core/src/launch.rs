//! Strategy script launching.
//!
//! A launch spawns the *shell* that runs the script, not the worker itself.
//! Whether the worker actually came up is decided later by the liveness
//! monitor; the shell handle is only kept so a launch that never produced a
//! worker can be torn down.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, Signal, System};

use crate::catalog::Strategy;
use crate::error::LaunchError;

const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    /// The shell had already finished on its own
    AlreadyExited,
    /// The shell honoured the graceful request within the wait
    Terminated,
    /// The shell had to be force-killed
    Killed,
}

pub trait ShellHandle: Send + fmt::Debug {
    fn id(&self) -> u32;

    /// Graceful termination first, force-kill once `wait` runs out.
    fn abort(&mut self, wait: Duration) -> AbortOutcome;
}

pub trait Launcher: Send {
    fn launch(&mut self, strategy: &Strategy) -> Result<Box<dyn ShellHandle>, LaunchError>;
}

/// Runs strategy scripts hidden, with the strategy directory as CWD.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptLauncher;

impl Launcher for ScriptLauncher {
    fn launch(&mut self, strategy: &Strategy) -> Result<Box<dyn ShellHandle>, LaunchError> {
        if !strategy.script.is_file() {
            return Err(LaunchError::ScriptNotFound(strategy.script.clone()));
        }

        let script = absolutize(&strategy.script);
        let work_dir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut command = shell_command(&script);
        command
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            path: script.clone(),
            source,
        })?;

        tracing::info!(
            strategy = %strategy.name,
            script = %script.display(),
            shell_pid = child.id(),
            "Strategy script launched"
        );

        Ok(Box::new(ShellProcess::new(child)))
    }
}

#[cfg(windows)]
fn shell_command(script: &Path) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut command = Command::new("cmd.exe");
    command.arg("/c").arg(script).creation_flags(CREATE_NO_WINDOW);
    command
}

#[cfg(not(windows))]
fn shell_command(script: &Path) -> Command {
    let mut command = Command::new("sh");
    command.arg(script);
    command
}

// cmd.exe does not accept the \\?\ prefix that canonicalize() produces on Windows.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

pub struct ShellProcess {
    pid: u32,
    /// Taken by `Drop` so a still-running shell can be reaped off-thread.
    child: Option<Child>,
}

impl fmt::Debug for ShellProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellProcess")
            .field("pid", &self.pid)
            .finish()
    }
}

impl ShellProcess {
    fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
        }
    }

    fn has_exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => true,
        }
    }

    fn wait_for_exit(&mut self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            if self.has_exited() {
                return true;
            }
            thread::sleep(ABORT_POLL_INTERVAL.min(wait));
        }
        self.has_exited()
    }
}

impl ShellHandle for ShellProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn abort(&mut self, wait: Duration) -> AbortOutcome {
        if self.has_exited() {
            return AbortOutcome::AlreadyExited;
        }

        if request_graceful_exit(self.pid) && self.wait_for_exit(wait) {
            tracing::debug!(shell_pid = self.pid, "Launcher shell terminated");
            return AbortOutcome::Terminated;
        }

        if let Some(child) = self.child.as_mut() {
            if let Err(err) = child.kill() {
                tracing::warn!(shell_pid = self.pid, error = %err, "Failed to kill launcher shell");
            }
            let _ = child.wait();
        }
        tracing::debug!(shell_pid = self.pid, "Launcher shell force-killed");
        AbortOutcome::Killed
    }
}

impl Drop for ShellProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        // The shell may legitimately outlive its handle (service scripts);
        // wait for it elsewhere so it is reaped without being killed.
        let pid = self.pid;
        let spawned = thread::Builder::new()
            .name(format!("shell-reaper-{pid}"))
            .spawn(move || {
                let _ = child.wait();
                tracing::debug!(shell_pid = pid, "Launcher shell reaped");
            });
        if let Err(err) = spawned {
            tracing::warn!(shell_pid = pid, error = %err, "Failed to spawn shell reaper");
        }
    }
}

fn request_graceful_exit(pid: u32) -> bool {
    let mut system = System::new();
    let pid = Pid::from_u32(pid);
    if !system.refresh_process(pid) {
        return false;
    }
    system
        .process(pid)
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_script_is_reported() {
        let temp = TempDir::new().unwrap();
        let strategy = Strategy {
            name: "general".to_string(),
            script: temp.path().join("general.bat"),
        };

        let err = ScriptLauncher.launch(&strategy).unwrap_err();
        assert!(matches!(err, LaunchError::ScriptNotFound(path) if path == strategy.script));
    }

    #[test]
    fn test_absolutize_keeps_absolute_paths() {
        let temp = TempDir::new().unwrap();
        assert_eq!(absolutize(temp.path()), temp.path());
        assert!(absolutize(Path::new("winws/general.bat")).is_absolute());
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_terminates_long_running_shell() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("general.bat");
        std::fs::write(&script, "exec sleep 30\n").unwrap();
        let strategy = Strategy {
            name: "general".to_string(),
            script,
        };

        let mut shell = ScriptLauncher.launch(&strategy).unwrap();
        let started = Instant::now();
        let outcome = shell.abort(Duration::from_secs(2));

        assert!(matches!(
            outcome,
            AbortOutcome::Terminated | AbortOutcome::Killed
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_after_exit_is_noop() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("quick.bat");
        std::fs::write(&script, "exit 0\n").unwrap();
        let strategy = Strategy {
            name: "quick".to_string(),
            script,
        };

        let mut shell = ScriptLauncher.launch(&strategy).unwrap();
        thread::sleep(Duration::from_millis(500));

        assert_eq!(shell.abort(Duration::from_secs(1)), AbortOutcome::AlreadyExited);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dropped_running_shell_is_reaped() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("slow.bat");
        std::fs::write(&script, "exec sleep 0.3\n").unwrap();
        let strategy = Strategy {
            name: "slow".to_string(),
            script,
        };

        let shell = ScriptLauncher.launch(&strategy).unwrap();
        let proc_entry = PathBuf::from(format!("/proc/{}", shell.id()));
        let started = Instant::now();
        drop(shell);
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(proc_entry.exists());

        // A zombie keeps its /proc entry until someone waits on it.
        let deadline = Instant::now() + Duration::from_secs(5);
        while proc_entry.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(!proc_entry.exists());
    }
}
