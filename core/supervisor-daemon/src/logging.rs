//! Log setup for the runner.
//!
//! Everything goes to stderr and to a daily-rolling file in the log directory
//! next to the settings. `RUST_LOG` picks the filter; setting
//! `WINWS_SUPERVISOR_DEBUG_LOG` forces debug output.

use fs_err as fs;
use std::env;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "WINWS_SUPERVISOR_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "winws-supervisor.log";

/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process. `None` means file logging is unavailable.
pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = if debug_enabled(env::var(DEBUG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file_dir_error = fs::create_dir_all(log_dir).err();
    let (file_layer, guard) = if file_dir_error.is_none() {
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(err) = file_dir_error {
        tracing::warn!(path = %log_dir.display(), error = %err, "File logging disabled");
    }
    guard
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_accepts_truthy_values_only() {
        assert!(debug_enabled(Some("1")));
        assert!(debug_enabled(Some("yes")));
        assert!(!debug_enabled(Some("0")));
        assert!(!debug_enabled(Some("")));
        assert!(!debug_enabled(None));
    }
}
