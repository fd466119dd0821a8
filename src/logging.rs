//! Logging setup using `tracing` and `tracing-subscriber`
//!
//! Logs go to stderr and, unless disabled, to a file under the user's local
//! data directory. Levels:
//! - `error`: dispatch failures
//! - `warn`: degraded collaborators (icons, windows, triggers)
//! - `info`: menu open/close, mode switches, selections
//! - `debug`: discarded stale events, lookups, timing decisions
//!
//! `PIE_DEBUG=1` (or `-v`) raises the crate to `debug`; `RUST_LOG` overrides
//! everything.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::APP_DIR;

/// Log files older than this are removed at startup
const LOG_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const LOG_FILE_NAME: &str = "pie-menu.log";

/// How logging should be set up
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// Also write to this file (no ANSI colors)
    pub log_file: Option<PathBuf>,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_file: None,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Level from `-v` count and the `PIE_DEBUG` environment variable
    pub fn from_verbosity(verbosity: u8) -> Self {
        let debug_env = std::env::var("PIE_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let level = match (verbosity, debug_env) {
            (0, false) => Level::INFO,
            (0 | 1, _) => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }
}

/// Directory holding log files
pub fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("logs"))
}

/// Default log file, creating its directory and pruning old logs
pub fn default_log_file() -> Option<PathBuf> {
    let dir = log_dir()?;
    if let Err(e) = fs::create_dir_all(&dir) {
        eprintln!("Cannot create log directory {:?}: {}", dir, e);
        return None;
    }
    if let Err(e) = remove_old_logs(&dir, LOG_RETENTION) {
        eprintln!("Cannot prune old logs in {:?}: {}", dir, e);
    }
    Some(dir.join(LOG_FILE_NAME))
}

/// Delete `*.log` files in `dir` not modified within `max_age`
///
/// Returns the number of files removed.
pub fn remove_old_logs(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Install the global subscriber; call once at startup
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(false);

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(SharedFileWriter::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// `RUST_LOG` if set, else our crate at `level` and dependencies at warn
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!("warn,pie_menu={level}"))
    })
}

#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

struct SharedFileGuard {
    file: Arc<Mutex<File>>,
}

impl Write for SharedFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            file: Arc::clone(&self.file),
        }
    }
}
