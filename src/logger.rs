use anyhow::Result;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Info => "",
            Level::Warn => "WARN: ",
            Level::Error => "ERROR: ",
        }
    }
}

/// Per-session log file. Lines are buffered in memory and written when the
/// session ends, unless streaming is enabled.
pub struct SessionLogger {
    pending: Mutex<Vec<String>>,
    log_path: PathBuf,
    app_name: String,
    streaming: bool,
}

impl SessionLogger {
    pub fn new(log_dir: PathBuf, app_name: &str, retention_count: usize, streaming: bool) -> Result<Self> {
        fs::create_dir_all(&log_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("{}_{}.log", app_name, timestamp));

        let logger = Self {
            pending: Mutex::new(Vec::new()),
            log_path,
            app_name: app_name.to_string(),
            streaming,
        };

        // The current session's file does not exist yet, so keep one slot free for it.
        prune_logs(&log_dir, app_name, retention_count.saturating_sub(1))?;
        logger.write(Level::Info, format!("=== {} Session Started ===", app_name));

        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn write(&self, level: Level, message: impl AsRef<str>) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{}] {}{}", timestamp, level.prefix(), message.as_ref());

        if self.streaming {
            println!("{}", line);
            let _ = self.append_lines(std::slice::from_ref(&line));
        } else {
            self.pending.lock().push(line);
        }
    }

    fn append_lines(&self, lines: &[String]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn flush_to_disk(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(());
        }
        self.append_lines(&pending)?;
        pending.clear();
        Ok(())
    }

    pub fn finalize(&self) -> Result<()> {
        self.write(Level::Info, format!("=== {} Session Ended ===", self.app_name));
        self.flush_to_disk()
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        let _ = self.flush_to_disk();
    }
}

/// Deletes all but the newest `keep` session files of `app_name` in `dir`.
pub fn prune_logs(dir: &Path, app_name: &str, keep: usize) -> Result<()> {
    let prefix = format!("{}_", app_name);
    let mut sessions: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("log") {
                continue;
            }
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                sessions.push((path, modified));
            }
        }
    }

    sessions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    for (path, _) in sessions.iter().skip(keep) {
        let _ = fs::remove_file(path);
    }

    Ok(())
}

static LOGGER: once_cell::sync::OnceCell<SessionLogger> = once_cell::sync::OnceCell::new();

pub fn init_logger(log_dir: PathBuf, app_name: &str, retention_count: usize, streaming: bool) -> Result<()> {
    let logger = SessionLogger::new(log_dir, app_name, retention_count, streaming)?;
    LOGGER.set(logger).map_err(|_| anyhow::anyhow!("Logger already initialized"))?;
    Ok(())
}

/// No-op until [`init_logger`] has run.
pub fn log(level: Level, message: impl AsRef<str>) {
    if let Some(logger) = LOGGER.get() {
        logger.write(level, message);
    }
}

pub fn flush_logs() -> Result<()> {
    if let Some(logger) = LOGGER.get() {
        logger.flush_to_disk()?;
    }
    Ok(())
}

pub fn finalize_logs() -> Result<()> {
    if let Some(logger) = LOGGER.get() {
        logger.finalize()?;
    }
    Ok(())
}

pub fn get_log_path() -> Option<PathBuf> {
    LOGGER.get().map(|logger| logger.path().to_path_buf())
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Info, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Warn, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Error, format!($($arg)*))
    };
}
