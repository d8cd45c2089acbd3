//! Log writer module
//!
//! Provides thread-safe log writing to files or stdout/stderr.
//! Log files can be reopened at runtime (after rotation by an external tool).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use super::LogLevel;

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    /// Write to stdout
    Stdout,
    /// Write to stderr
    Stderr,
    /// Write to file
    File(File),
}

impl LogTarget {
    fn open(path: Option<&str>, fallback: fn() -> Self) -> io::Result<Self> {
        match path {
            Some(p) => Ok(Self::File(open_log_file(p)?)),
            None => Ok(fallback()),
        }
    }

    fn write_line(&mut self, message: &str) {
        match self {
            Self::Stdout => println!("{message}"),
            Self::Stderr => eprintln!("{message}"),
            Self::File(f) => {
                let _ = writeln!(f, "{message}");
            }
        }
    }
}

/// Thread-safe log writer
pub struct LogWriter {
    level: LogLevel,
    access_path: Option<String>,
    error_path: Option<String>,
    /// Access and info log target
    access: Mutex<LogTarget>,
    /// Error and warning log target
    error: Mutex<LogTarget>,
}

impl LogWriter {
    /// Create a new log writer with optional file paths
    fn new(
        level: LogLevel,
        access_log_file: Option<&str>,
        error_log_file: Option<&str>,
    ) -> io::Result<Self> {
        Ok(Self {
            level,
            access_path: access_log_file.map(ToString::to_string),
            error_path: error_log_file.map(ToString::to_string),
            access: Mutex::new(LogTarget::open(access_log_file, || LogTarget::Stdout)?),
            error: Mutex::new(LogTarget::open(error_log_file, || LogTarget::Stderr)?),
        })
    }

    pub const fn enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.level as u8
    }

    /// Write to access log (not subject to the level filter)
    pub fn write_access(&self, message: &str) {
        if let Ok(mut target) = self.access.lock() {
            target.write_line(message);
        }
    }

    /// Write to the error target if `level` passes the filter
    pub fn write_error(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        if let Ok(mut target) = self.error.lock() {
            target.write_line(message);
        }
    }

    /// Write to the access target if `level` passes the filter
    pub fn write_info(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        if let Ok(mut target) = self.access.lock() {
            target.write_line(message);
        }
    }

    /// Reopen both log files at their configured paths
    pub fn reopen(&self) -> io::Result<()> {
        let access = LogTarget::open(self.access_path.as_deref(), || LogTarget::Stdout)?;
        let error = LogTarget::open(self.error_path.as_deref(), || LogTarget::Stderr)?;
        if let Ok(mut target) = self.access.lock() {
            *target = access;
        }
        if let Ok(mut target) = self.error.lock() {
            *target = error;
        }
        Ok(())
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the global log writer
///
/// This should be called once at application startup.
/// Returns error if log files cannot be opened.
pub fn init(
    level: LogLevel,
    access_log_file: Option<&str>,
    error_log_file: Option<&str>,
) -> io::Result<()> {
    let writer = LogWriter::new(level, access_log_file, error_log_file)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if `init()` has run
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let writer = LogWriter::new(LogLevel::Warn, None, None).unwrap();
        assert!(writer.enabled(LogLevel::Error));
        assert!(writer.enabled(LogLevel::Warn));
        assert!(!writer.enabled(LogLevel::Info));
        assert!(!writer.enabled(LogLevel::Debug));
    }

    #[test]
    fn test_file_targets_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let access = tmp.path().join("logs/access.log");
        let error = tmp.path().join("logs/error.log");
        let access_str = access.to_string_lossy().to_string();
        let error_str = error.to_string_lossy().to_string();

        let writer =
            LogWriter::new(LogLevel::Info, Some(&access_str), Some(&error_str)).unwrap();
        writer.write_access("GET /healthz 200");
        writer.write_info(LogLevel::Debug, "filtered out");
        writer.write_error(LogLevel::Error, "[ERROR] boom");

        std::fs::rename(&access, tmp.path().join("logs/access.log.1")).unwrap();
        writer.reopen().unwrap();
        writer.write_access("after rotation");

        let rotated = std::fs::read_to_string(tmp.path().join("logs/access.log.1")).unwrap();
        assert!(rotated.contains("GET /healthz 200"));
        assert!(!rotated.contains("filtered out"));
        assert_eq!(std::fs::read_to_string(&access).unwrap(), "after rotation\n");
        assert!(std::fs::read_to_string(&error).unwrap().contains("boom"));
    }
}
