//! Logger module
//!
//! Provides logging utilities for the relay including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Upload, delegation and output events
//! - File-based logging with reopen on demand

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::relay::EffectSettings;

/// Severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config
        .logging
        .level
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    writer::init(
        level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Reopen log files, e.g. after logrotate moved them
pub fn reopen() {
    if let Some(w) = writer::get() {
        match w.reopen() {
            Ok(()) => log_info("Log files reopened"),
            Err(e) => log_error(&format!("Failed to reopen log files: {e}")),
        }
    }
}

fn write_info(level: LogLevel, message: &str) {
    match writer::get() {
        Some(w) => w.write_info(level, message),
        None => println!("{message}"),
    }
}

fn write_error(level: LogLevel, message: &str) {
    match writer::get() {
        Some(w) => w.write_error(level, message),
        None => eprintln!("{message}"),
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info(LogLevel::Info, "======================================");
    write_info(LogLevel::Info, "Dotted video relay started");
    write_info(LogLevel::Info, &format!("Listening on: http://{addr}"));
    write_info(LogLevel::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(LogLevel::Info, &format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(LogLevel::Info, &format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(LogLevel::Info, &format!("Error log: {path}"));
    }
    write_info(LogLevel::Info, &format!("Model: {}", config.model.model));
    write_info(
        LogLevel::Info,
        &format!(
            "Outputs: {} (served at {})",
            config.storage.output_dir, config.storage.public_path
        ),
    );
    write_info(LogLevel::Info, "======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(
        LogLevel::Debug,
        &format!("[Connection] Accepted from: {peer_addr}"),
    );
}

pub fn log_connection_rejected(peer_addr: &SocketAddr, limit: u64) {
    write_error(
        LogLevel::Warn,
        &format!("[WARN] [Connection] Rejected {peer_addr}: limit of {limit} reached"),
    );
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(
        LogLevel::Error,
        &format!("[ERROR] Failed to serve connection: {err:?}"),
    );
}

pub fn log_error(message: &str) {
    write_error(LogLevel::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(LogLevel::Warn, &format!("[WARN] {message}"));
}

pub fn log_info(message: &str) {
    write_info(LogLevel::Info, message);
}

pub fn log_debug(message: &str) {
    write_info(LogLevel::Debug, &format!("[DEBUG] {message}"));
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        write_info(LogLevel::Info, &format!("[Headers] Count: {count}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_upload_staged(path: &Path, bytes: usize) {
    write_info(
        LogLevel::Debug,
        &format!("[Upload] Staged {bytes} bytes at {}", path.display()),
    );
}

pub fn log_staging_released(path: &Path) {
    write_info(
        LogLevel::Debug,
        &format!("[Upload] Removed {}", path.display()),
    );
}

pub fn log_delegation_started(settings: &EffectSettings) {
    write_info(
        LogLevel::Info,
        &format!(
            "[Model] Applying dotted effect (dot_size={}, threshold={}, inverse={})",
            settings.dot_size, settings.threshold, settings.inverse
        ),
    );
}

pub fn log_delegation_finished(elapsed: Duration, bytes: usize) {
    write_info(
        LogLevel::Info,
        &format!(
            "[Model] Finished in {:.1}s, {bytes} bytes returned",
            elapsed.as_secs_f64()
        ),
    );
}

pub fn log_artifact_persisted(path: &Path, bytes: usize) {
    write_info(
        LogLevel::Info,
        &format!("[Output] Wrote {bytes} bytes to {}", path.display()),
    );
}

pub fn log_generate_failed(message: &str) {
    write_error(LogLevel::Error, &format!("[ERROR] [Generate] {message}"));
}

pub fn log_shutdown_started(in_flight: usize, grace: Duration) {
    write_info(
        LogLevel::Info,
        &format!(
            "\n[Shutdown] Stopped accepting; waiting up to {}s for {in_flight} connection(s)",
            grace.as_secs()
        ),
    );
}

pub fn log_shutdown_forced(remaining: usize) {
    log_warning(&format!(
        "[Shutdown] Grace period elapsed, cancelling {remaining} in-flight request(s)"
    ));
}

pub fn log_shutdown_complete() {
    write_info(LogLevel::Info, "[Shutdown] Complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("verbose".parse::<LogLevel>().is_err());
        assert!(LogLevel::Error < LogLevel::Debug);
    }
}
