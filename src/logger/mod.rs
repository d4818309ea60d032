//! Logger module
//!
//! Provides logging utilities for the file server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Transfer progress and completion logging
//! - Error and warning logging

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::LogLevel;

use crate::config::Config;
use std::net::SocketAddr;
use std::path::Path;

/// Initialize the logger with configuration
///
/// Should be called once at application startup. An unknown
/// `logging.level` is rejected.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
        config.logging.level.parse()?,
    )
}

/// Whether lines of `level` are written; `info` until the writer is set up
fn enabled(level: LogLevel) -> bool {
    writer::get().map_or(level >= LogLevel::Info, |w| w.enabled(level))
}

/// Write to info/access log
fn write_info(message: &str) {
    if !enabled(LogLevel::Info) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write a warning to the error log
fn write_warning(message: &str) {
    if enabled(LogLevel::Warn) {
        write_error(message);
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, base_dir: &Path, config: &Config) {
    let scheme = if config.tls.is_enabled() { "https" } else { "http" };
    write_info("======================================");
    write_info("DOSE file server started");
    write_info(&format!("Listening on: {scheme}://{addr}"));
    write_info(&format!("Base download folder: {}", base_dir.display()));
    if config.etag.enabled {
        if config.etag.kind.eq_ignore_ascii_case("strong") {
            write_info(&format!("ETag: strong ({})", config.etag.algorithm));
        } else {
            write_info("ETag: weak");
        }
    } else {
        write_info("ETag: disabled");
    }
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(max) = config.performance.max_connections {
        write_info(&format!("Max connections: {max}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_tls_handshake_failed(peer_addr: &SocketAddr, err: &std::io::Error) {
    write_warning(&format!("[WARN] TLS handshake with {peer_addr} failed: {err}"));
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_debug(message: &str) {
    if enabled(LogLevel::Debug) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_warning(&format!("[WARN] {message}"));
}

/// Log transfer progress; `total` is `None` when the size is unknown
pub fn log_transfer_progress(label: &str, progress: u64, total: Option<u64>) {
    match total {
        Some(total) => log_debug(&format!("{label} Transfer progress: {progress} / {total}")),
        None => log_debug(&format!("{label} Transfer progress: {progress}")),
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown_requested() {
    write_info("\n[Shutdown] Stopping listener, waiting for active connections");
}

pub fn log_shutdown_complete(drained: bool) {
    if drained {
        write_info("[Shutdown] All connections closed");
    } else {
        write_warning("[WARN] [Shutdown] Timed out waiting for connections to close");
    }
}
