//! Logger module
//!
//! Provides logging utilities for the task server including:
//! - Startup banner
//! - Access logging with multiple formats
//! - Task and upload events
//! - Error and warning logging

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{AppState, Config};
use crate::store::Task;
use crate::upload::StoredUpload;
use std::net::SocketAddr;
use writer::Channel;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

pub fn write_info(message: &str) {
    writer::write(Channel::Access, message);
}

pub fn write_error(message: &str) {
    writer::write(Channel::Error, message);
}

pub fn log_server_start(addr: &SocketAddr, state: &AppState, task_count: usize) {
    let config = &state.config;
    write_info("======================================");
    write_info(&format!("Server berjalan di http://{addr}"));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    write_info(&format!(
        "Task file: {} ({task_count} tasks)",
        state.store.path().display()
    ));
    write_info(&format!("Upload dir: {}", state.uploads.dir().display()));
    write_info(&format!("Frontend dir: {}", config.storage.public_dir));
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

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        write_info(&format!("[Headers] Count: {count}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    writer::write(Channel::Access, &entry.format(format));
}

pub fn log_task_created(task: &Task) {
    write_info(&format!(
        "[Task] Created {} \"{}\" ({}, {})",
        task.id, task.title, task.tech, task.year
    ));
}

pub fn log_upload_saved(upload: &StoredUpload, size: usize) {
    write_info(&format!(
        "[Upload] Saved {} ({size} bytes)",
        upload.public_path
    ));
}

pub fn log_shutdown(active_connections: usize) {
    write_info(&format!(
        "[Shutdown] Listener closed, {active_connections} connection(s) still finishing"
    ));
}
