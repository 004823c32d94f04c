//! Daemon that keeps one service open and answers requests over a socket
//!
//! Architecture:
//! - daemon: opens the index (or scanner), listens on a Unix socket, handles
//!   search, reconcile, render and status requests
//! - Client: connects to the socket, sends a request, reads the response
//! - Fallback: if the daemon is unavailable, the CLI opens the service itself

pub mod client;
pub mod daemon;
pub mod protocol;

pub use client::{ClientError, IndexClient};

use std::path::PathBuf;

/// Path of a per-user runtime file
fn runtime_path(file_name: &str) -> PathBuf {
    // Try XDG_RUNTIME_DIR first (most secure, tmpfs-backed)
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(file_name);
    }

    // Fall back to user's home directory
    if let Some(home) = dirs::home_dir() {
        return home.join(".local").join("run").join(file_name);
    }

    // Last resort: /tmp with user ID
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", uid, file_name))
}

/// Get the socket path for the daemon
pub fn get_socket_path() -> PathBuf {
    runtime_path("markdex.sock")
}

/// Get the PID file path for the daemon
pub fn get_pid_path() -> PathBuf {
    runtime_path("markdex.pid")
}

/// Check if the daemon is running
pub fn is_daemon_running() -> bool {
    let pid_path = get_pid_path();
    if !pid_path.exists() {
        return false;
    }

    // Check if the process exists using kill(pid, 0)
    if let Ok(pid_str) = std::fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        return unsafe { libc::kill(pid, 0) == 0 };
    }

    false
}
