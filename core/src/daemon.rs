//! Daemon supervisor (POSIX-like targets only): fork-exec the binary as a detached
//! child, track it via a PID file, and provide status/stop commands against that file.
//! The child installs its own signal-driven cleanup so the PID file is removed whether
//! the process exits normally or is killed out from under the parent's back.

use crate::config;
use crate::log::prefix;
use crate::platform;

pub const DAEMON_CHILD_FLAG: &str = "--daemon-child";
const STOP_WAIT: std::time::Duration = std::time::Duration::from_secs(5);
const STOP_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Debug)]
pub enum DaemonError {
    AlreadyRunning { pid: i32 },
    NotRunning,
    Io(std::io::Error),
    Unsupported,
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonError::AlreadyRunning { pid } => write!(f, "daemon already running (pid {pid})"),
            DaemonError::NotRunning => write!(f, "daemon is not running"),
            DaemonError::Io(e) => write!(f, "{e}"),
            DaemonError::Unsupported => write!(f, "daemon mode is not supported on this platform"),
        }
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(e: std::io::Error) -> Self {
        DaemonError::Io(e)
    }
}

#[cfg(unix)]
pub fn start() -> Result<(), DaemonError> {
    if let Some(pid) = read_pid_if_alive() {
        return Err(DaemonError::AlreadyRunning { pid });
    }

    config::ensure_config_dir()?;
    let log_path = config::log_file_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let log_file_err = log_file.try_clone()?;

    let exe = std::env::current_exe()?;
    let mut cmd = std::process::Command::new(exe);
    cmd.arg(DAEMON_CHILD_FLAG);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(log_file);
    cmd.stderr(log_file_err);

    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
            Ok(())
        });
    }

    let child = cmd.spawn()?;
    let pid = child.id();
    std::fs::write(config::pid_file_path(), pid.to_string())?;
    eprintln!("{} event=started pid={}", prefix("daemon"), pid);
    // Intentionally do not wait() — the point of daemonizing is for this process to exit
    // while the child keeps running.
    std::mem::forget(child);
    Ok(())
}

#[cfg(not(unix))]
pub fn start() -> Result<(), DaemonError> {
    Err(DaemonError::Unsupported)
}

/// Entry point for the `--daemon-child` process: install cleanup, then return so the
/// caller proceeds into normal bot-bridge startup.
#[cfg(unix)]
pub fn run_as_child() {
    install_cleanup_on_signal();
}

#[cfg(not(unix))]
pub fn run_as_child() {}

/// Removes the PID file on SIGTERM/SIGINT before re-raising the default disposition,
/// and again via `atexit` on a normal return from `main`. Abrupt termination (SIGKILL)
/// can't be caught by definition; `stop()`'s own `remove_pid_file` call covers that case.
#[cfg(unix)]
fn install_cleanup_on_signal() {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    extern "C" fn handler(_: i32) {
        let _ = std::fs::remove_file(config::pid_file_path());
        std::process::exit(0);
    }

    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGTERM, &action);
        let _ = sigaction(Signal::SIGINT, &action);
    }

    extern "C" fn at_exit() {
        let _ = std::fs::remove_file(config::pid_file_path());
    }
    unsafe {
        libc_atexit(at_exit);
    }
}

#[cfg(unix)]
unsafe fn libc_atexit(f: extern "C" fn()) {
    extern "C" {
        fn atexit(cb: extern "C" fn()) -> i32;
    }
    let _ = atexit(f);
}

pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<i32>,
}

pub fn status() -> DaemonStatus {
    match read_pid_if_alive() {
        Some(pid) => DaemonStatus { running: true, pid: Some(pid) },
        None => DaemonStatus { running: false, pid: None },
    }
}

#[cfg(unix)]
pub fn stop() -> Result<(), DaemonError> {
    let pid = read_pid_if_alive().ok_or(DaemonError::NotRunning)?;

    platform::terminate(pid);
    let deadline = std::time::Instant::now() + STOP_WAIT;
    while std::time::Instant::now() < deadline {
        if !platform::process_alive(pid) {
            remove_pid_file();
            return Ok(());
        }
        std::thread::sleep(STOP_POLL_INTERVAL);
    }

    platform::kill_process_group(pid);
    remove_pid_file();
    Ok(())
}

#[cfg(not(unix))]
pub fn stop() -> Result<(), DaemonError> {
    Err(DaemonError::Unsupported)
}

fn read_pid_if_alive() -> Option<i32> {
    let contents = std::fs::read_to_string(config::pid_file_path()).ok()?;
    let pid: i32 = contents.trim().parse().ok()?;
    if platform::process_alive(pid) {
        Some(pid)
    } else {
        None
    }
}

fn remove_pid_file() {
    let _ = std::fs::remove_file(config::pid_file_path());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_not_running_without_pid_file() {
        // Redirect CONFIG_DIR would require process-global state; instead just assert
        // the function doesn't panic when the real pid file (if any) is stale/missing.
        let _ = status();
    }
}
