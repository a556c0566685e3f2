//! Platform shim: shell discovery and process-group teardown behind stable signatures.
//! The rest of the crate never branches on `cfg(unix)` / `cfg(windows)` itself — it calls
//! through here. On POSIX-like systems `portable_pty`'s slave already makes the spawned
//! child a session leader with the PTY as controlling terminal; this module only adds the
//! escalating group-kill and shell discovery that `portable_pty` doesn't provide.

use portable_pty::CommandBuilder;
use std::time::Duration;

/// Build the command line for an interactive login-capable shell with profile loading
/// disabled (so PTY sessions don't source the user's rc files, which can print banners
/// or block on prompts). Falls back to a minimal POSIX shell if nothing better is found.
#[cfg(unix)]
pub fn shell_command() -> CommandBuilder {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let mut c = if shell.ends_with("bash") {
        let mut c = CommandBuilder::new(&shell);
        c.arg("--noprofile");
        c.arg("--norc");
        c.arg("-i");
        c
    } else if shell.ends_with("zsh") {
        let mut c = CommandBuilder::new(&shell);
        c.arg("--no-rcs");
        c.arg("-i");
        c
    } else if which_on_path(&shell) {
        let mut c = CommandBuilder::new(&shell);
        c.arg("-i");
        c
    } else {
        CommandBuilder::new("/bin/sh")
    };
    apply_terminal_env(&mut c);
    c
}

#[cfg(windows)]
pub fn shell_command() -> CommandBuilder {
    let mut c = CommandBuilder::new("cmd.exe");
    apply_terminal_env(&mut c);
    c
}

/// Environment markers forcing a color-capable interactive terminal and silencing the
/// update-checker banners that several CLIs (the ones this bridge commonly hosts) print
/// on a fresh session.
pub fn apply_terminal_env(c: &mut CommandBuilder) {
    c.env("TERM", "xterm-256color");
    c.env("COLORTERM", "truecolor");
    c.env("NO_UPDATE_NOTIFIER", "1");
    c.env("DISABLE_AUTO_UPDATE", "1");
}

#[cfg(unix)]
fn which_on_path(bin: &str) -> bool {
    if bin.contains('/') {
        return std::path::Path::new(bin).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file())
        })
        .unwrap_or(false)
}

/// Escalating shutdown of an entire process group: SIGHUP, pause, SIGTERM, pause,
/// SIGKILL. Each signal targets the negative group id so every descendant receives it,
/// not just the direct child. Safe to call on a pid whose group has already exited.
#[cfg(unix)]
pub fn kill_process_group(pid: i32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(pid);
    let _ = killpg(pgid, Signal::SIGHUP);
    std::thread::sleep(Duration::from_millis(100));
    let _ = killpg(pgid, Signal::SIGTERM);
    std::thread::sleep(Duration::from_millis(50));
    let _ = killpg(pgid, Signal::SIGKILL);
}

/// No process-group concept on Windows: recursively force-kill the process tree instead.
#[cfg(windows)]
pub fn kill_process_group(pid: i32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output();
}

/// True if a process with this pid is currently alive (used by daemon status/stop).
#[cfg(unix)]
pub fn process_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    // Signal 0: no signal sent, just existence/permission check.
    kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(windows)]
pub fn process_alive(pid: i32) -> bool {
    let output = std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output();
    match output {
        Ok(o) => String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()),
        Err(_) => false,
    }
}

/// Send SIGTERM to a single pid (used by the daemon `stop` command before escalating).
#[cfg(unix)]
pub fn terminate(pid: i32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
}

#[cfg(windows)]
pub fn terminate(pid: i32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        let pid = std::process::id() as i32;
        assert!(process_alive(pid));
    }

    #[test]
    fn bogus_pid_is_not_alive() {
        // A pid this large is exceedingly unlikely to be assigned.
        assert!(!process_alive(i32::MAX - 1));
    }
}
