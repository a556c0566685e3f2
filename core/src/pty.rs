//! PTY session: one pseudo-terminal plus one child shell. A dedicated OS thread reads
//! PTY stdout and forwards chunks over a bounded channel; writes go straight to the
//! master's writer half. Close is idempotent and safe under concurrent access: it marks
//! the session closed, kills the child's process group (which unblocks the blocking
//! reader with an EOF), waits for the reader thread to notice, and reaps the child.

use portable_pty::{native_pty_system, Child, CommandBuilder, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::log::prefix;
use crate::platform;

/// Nominal initial PTY size. Chosen to comfortably fit full-screen TUIs; clients resize
/// immediately after connecting (browser) or never (bot, which never draws a real grid).
pub const DEFAULT_ROWS: u16 = 50;
pub const DEFAULT_COLS: u16 = 120;

/// Output channel capacity: a handful of seconds of terminal chatter can buffer here
/// while the consuming streamer is mid-emit.
const OUTPUT_CHANNEL_CAPACITY: usize = 100;

/// Minimum delay between writing a command's text and its trailing carriage return.
/// TUI input loops that parse keystroke *events* (rather than scanning raw bytes for
/// '\n') can coalesce "text\r" delivered in one write into a single event, losing the
/// Enter. Splitting into two writes with a short pause forces two distinct events.
const COMMAND_ENTER_DELAY: std::time::Duration = std::time::Duration::from_millis(60);

/// One running child shell and the master side of its pseudo-terminal.
pub struct PtySession {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    child_pid: i32,
    resize_tx: std::sync::mpsc::Sender<(u16, u16)>,
    closed: AtomicBool,
    close_lock: Mutex<()>,
}

/// Create a PTY session running a login shell. Returns the session and the receiving
/// end of its output channel; the caller (a streamer) owns consumption of that channel.
pub fn spawn() -> Result<(Arc<PtySession>, mpsc::Receiver<Vec<u8>>), Box<dyn std::error::Error + Send + Sync>> {
    let pty_system = native_pty_system();
    let pair = pty_system.openpty(PtySize {
        rows: DEFAULT_ROWS,
        cols: DEFAULT_COLS,
        pixel_width: 0,
        pixel_height: 0,
    })?;

    let cmd: CommandBuilder = platform::shell_command();
    let child = pair.slave.spawn_command(cmd)?;
    let child_pid = child.process_id().map(|p| p as i32).unwrap_or(-1);

    let mut reader = pair.master.try_clone_reader()?;
    let writer = pair.master.take_writer()?;
    let master = pair.master;

    let (tx, rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);
    let (resize_tx, resize_rx) = std::sync::mpsc::channel::<(u16, u16)>();

    std::thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        // Channel drop signals EOF (child exited, or the PTY handle was closed) to
        // whichever streamer is receiving from it.
    });

    std::thread::spawn(move || {
        while let Ok((rows, cols)) = resize_rx.recv() {
            let _ = master.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 });
        }
    });

    let session = Arc::new(PtySession {
        writer: Arc::new(Mutex::new(writer)),
        child: Arc::new(Mutex::new(child)),
        child_pid,
        resize_tx,
        closed: AtomicBool::new(false),
        close_lock: Mutex::new(()),
    });

    Ok((session, rx))
}

impl PtySession {
    /// Write `line` then, after a short delay, a carriage return as a second write.
    /// See `COMMAND_ENTER_DELAY` for why the two writes are not coalesced.
    pub async fn send_command(&self, line: &str) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.write_bytes(line.as_bytes());
        tokio::time::sleep(COMMAND_ENTER_DELAY).await;
        self.write_bytes(b"\r");
    }

    /// Write bytes verbatim, no appended newline. Used by the terminal-emulator path,
    /// which already sends real keystrokes including their own control sequences.
    pub fn send_raw_input(&self, bytes: &[u8]) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.write_bytes(bytes);
    }

    fn write_bytes(&self, bytes: &[u8]) {
        let writer = self.writer.clone();
        let Ok(mut guard) = writer.lock() else { return };
        if guard.write_all(bytes).is_err() {
            eprintln!("{} event=write_failed", prefix("pty"));
        }
        let _ = guard.flush();
    }

    pub fn resize(&self, rows: u16, cols: u16) {
        if rows == 0 || cols == 0 {
            return;
        }
        let _ = self.resize_tx.send((rows, cols));
    }

    /// Idempotent, concurrency-safe teardown: kill the process group (which makes the
    /// blocking reader thread see EOF and drop the output channel), then reap the child.
    /// Safe to call more than once and safe to call while a reader is mid-read.
    pub fn close(&self) {
        let _guard = self.close_lock.lock().unwrap();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.child_pid > 0 {
            platform::kill_process_group(self.child_pid);
        }
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_write_and_close_is_idempotent() {
        let (session, mut rx) = spawn().expect("spawn pty");
        session.send_command("echo hello").await;

        let mut collected = Vec::new();
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await {
                Ok(Some(chunk)) => collected.extend(chunk),
                Ok(None) => break,
                Err(_) => continue,
            }
            if String::from_utf8_lossy(&collected).contains("hello") {
                break;
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("hello"));

        session.close();
        session.close(); // must not panic, must stay closed
        assert!(session.is_closed());
    }

    #[test]
    fn resize_ignores_zero_dimensions() {
        let (session, _rx) = spawn().expect("spawn pty");
        // Should not panic and should not attempt to send a degenerate size.
        session.resize(0, 80);
        session.resize(24, 0);
        session.close();
    }
}
