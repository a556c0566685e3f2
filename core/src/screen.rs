//! Virtual screen: interprets a terminal control stream (CSI/OSC/SGR, cursor motion,
//! clears, alternate screen buffer) and maintains the grid a human would actually see,
//! via `vt100`. Naively stripping escape codes would destroy layout for any TUI that
//! positions output by absolute cursor coordinates; replaying the stream into a real
//! virtual terminal instead yields the rendered text.

use std::sync::Mutex;

/// A virtual terminal grid plus the bookkeeping needed for incremental `Diff()` reads.
pub struct VirtualScreen {
    inner: Mutex<Inner>,
}

struct Inner {
    parser: vt100::Parser,
    last_diff_baseline: Option<Vec<String>>,
}

impl VirtualScreen {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            inner: Mutex::new(Inner {
                parser: vt100::Parser::new(rows, cols, 0),
                last_diff_baseline: None,
            }),
        }
    }

    /// Feed raw PTY bytes into the terminal interpreter.
    pub fn write(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.parser.process(bytes);
    }

    /// Current visible screen as plain text: trailing whitespace trimmed per line,
    /// trailing empty lines removed. An all-blank screen is the empty string.
    pub fn screen_text(&self) -> String {
        let inner = self.inner.lock().unwrap();
        render_trimmed(&inner.parser)
    }

    /// Lines in `screen_text()` that differ from (or are beyond) the previous call to
    /// `diff()`. The first call returns the full screen; an unchanged screen returns "".
    /// Returns "" if and only if `screen_text()` equals the previously-captured baseline.
    pub fn diff(&self) -> String {
        let mut inner = self.inner.lock().unwrap();
        let current_text = render_trimmed(&inner.parser);
        let current_lines: Vec<String> = split_lines(&current_text);

        let result = match &inner.last_diff_baseline {
            None => current_text.clone(),
            Some(baseline) if baseline.join("\n") == current_text => String::new(),
            Some(baseline) if current_lines.len() < baseline.len() => {
                // The screen shrank (e.g. a redraw cleared trailing lines): a
                // positional line diff can't express removal, so re-emit the
                // whole current screen rather than silently reporting no change.
                current_text.clone()
            }
            Some(baseline) => current_lines
                .iter()
                .enumerate()
                .filter(|(i, line)| baseline.get(*i).map(|b| b != *line).unwrap_or(true))
                .map(|(_, line)| line.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        };
        inner.last_diff_baseline = Some(current_lines);
        result
    }

    /// Forget the last-seen screen used by `diff()`; the next call returns the full
    /// current screen again.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_diff_baseline = None;
    }

    pub fn resize(&self, rows: u16, cols: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.parser.screen_mut().set_size(rows, cols);
    }
}

fn render_trimmed(parser: &vt100::Parser) -> String {
    let contents = parser.screen().contents();
    let mut lines: Vec<&str> = contents.lines().map(|l| l.trim_end()).collect();
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.lines().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_screen_is_empty_string() {
        let screen = VirtualScreen::new(10, 20);
        assert_eq!(screen.screen_text(), "");
    }

    #[test]
    fn plain_text_round_trips_without_escape_bytes() {
        let screen = VirtualScreen::new(10, 20);
        screen.write(b"\x1b[1;1Hhello\x1b[0m world");
        let text = screen.screen_text();
        assert!(!text.contains('\x1b'));
        assert!(text.contains("hello"));
    }

    #[test]
    fn first_diff_is_full_screen_then_empty_when_unchanged() {
        let screen = VirtualScreen::new(10, 20);
        screen.write(b"hello\r\n");
        let first = screen.diff();
        assert!(first.contains("hello"));
        let second = screen.diff();
        assert_eq!(second, "");
    }

    #[test]
    fn reset_forgets_baseline() {
        let screen = VirtualScreen::new(10, 20);
        screen.write(b"hello\r\n");
        let _ = screen.diff();
        screen.reset();
        let after_reset = screen.diff();
        assert!(after_reset.contains("hello"));
    }

    #[test]
    fn shrinking_screen_still_reports_a_nonempty_diff() {
        let screen = VirtualScreen::new(10, 20);
        screen.write(b"line one\r\nline two\r\n");
        let _ = screen.diff();
        // Clear the screen and redraw with fewer lines than the previous baseline.
        screen.write(b"\x1b[2J\x1b[H\x1b[0Jone\r\n");
        let after_shrink = screen.diff();
        assert_ne!(after_shrink, "");
        assert_ne!(screen.screen_text(), "line one\nline two");
    }

    #[test]
    fn write_a_then_b_matches_write_ab() {
        let a = VirtualScreen::new(10, 20);
        a.write(b"foo");
        a.write(b"bar\r\n");

        let b = VirtualScreen::new(10, 20);
        b.write(b"foobar\r\n");

        assert_eq!(a.screen_text(), b.screen_text());
    }
}
