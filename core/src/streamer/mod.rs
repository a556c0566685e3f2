//! Streamers: the task that sits between a PTY's output channel and an `OutputSink`,
//! deciding *when* to emit and, for the chat path, *what's new* since the last emit.
//! Two variants share almost nothing except the idle-timeout convention, so they live
//! in separate modules; this one holds only the line-diffing helpers both could in
//! principle use and that are easiest to unit-test in isolation.

pub mod chat;
pub mod socket;

use std::collections::HashSet;

/// Both streamer loops close the session if the PTY produces nothing for this long —
/// a hung or abandoned shell shouldn't pin resources indefinitely.
pub const IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30 * 60);

/// Find the newly revealed lines in `new_lines` given the previously emitted
/// `old_lines`, by locating the longest suffix of `old_lines` that reappears as a
/// contiguous run inside `new_lines`. This is the common case for line-buffered CLI
/// output and output that scrolls a fixed-size screen: most of what's on screen was
/// already sent, and only a suffix is new. Returns `None` when no such overlap is
/// found at all (a full repaint, or the screen changed too much to anchor on).
pub fn suffix_diff_lines(old_lines: &[String], new_lines: &[String]) -> Option<Vec<String>> {
    if old_lines.is_empty() {
        return Some(new_lines.to_vec());
    }
    let max_k = old_lines.len().min(new_lines.len());
    for k in (1..=max_k).rev() {
        let old_suffix = &old_lines[old_lines.len() - k..];
        if let Some(pos) = find_contiguous_run(new_lines, old_suffix) {
            let after = pos + k;
            return Some(new_lines[after..].to_vec());
        }
    }
    None
}

fn find_contiguous_run(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| haystack[start..start + needle.len()] == *needle)
}

/// Fallback used when `suffix_diff_lines` can't anchor: keep a cache of every line
/// already sent for this session and emit only lines not seen before, in order,
/// recording them as sent. Loses line-reordering information but guarantees no
/// silent duplicate spam when the screen repaints unrecognizably (e.g. alt-screen
/// clear then redraw).
#[derive(Default)]
pub struct SentLineCache {
    seen: HashSet<String>,
}

impl SentLineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dedup(&mut self, lines: &[String]) -> Vec<String> {
        let mut fresh = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if self.seen.insert(line.clone()) {
                fresh.push(line.clone());
            }
        }
        fresh
    }
}

/// Compute the lines to emit this tick: try the suffix-anchored diff first (cheap,
/// order-preserving), and only fall back to the sent-line cache when no anchor exists.
pub fn diff_new_lines(
    old_lines: &[String],
    new_lines: &[String],
    cache: &mut SentLineCache,
) -> Vec<String> {
    match suffix_diff_lines(old_lines, new_lines) {
        Some(fresh) => {
            for line in &fresh {
                if !line.is_empty() {
                    cache.seen.insert(line.clone());
                }
            }
            fresh
        }
        None => cache.dedup(new_lines),
    }
}

fn lines_of(text: &str) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.lines().map(|s| s.to_string()).collect()
    }
}

pub(crate) fn split_lines(text: &str) -> Vec<String> {
    lines_of(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn suffix_diff_finds_simple_append() {
        let old = lines(&["a", "b", "c"]);
        let new = lines(&["a", "b", "c", "d", "e"]);
        assert_eq!(suffix_diff_lines(&old, &new), Some(lines(&["d", "e"])));
    }

    #[test]
    fn suffix_diff_handles_scrolled_window() {
        let old = lines(&["1", "2", "3"]);
        let new = lines(&["2", "3", "4"]);
        assert_eq!(suffix_diff_lines(&old, &new), Some(lines(&["4"])));
    }

    #[test]
    fn suffix_diff_none_when_unrecognizable() {
        let old = lines(&["x", "y"]);
        let new = lines(&["totally", "different", "screen"]);
        assert_eq!(suffix_diff_lines(&old, &new), None);
    }

    #[test]
    fn sent_line_cache_drops_already_seen_lines() {
        let mut cache = SentLineCache::new();
        assert_eq!(cache.dedup(&lines(&["a", "b"])), lines(&["a", "b"]));
        assert_eq!(cache.dedup(&lines(&["a", "c"])), lines(&["c"]));
    }

    #[test]
    fn diff_new_lines_falls_back_to_cache_on_repaint() {
        let mut cache = SentLineCache::new();
        let first = diff_new_lines(&[], &lines(&["a", "b"]), &mut cache);
        assert_eq!(first, lines(&["a", "b"]));
        let repainted = diff_new_lines(&lines(&["a", "b"]), &lines(&["c", "a"]), &mut cache);
        assert_eq!(repainted, lines(&["c"]));
    }
}
