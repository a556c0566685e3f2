//! Unified log format: [Shellbridge][component] key=value ...
//! No tracing/log crate: plain eprintln! with a grep-friendly prefix, matching how the
//! rest of this codebase's lineage logs IM traffic.

const CONTENT_LOG_MAX_LEN: usize = 120;

/// Log prefix for a component, e.g. "[Shellbridge][pty]", "[Shellbridge][web]".
#[inline]
pub fn prefix(component: &str) -> String {
    format!("[Shellbridge][{}]", component)
}

/// Truncate message content for logging (avoid huge dumps).
#[inline]
pub fn truncate_content(content: &str, max_len: usize) -> std::borrow::Cow<'_, str> {
    if content.len() <= max_len {
        std::borrow::Cow::Borrowed(content)
    } else {
        std::borrow::Cow::Owned(format!("{}... ({} bytes)", &content[..max_len], content.len()))
    }
}

#[inline]
pub fn truncate_content_default(content: &str) -> std::borrow::Cow<'_, str> {
    truncate_content(content, CONTENT_LOG_MAX_LEN)
}
