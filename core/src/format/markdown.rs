//! Markdown-ish-to-HTML conversion for chat delivery. Five ordered phases: pull fenced
//! code blocks out behind placeholders, pull inline code out behind placeholders,
//! HTML-escape what remains, run the markdown regexes, then restore the placeholders
//! (already escaped and wrapped in <pre>/<code> themselves). Doing escape *between* the
//! code-extraction and markdown-conversion passes means neither pass can corrupt the
//! other: the regexes never see `<`/`&` from user text, and code contents never get
//! mangled by a bold/italic regex.

use regex::Regex;
use std::sync::OnceLock;

const FENCE_PLACEHOLDER_PREFIX: &str = "\u{0}FENCE";
const INLINE_PLACEHOLDER_PREFIX: &str = "\u{0}CODE";

pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cheap lexical probe: if none of these marker characters appear, there is nothing
/// for the markdown pass to do and `render_to_html` can skip straight to escaping.
pub fn looks_like_markdown(text: &str) -> bool {
    text.contains('#')
        || text.contains('*')
        || text.contains('_')
        || text.contains('`')
        || text.contains('[')
        || text.contains('~')
        || text.contains("- ")
}

pub fn render_to_html(text: &str) -> String {
    if !looks_like_markdown(text) {
        return html_escape(text);
    }

    let (text, fences) = extract_fenced_code(text);
    let (text, inline) = extract_inline_code(&text);
    let escaped = html_escape(&text);
    let converted = apply_markdown_rules(&escaped);
    restore_placeholders(&converted, &fences, &inline)
}

fn extract_fenced_code(text: &str) -> (String, Vec<String>) {
    let re = fence_regex();
    let mut blocks = Vec::new();
    let replaced = re
        .replace_all(text, |caps: &regex::Captures| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let class = if lang.is_empty() {
                String::new()
            } else {
                format!(" class=\"language-{}\"", html_escape(lang))
            };
            blocks.push(format!("<pre><code{}>{}</code></pre>", class, html_escape(body)));
            format!("{FENCE_PLACEHOLDER_PREFIX}{}\u{0}", blocks.len() - 1)
        })
        .into_owned();
    (replaced, blocks)
}

fn extract_inline_code(text: &str) -> (String, Vec<String>) {
    let re = inline_code_regex();
    let mut blocks = Vec::new();
    let replaced = re
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            blocks.push(format!("<code>{}</code>", html_escape(body)));
            format!("{INLINE_PLACEHOLDER_PREFIX}{}\u{0}", blocks.len() - 1)
        })
        .into_owned();
    (replaced, blocks)
}

fn apply_markdown_rules(text: &str) -> String {
    let mut out = text.to_string();
    out = header_regex().replace_all(&out, "<b>$1</b>").into_owned();
    out = bullet_regex()
        .replace_all(&out, |caps: &regex::Captures| format!("{}• ", &caps[1]))
        .into_owned();
    out = link_regex()
        .replace_all(&out, r#"<a href="$2">$1</a>"#)
        .into_owned();
    out = bold_regex().replace_all(&out, "<b>$1</b>").into_owned();
    out = strike_regex().replace_all(&out, "<s>$1</s>").into_owned();
    out = italic_regex().replace_all(&out, "<i>$1</i>").into_owned();
    out
}

fn restore_placeholders(text: &str, fences: &[String], inline: &[String]) -> String {
    let mut out = text.to_string();
    for (i, block) in fences.iter().enumerate() {
        out = out.replace(&format!("{FENCE_PLACEHOLDER_PREFIX}{i}\u{0}"), block);
    }
    for (i, block) in inline.iter().enumerate() {
        out = out.replace(&format!("{INLINE_PLACEHOLDER_PREFIX}{i}\u{0}"), block);
    }
    out
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)\n(.*?)```").unwrap())
}

fn inline_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").unwrap())
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").unwrap())
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*)[-*]\s+").unwrap())
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap())
}

fn bold_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap())
}

fn strike_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"~~([^~]+)~~").unwrap())
}

fn italic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*\n]+)\*").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_short_circuits_to_escape_only() {
        assert_eq!(render_to_html("hello & goodbye"), "hello &amp; goodbye");
    }

    #[test]
    fn converts_header_and_bold() {
        let out = render_to_html("# Title\n**bold**");
        assert!(out.contains("<b>Title</b>"));
        assert!(out.contains("<b>bold</b>"));
    }

    #[test]
    fn fenced_code_is_not_mangled_by_markdown_rules() {
        let input = "before\n```rust\nlet x = *y;\n```\nafter";
        let out = render_to_html(input);
        assert!(out.contains("<pre><code class=\"language-rust\">let x = *y;\n</code></pre>"));
        assert!(!out.contains("<i>"));
    }

    #[test]
    fn inline_code_preserves_html_special_chars() {
        let out = render_to_html("run `a < b`");
        assert!(out.contains("<code>a &lt; b</code>"));
    }

    #[test]
    fn links_and_strikethrough_convert() {
        let out = render_to_html("[text](https://example.com) and ~~gone~~");
        assert!(out.contains(r#"<a href="https://example.com">text</a>"#));
        assert!(out.contains("<s>gone</s>"));
    }

    #[test]
    fn bullets_become_bullet_points() {
        let out = render_to_html("- one\n- two");
        assert!(out.contains("• one"));
        assert!(out.contains("• two"));
    }
}
