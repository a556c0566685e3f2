//! Splits rendered HTML into chunks no client-imposed message length can reject.
//! Prefers to break at paragraph boundaries, then line boundaries, and only as a last
//! resort hard-cuts mid-line — in which case it retreats up to 10 characters to avoid
//! severing an HTML entity (`&amp;`, `&lt;`, `&gt;`) in half. Each emitted chunk is
//! independently wrapped in the same top-level tag the whole message was classified
//! under, preserving attributes such as the expandable modifier.

/// Splits `html` by content length, then wraps every resulting chunk in `tag`
/// (open, close) — e.g. `("<blockquote expandable>", "</blockquote>")`.
pub fn split_for_delivery(html: &str, max_len: usize, tag: (&str, &str)) -> Vec<String> {
    let (open, close) = tag;
    if html.chars().count() <= max_len {
        return vec![format!("{open}{html}{close}")];
    }

    let mut chunks = Vec::new();
    let mut remaining = html;
    while !remaining.is_empty() {
        if remaining.chars().count() <= max_len {
            chunks.push(format!("{open}{remaining}{close}"));
            break;
        }
        let cut = find_break_point(remaining, max_len);
        let (head, tail) = split_at_char(remaining, cut);
        chunks.push(format!("{open}{head}{close}"));
        remaining = tail.trim_start_matches('\n');
    }
    chunks
}

fn find_break_point(text: &str, max_len: usize) -> usize {
    let window = take_chars(text, max_len);

    if let Some(idx) = window.rfind("\n\n") {
        return char_len(&window[..idx]);
    }
    if let Some(idx) = window.rfind('\n') {
        return char_len(&window[..idx]);
    }
    entity_safe_cut(&window, max_len)
}

/// If the naive cut point lands inside `&...;`, retreat up to 10 characters so the
/// entity survives intact in the *next* chunk instead of being split across two.
fn entity_safe_cut(window: &str, max_len: usize) -> usize {
    let chars: Vec<char> = window.chars().collect();
    let mut cut = chars.len();
    let lookback = cut.saturating_sub(10);
    for i in (lookback..cut).rev() {
        if chars[i] == '&' {
            // Is there a terminating ';' within this window after the '&'?
            let has_close = chars[i..cut].iter().any(|c| *c == ';');
            if !has_close {
                cut = i;
            }
            break;
        }
        if chars[i] == ';' {
            break;
        }
    }
    let _ = max_len;
    cut
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_at_char(text: &str, char_idx: usize) -> (&str, &str) {
    match text.char_indices().nth(char_idx) {
        Some((byte_idx, _)) => text.split_at(byte_idx),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TAG: (&str, &str) = ("", "");
    const BLOCKQUOTE: (&str, &str) = ("<blockquote>", "</blockquote>");

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_for_delivery("hello", 100, NO_TAG), vec!["hello"]);
    }

    #[test]
    fn wraps_every_chunk_in_the_given_tag() {
        let text = format!("{}\n\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_for_delivery(&text, 15, BLOCKQUOTE);
        assert_eq!(chunks[0], format!("<blockquote>{}</blockquote>", "a".repeat(10)));
        assert_eq!(chunks[1], format!("<blockquote>{}</blockquote>", "b".repeat(10)));
    }

    #[test]
    fn splits_on_paragraph_boundary_when_possible() {
        let text = format!("{}\n\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_for_delivery(&text, 15, NO_TAG);
        assert_eq!(chunks[0], "a".repeat(10));
        assert_eq!(chunks[1], "b".repeat(10));
    }

    #[test]
    fn never_splits_an_entity_in_half() {
        let text = format!("{}&amp;{}", "x".repeat(8), "y".repeat(8));
        let chunks = split_for_delivery(&text, 10, NO_TAG);
        for chunk in &chunks {
            let amp_positions: Vec<_> = chunk.match_indices('&').collect();
            for (idx, _) in amp_positions {
                assert!(chunk[idx..].contains(';'), "entity split across chunk boundary: {chunk:?}");
            }
        }
    }

    #[test]
    fn reassembled_chunks_cover_all_non_whitespace_content() {
        let text = "word ".repeat(50);
        let chunks = split_for_delivery(&text, 20, NO_TAG);
        let joined: String = chunks.join("");
        assert_eq!(joined.split_whitespace().count(), text.split_whitespace().count());
    }
}
