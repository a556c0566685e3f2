//! Chat message formatting: classify raw terminal text, convert the markdown-ish subset
//! a CLI tends to emit into chat-client HTML, and split long output into size-bounded
//! chunks without breaking an HTML entity in half.

mod markdown;
mod splitter;

pub use markdown::{html_escape, render_to_html};

/// How a block of terminal text should be presented in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Box-drawing / table-ish content: render as a monospace block, untouched.
    Monospace,
    /// Prose with markdown markers: convert to HTML. `expandable` is set for long
    /// blocks chat clients may want to collapse behind a "show more" affordance.
    Blockquote { expandable: bool },
    Plain,
}

const EXPANDABLE_THRESHOLD: usize = 500;

pub fn classify(text: &str) -> Classification {
    if is_box_drawing(text) {
        return Classification::Monospace;
    }
    if has_markdown_markers(text) {
        return Classification::Blockquote {
            expandable: text.len() > EXPANDABLE_THRESHOLD,
        };
    }
    Classification::Plain
}

/// Top-level tag a `Classification`'s rendered body is wrapped in, preserved across
/// every chunk the splitter emits.
fn wrap_tag(classification: Classification) -> (&'static str, &'static str) {
    match classification {
        Classification::Monospace => ("<pre>", "</pre>"),
        Classification::Blockquote { expandable: true } => ("<blockquote expandable>", "</blockquote>"),
        Classification::Blockquote { expandable: false } => ("<blockquote>", "</blockquote>"),
        Classification::Plain => ("", ""),
    }
}

/// Classifies `text`, renders it to the matching HTML shape, and splits it into
/// `max_len`-bounded chunks, each independently wrapped in the same top-level tag.
pub fn format_message(text: &str, max_len: usize) -> Vec<String> {
    let classification = classify(text);
    let body = match classification {
        Classification::Monospace | Classification::Plain => html_escape(text),
        Classification::Blockquote { .. } => render_to_html(text),
    };
    splitter::split_for_delivery(&body, max_len, wrap_tag(classification))
}

fn is_box_drawing(text: &str) -> bool {
    let box_chars: usize = text
        .chars()
        .filter(|c| "─│┌┐└┘├┤┬┴┼╭╮╰╯═║╔╗╚╝".contains(*c))
        .count();
    box_chars > 0 && text.chars().count() > 0 && box_chars * 5 >= text.chars().count()
}

fn has_markdown_markers(text: &str) -> bool {
    markdown::looks_like_markdown(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_box_drawing() {
        assert_eq!(classify("┌──┐\n│ok│\n└──┘"), Classification::Monospace);
    }

    #[test]
    fn classifies_plain_prose() {
        assert_eq!(classify("just a sentence"), Classification::Plain);
    }

    #[test]
    fn classifies_markdown_as_expandable_when_long() {
        let long = "# Title\n".to_string() + &"word ".repeat(200);
        match classify(&long) {
            Classification::Blockquote { expandable } => assert!(expandable),
            other => panic!("expected Blockquote, got {other:?}"),
        }
    }

    #[test]
    fn format_message_wraps_monospace_in_pre() {
        let chunks = format_message("┌──┐\n│ok│\n└──┘", 4000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("<pre>"));
        assert!(chunks[0].ends_with("</pre>"));
    }

    #[test]
    fn format_message_leaves_plain_text_unwrapped() {
        let chunks = format_message("just a sentence", 4000);
        assert_eq!(chunks, vec!["just a sentence"]);
    }

    #[test]
    fn format_message_splits_oversize_markdown_into_wrapped_expandable_chunks() {
        let long = format!("# Title\n{}", "word ".repeat(1000));
        let chunks = format_message(&long, 4000);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with("<blockquote expandable>"));
            assert!(chunk.ends_with("</blockquote>"));
        }
    }
}
