//! Strips the interactive-CLI chrome that clutters a chat transcript: hint banners,
//! box-drawn borders, spinner frames, menu chevrons. None of this is meaningful outside
//! a live terminal, and most of the example tool this bridge hosts (an agentic coding
//! CLI) emits exactly this chrome on every redraw.

const BLOCKED_SUBSTRINGS: &[&str] = &[
    "? for shortcuts",
    "Chrome extension not detected",
    "chrome to install",
    "claude.ai/chrome",
    "ctrl+g to edit in VS Code",
    "MCP server needs auth",
    "/plugin marketplace",
    "/plugin install",
];

const EXACT_LINES: &[&str] = &["Checking for updates"];

const INTERRUPT_PHRASES: &[&str] = &[
    "esc to cancel",
    "esc to interrupt",
    "tab to amend",
    "ctrl+o to",
    "ctrl+e to",
    "shift+tab to cycle",
];

/// Braille spinner glyphs used by common CLI progress indicators.
const SPINNER_CHARS: &[char] = &[
    '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏',
];

pub fn clean_chrome(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        if should_drop_line(line) {
            continue;
        }
        kept.push(line);
    }
    collapse_blank_runs(&kept.join("\n"))
}

fn should_drop_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if is_box_drawing_only(trimmed) {
        return true;
    }
    if is_separator_heavy(trimmed) {
        return true;
    }
    if starts_with_chat_marker(trimmed) {
        return true;
    }
    if EXACT_LINES.iter().any(|s| trimmed == *s) {
        return true;
    }
    if BLOCKED_SUBSTRINGS.iter().any(|s| trimmed.contains(s)) {
        return true;
    }
    if trimmed.starts_with("Tip:") {
        return true;
    }
    let lower = trimmed.to_lowercase();
    if INTERRUPT_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    if trimmed.chars().next().map(|c| SPINNER_CHARS.contains(&c)).unwrap_or(false) {
        return true;
    }
    if is_short_title_case_phrase(trimmed) {
        return true;
    }
    if is_duplicated_phrase(trimmed) {
        return true;
    }
    false
}

fn is_box_drawing_only(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| "─│┌┐└┘├┤┬┴┼╭╮╰╯═║╔╗╚╝".contains(c) || c.is_whitespace())
}

/// Lines dominated by repeated separator punctuation (rules, dotted leaders) rather
/// than prose. Only applies to lines long enough that density is meaningful.
fn is_separator_heavy(line: &str) -> bool {
    if line.len() < 10 {
        return false;
    }
    let separator_count = line
        .chars()
        .filter(|c| matches!(c, '-' | '=' | '.' | '*' | '_' | '─' | '·'))
        .count();
    separator_count as f64 / line.chars().count() as f64 > 0.6
}

fn starts_with_chat_marker(line: &str) -> bool {
    const MARKERS: &[&str] = &["> ", "❯ ", "● ", "◆ ", "▸ ", "» "];
    MARKERS.iter().any(|m| line.starts_with(m))
}

/// A short Title-Case phrase (e.g. a menu heading like "Select Model") with no sentence
/// punctuation reads as UI chrome, not conversational output.
fn is_short_title_case_phrase(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 4 || line.len() > 40 {
        return false;
    }
    if line.ends_with('.') || line.ends_with('?') || line.ends_with('!') || line.ends_with(':') {
        return false;
    }
    words.iter().all(|w| {
        w.chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
    })
}

/// Catches redraw artifacts like "Thinking... Thinking..." where a TUI repeats a whole
/// word-for-word phrase back to back on one line.
fn is_duplicated_phrase(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 2 || words.len() % 2 != 0 {
        return false;
    }
    let half = words.len() / 2;
    words[..half] == words[half..]
}

fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_box_drawing_lines() {
        let input = "hello\n──────────\nworld";
        assert_eq!(clean_chrome(input), "hello\nworld");
    }

    #[test]
    fn drops_blocked_substrings() {
        let input = "? for shortcuts\nreal output";
        assert_eq!(clean_chrome(input), "real output");
    }

    #[test]
    fn drops_spinner_lines() {
        let input = "⠋ Thinking\nactual result";
        assert_eq!(clean_chrome(input), "actual result");
    }

    #[test]
    fn collapses_long_blank_runs() {
        let input = "a\n\n\n\n\nb";
        assert_eq!(clean_chrome(input), "a\n\n\nb");
    }

    #[test]
    fn keeps_ordinary_prose() {
        let input = "Here is a normal sentence with punctuation.";
        assert_eq!(clean_chrome(input), input);
    }

    #[test]
    fn drops_duplicated_phrase_lines() {
        let input = "Thinking deeply Thinking deeply\nkept line";
        assert_eq!(clean_chrome(input), "kept line");
    }
}
