use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAGS: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
}

pub const DEFAULT_SNIPPET_LEN: usize = 150;

/// Context kept ahead of the first matched term.
const LEAD: usize = 50;
/// How far an edge may move to reach a whitespace boundary.
const SNAP: usize = 20;

/// Cut a window of roughly `max_len` characters around the earliest
/// occurrence of any of `terms`, snap its edges to nearby whitespace, strip
/// markup, collapse runs of whitespace, and mark truncated edges with an
/// ellipsis. Falls back to the content head when no term hits.
pub fn generate_snippet(content: &str, terms: &[String], max_len: usize) -> String {
    let lowered = content.to_lowercase();
    let hit = terms
        .iter()
        .filter(|t| !t.is_empty())
        .filter_map(|t| lowered.find(&t.to_lowercase()))
        .min();

    let (start, end) = match hit {
        Some(idx) => {
            // indices come from the lowercased copy; clamp onto boundaries
            // of the original in case lowercasing shifted byte lengths
            let idx = floor_boundary(content, idx.min(content.len()));
            let start = floor_boundary(content, idx.saturating_sub(LEAD));
            let end = ceil_boundary(content, (start + max_len).min(content.len()));
            (start, end)
        }
        None => (0, ceil_boundary(content, max_len.min(content.len()))),
    };

    let start = snap_start(content, start);
    let end = snap_end(content, end).max(start);

    let window = &content[start..end];
    let cleaned = TAGS.replace_all(window, " ");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&collapsed);
    if end < content.len() {
        snippet.push_str("...");
    }
    snippet
}

/// Move a non-zero start just past the next whitespace so the window does
/// not open mid-word.
fn snap_start(content: &str, start: usize) -> usize {
    if start == 0 {
        return 0;
    }
    for (i, c) in content[start..].char_indices() {
        if i > SNAP {
            break;
        }
        if c.is_whitespace() {
            return start + i + c.len_utf8();
        }
    }
    start
}

/// Pull a non-final end back to the preceding whitespace.
fn snap_end(content: &str, end: usize) -> usize {
    if end >= content.len() {
        return content.len();
    }
    for (i, c) in content[..end].char_indices().rev() {
        if end - i > SNAP {
            break;
        }
        if c.is_whitespace() {
            return i;
        }
    }
    end
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn contains_the_matched_term() {
        let content = format!("{} the red fox runs {}", "padding ".repeat(30), "tail ".repeat(30));
        let s = generate_snippet(&content, &terms(&["fox"]), DEFAULT_SNIPPET_LEN);
        assert!(s.contains("fox"), "snippet was: {s}");
    }

    #[test]
    fn length_stays_within_bound_plus_ellipses() {
        let content = "word ".repeat(200);
        let s = generate_snippet(&content, &terms(&["word"]), DEFAULT_SNIPPET_LEN);
        assert!(s.len() <= DEFAULT_SNIPPET_LEN + 6, "len was {}", s.len());
    }

    #[test]
    fn marks_truncated_edges() {
        let content = format!("{} fox {}", "lead ".repeat(40), "tail ".repeat(40));
        let s = generate_snippet(&content, &terms(&["fox"]), 60);
        assert!(s.starts_with("..."));
        assert!(s.ends_with("..."));
    }

    #[test]
    fn short_content_has_no_ellipses() {
        let s = generate_snippet("the red fox", &terms(&["fox"]), DEFAULT_SNIPPET_LEN);
        assert_eq!(s, "the red fox");
    }

    #[test]
    fn strips_markup_and_collapses_whitespace() {
        let s = generate_snippet("<p>red   fox</p>\n<b>runs</b>", &terms(&["fox"]), DEFAULT_SNIPPET_LEN);
        assert_eq!(s, "red fox runs");
    }

    #[test]
    fn falls_back_to_content_head() {
        let content = "alpha beta gamma ".repeat(20);
        let s = generate_snippet(&content, &terms(&["missing"]), 50);
        assert!(s.starts_with("alpha beta"));
        assert!(s.ends_with("..."));
    }

    #[test]
    fn survives_multibyte_content() {
        let content = "日本語のテキスト red fox 日本語のテキスト".repeat(5);
        let s = generate_snippet(&content, &terms(&["fox"]), 40);
        assert!(s.contains("fox"));
    }
}
