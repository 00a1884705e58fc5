//! Display title construction from a post's first line.

use super::text::{collapse_whitespace, normalize};

/// Title used when a post's first line has no usable text.
pub const UNTITLED: &str = "Untitled Post";

/// Titles up to this many characters are used unchanged.
pub const MAX_UNTRUNCATED: usize = 70;

/// Hard truncation width, before the ellipsis.
pub const MAX_TITLE_CHARS: usize = 72;

pub const ELLIPSIS: &str = "...";

/// A built title and whether it was shortened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub text: String,
    pub truncated: bool,
}

/// Build a display title from the first line of a post.
///
/// Long lines are cut at the first sentence boundary when that sentence fits
/// the display width, otherwise hard-truncated with an ellipsis.
pub fn build_title(first_line: &str) -> Title {
    let filtered: String = normalize(first_line)
        .chars()
        .filter(|c| is_allowed(*c))
        .collect();
    let text = collapse_whitespace(&filtered);
    if text.is_empty() {
        return Title {
            text: UNTITLED.to_string(),
            truncated: false,
        };
    }

    if text.chars().count() <= MAX_UNTRUNCATED {
        return Title {
            text,
            truncated: false,
        };
    }

    let text = match first_sentence(&text) {
        Some(sentence) if sentence.chars().count() <= MAX_TITLE_CHARS => sentence.to_string(),
        _ => {
            let cut: String = text.chars().take(MAX_TITLE_CHARS).collect();
            format!("{}{}", cut.trim_end(), ELLIPSIS)
        }
    };

    Title {
        text,
        truncated: true,
    }
}

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '.' | '!' | '?' | '\'' | ':' | '(' | ')' | ',' | '-' | '|')
}

/// Text before the first `[.!?] + whitespace + capital letter` boundary.
///
/// Returns `None` when the text holds a single sentence.
fn first_sentence(text: &str) -> Option<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(_, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }
        if j > i + 1 && j < chars.len() && chars[j].1.is_uppercase() {
            let end = chars[i + 1].0;
            let sentence = text[..end].trim();
            return (!sentence.is_empty()).then_some(sentence);
        }
    }
    None
}
