// src/services/attribution.rs

//! Contributor attribution extraction.
//!
//! A post body is scanned line by line. Editorial text passes through to the
//! body; trailing signature blocks ("Inkers on Duty:", "Production Team", ...)
//! and inline bylines ("By Jane Doe", "Layout by: John Smith") are turned into
//! a deduplicated list of contributor names.
//!
//! Line classification is driven by [`LINE_RULES`], an ordered table of
//! `(pattern, action)` pairs. The first matching rule wins; a line no rule
//! claims is body text. Every name, whether it came from a signature block or
//! a byline, goes through [`clean_name`] and [`is_valid_name`].

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::text::normalize;

/// Lines inside a signature block at least this long are not name lists.
pub const SIGNATURE_LINE_MAX: usize = 60;

/// Bylines at least this long are treated as body text.
pub const BYLINE_MAX: usize = 75;

/// Maximum whitespace-separated tokens in a contributor name.
pub const MAX_NAME_TOKENS: usize = 6;

/// Minimum characters in a contributor name.
pub const MIN_NAME_CHARS: usize = 3;

/// Phrases that open a signature block.
const SIGNATURE_MARKERS: &[&str] = &[
    r"journalists? on duty",
    r"jounalists? on duty",
    r"inkers? on duty",
    r"production team",
    r"ink contributors?",
];

/// Editorial role words, as whole words with their common inflections.
const ROLE_WORDS: &[&str] = &[
    r"illustrat(?:ion|ions|or|ors|ed|ing)",
    r"cartoon(?:s|ist|ists)?",
    r"graphics?",
    r"photo(?:s|graphs?|graphy|grapher|graphers)?",
    r"scriptwrit(?:er|ers|ing|ten)",
    r"writ(?:er|ers|ten|ing)",
    r"layouts?",
    r"art(?:s|ist|ists|work|works)?",
    r"contribut(?:or|ors|ion|ions|ed|ing)",
    r"news report(?:s|er|ers|ing)?",
    r"report(?:s|er|ers|ing|ed)?",
    r"video edit(?:s|or|ors|ing|ed)?",
    r"oversight",
];

/// Institutional abbreviation that is never part of a name.
const INSTITUTION_TOKEN: &str = "UMIHS";

/// Generic or institutional words that disqualify a name candidate.
const NAME_BLACKLIST: &[&str] = &[
    "the",
    "school",
    "page",
    "news",
    "event",
    "umihs",
    "campus",
    "editorial",
    "official",
    "student",
    "publication",
    "team",
    "inkers",
];

fn role_alternation() -> String {
    ROLE_WORDS.join("|")
}

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{})\b\s*:?",
        SIGNATURE_MARKERS.join("|")
    ))
    .unwrap()
});

static BYLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let roles = role_alternation();
    Regex::new(&format!(
        r"(?i)^by\b|^(?:{roles})\s+by\b|\b(?:{roles})\s+by\s*:"
    ))
    .unwrap()
});

static BY_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^.*\bby\b").unwrap());

static ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b(?:{})\b", role_alternation())).unwrap());

static INSTITUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{INSTITUTION_TOKEN}\b")).unwrap());

/// What a matching rule does with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Discard the line and switch to signature-block mode.
    OpenSignatureBlock,
    /// Treat the line as an inline byline (body state only).
    Byline,
}

/// One row of the line classification table.
pub struct LineRule {
    pub name: &'static str,
    pub pattern: &'static LazyLock<Regex>,
    /// The rule only applies to lines shorter than this many characters.
    pub max_chars: Option<usize>,
    pub action: LineAction,
}

impl LineRule {
    fn matches(&self, line: &str) -> bool {
        if let Some(max) = self.max_chars {
            if line.chars().count() >= max {
                return false;
            }
        }
        self.pattern.is_match(line)
    }
}

/// Line rules in precedence order.
pub static LINE_RULES: [LineRule; 2] = [
    LineRule {
        name: "signature-marker",
        pattern: &MARKER_RE,
        max_chars: None,
        action: LineAction::OpenSignatureBlock,
    },
    LineRule {
        name: "byline",
        pattern: &BYLINE_RE,
        max_chars: Some(BYLINE_MAX),
        action: LineAction::Byline,
    },
];

/// Action of the first rule matching a normalized line.
pub fn classify_line(line: &str) -> Option<LineAction> {
    LINE_RULES
        .iter()
        .find(|rule| rule.matches(line))
        .map(|rule| {
            log::debug!("Line matched {} rule: {}", rule.name, line);
            rule.action
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Body,
    SignatureBlock,
}

/// Result of splitting a post body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    /// Editorial text with original line breaks, trimmed
    pub body: String,
    /// Valid contributor names, first-seen order, no duplicates
    pub contributors: Vec<String>,
}

/// Split a post body into editorial text and contributor names.
pub fn extract(text: &str) -> Attribution {
    if text.trim().is_empty() {
        return Attribution::default();
    }

    let mut state = State::Body;
    let mut body_lines: Vec<&str> = Vec::new();
    let mut names: Vec<String> = Vec::new();

    for line in text.lines() {
        let raw = line.trim();
        if raw.is_empty() {
            if state == State::Body {
                body_lines.push(line);
            }
            continue;
        }

        let norm = normalize(raw);
        match (state, classify_line(&norm)) {
            (_, Some(LineAction::OpenSignatureBlock)) => {
                state = State::SignatureBlock;
            }
            (State::SignatureBlock, _) => {
                if norm.contains('#') || norm.chars().count() >= SIGNATURE_LINE_MAX {
                    continue;
                }
                names.extend(norm.split(['&', '/']).filter_map(name_candidate));
            }
            (State::Body, Some(LineAction::Byline)) => match name_candidate(&norm) {
                Some(name) => names.push(name),
                None => body_lines.push(line),
            },
            (State::Body, None) => body_lines.push(line),
        }
    }

    Attribution {
        body: body_lines.join("\n").trim().to_string(),
        contributors: dedup(names),
    }
}

/// Clean a raw segment and keep it only if it is a valid name.
fn name_candidate(raw: &str) -> Option<String> {
    let name = clean_name(raw);
    is_valid_name(&name).then_some(name)
}

/// Reduce a credit line or segment to a bare name.
pub fn clean_name(raw: &str) -> String {
    let text = raw.rsplit(':').next().unwrap_or(raw);
    let text = BY_PREFIX_RE.replace(text, "");
    let text = ROLE_RE.replace_all(&text, "");
    let text = MARKER_RE.replace_all(&text, "");
    let text = INSTITUTION_RE.replace_all(&text, "");
    let text = text.trim_matches(|c: char| c == '-' || c.is_whitespace());

    let swapped = match text.split_once(',') {
        Some((last, first)) if !first.contains(',') => format!("{} {}", first.trim(), last.trim()),
        _ => text.to_string(),
    };

    normalize(&swapped)
}

/// Whether a cleaned string looks like a person's name.
pub fn is_valid_name(name: &str) -> bool {
    if name.chars().count() < MIN_NAME_CHARS {
        return false;
    }
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > MAX_NAME_TOKENS {
        return false;
    }
    if tokens
        .iter()
        .any(|token| NAME_BLACKLIST.contains(&token.to_lowercase().as_str()))
    {
        return false;
    }
    name.chars().any(char::is_alphabetic)
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Known contributor names plus the names first seen during this run.
#[derive(Debug, Clone, Default)]
pub struct ContributorLookup {
    known: HashSet<String>,
    new: BTreeSet<String>,
}

impl ContributorLookup {
    pub fn new(known: impl IntoIterator<Item = String>) -> Self {
        Self {
            known: known.into_iter().collect(),
            new: BTreeSet::new(),
        }
    }

    /// Record names from one article; unknown names are remembered for export.
    pub fn observe(&mut self, names: &[String]) {
        for name in names {
            if !self.known.contains(name) {
                self.new.insert(name.clone());
            }
        }
    }

    /// Names absent from the lookup, sorted.
    pub fn new_names(&self) -> impl Iterator<Item = &str> {
        self.new.iter().map(String::as_str)
    }

    pub fn new_count(&self) -> usize {
        self.new.len()
    }
}
