//! Unique URL-safe identifiers for article titles.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Slug used when a title has no slug-safe characters.
const FALLBACK_SLUG: &str = "post";

/// Assigns slugs for one run. Create a fresh registry per run.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    counters: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase, hyphen-separated form of a title.
    pub fn base(title: &str) -> String {
        let lowered = title.to_lowercase();
        let slug = NON_SLUG_RE.replace_all(&lowered, "-");
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            FALLBACK_SLUG.to_string()
        } else {
            slug.to_string()
        }
    }

    /// Assign a slug that no earlier call of this registry returned.
    ///
    /// The first occurrence of a base gets the base itself, repeats get
    /// `base-1`, `base-2`, ... skipping any value already handed out.
    pub fn assign(&mut self, title: &str) -> String {
        let base = Self::base(title);

        if !self.counters.contains_key(&base) {
            self.counters.insert(base.clone(), 0);
            if self.issued.insert(base.clone()) {
                return base;
            }
        }

        let counter = self.counters.entry(base.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}-{counter}");
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Number of slugs issued so far.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
