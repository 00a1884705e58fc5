//! Title-based category classification.

use crate::models::Category;

/// Ordered keyword rules; the first rule whose keyword occurs in the
/// lowercased title wins. "sport" also covers "sports".
const RULES: &[(&str, Category)] = &[
    ("sport", Category::Sports),
    ("news", Category::NewsAndAnnouncements),
    ("opinion", Category::Opinion),
    ("literature", Category::Literature),
    ("feature", Category::Feature),
];

/// Category used when no rule matches.
pub const DEFAULT_CATEGORY: Category = Category::NewsAndAnnouncements;

/// Classify an article by its title.
pub fn classify(title: &str) -> Category {
    let lowered = title.to_lowercase();
    RULES
        .iter()
        .find(|(keyword, _)| lowered.contains(*keyword))
        .map(|(_, category)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}
