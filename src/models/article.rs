//! Article record data structures written to the output file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content category of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sports,
    #[serde(rename = "newsandannouncements")]
    NewsAndAnnouncements,
    Opinion,
    Literature,
    Feature,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sports => "sports",
            Category::NewsAndAnnouncements => "newsandannouncements",
            Category::Opinion => "opinion",
            Category::Literature => "literature",
            Category::Feature => "feature",
        }
    }
}

/// Kind of a media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Classify an attachment type string (`photo`, `video_inline`, `album`, ...).
    pub fn from_type(kind: &str) -> Self {
        if kind.to_lowercase().contains("video") {
            MediaKind::Video
        } else {
            MediaKind::Photo
        }
    }

    /// File extension used for downloaded assets of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// A resolved media asset prior to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub url: String,
    /// Preview image, only resolved for videos
    pub thumbnail_url: Option<String>,
}

/// A downloaded media asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,

    pub url: String,

    #[serde(rename = "localPath")]
    pub local_path: String,

    /// Local path of the video thumbnail
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Slug value in the shape expected by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slug {
    #[serde(rename = "_type")]
    pub kind: String,
    pub current: String,
}

impl Slug {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            kind: "slug".to_string(),
            current: current.into(),
        }
    }
}

/// A paragraph block of portable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(rename = "_key")]
    pub key: String,
    pub style: String,
    #[serde(rename = "markDefs")]
    pub mark_defs: Vec<serde_json::Value>,
    pub children: Vec<Span>,
}

/// An inline text span of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(rename = "_key")]
    pub key: String,
    pub text: String,
    pub marks: Vec<String>,
}

/// Convert body text into paragraph blocks, one per non-blank line.
///
/// Keys are derived from the slug, the block position and its text, so the
/// same record always serializes identically.
pub fn to_blocks(slug: &str, text: &str) -> Vec<Block> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| Block {
            kind: "block".to_string(),
            key: stable_key(&[slug, "block", &index.to_string(), line]),
            style: "normal".to_string(),
            mark_defs: Vec::new(),
            children: vec![Span {
                kind: "span".to_string(),
                key: stable_key(&[slug, "span", &index.to_string(), line]),
                text: line.to_string(),
                marks: Vec::new(),
            }],
        })
        .collect()
}

/// First 12 hex chars of the SHA-256 over the given parts.
fn stable_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let mut key = hex::encode(hasher.finalize());
    key.truncate(12);
    key
}

/// One extracted article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "publishedAt")]
    pub published_at: String,

    pub title: String,

    /// Canonical link to the source post
    #[serde(rename = "fbLink")]
    pub source_link: String,

    #[serde(rename = "linkName")]
    pub slug: Slug,

    pub body: Vec<Block>,

    #[serde(rename = "inkersOnDuty")]
    pub contributors: Vec<String>,

    pub media: Vec<MediaItem>,

    #[serde(rename = "type")]
    pub category: Category,

    #[serde(rename = "_type")]
    pub doc_type: String,
}

impl ArticleRecord {
    pub const DOC_TYPE: &'static str = "article";

    /// Slug string of this record.
    pub fn slug(&self) -> &str {
        &self.slug.current
    }
}
