//! Shapes of the remote posts API.
//!
//! Every field the harvester does not strictly need is optional so that
//! partially populated responses still deserialize.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cursor-paginated collection, used both for the top-level posts listing
/// and for nested attachment/thumbnail collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

impl<T> Page<T> {
    /// Opaque cursor URL of the following page, if any.
    pub fn next(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|next| !next.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Page<Value> {
    /// Decode the items one at a time.
    ///
    /// A malformed item yields an `Err` in its slot; its neighbours and the
    /// paging cursor are unaffected.
    pub fn items<T: DeserializeOwned>(&self) -> impl Iterator<Item = serde_json::Result<T>> + '_ {
        self.data.iter().map(|item| T::deserialize(item))
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            paging: None,
        }
    }
}

/// Paging links of a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

/// One post as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPost {
    pub id: String,

    /// Creation timestamp; compared lexicographically against the watermark
    #[serde(rename = "created_time", default)]
    pub created_time: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Page<Attachment>>,
}

impl RawPost {
    /// Non-blank message text, if the post has one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Top-level attachments of the post.
    pub fn attachments(&self) -> &[Attachment] {
        self.attachments
            .as_ref()
            .map(|page| page.data.as_slice())
            .unwrap_or_default()
    }
}

/// Whether a post identifier is safe to embed in a file name.
///
/// Remote ids are digits joined by underscores (`<page>_<post>`).
pub fn is_valid_post_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A single attachment node. Albums carry their items in `subattachments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<Page<Thumbnail>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subattachments: Option<Page<Attachment>>,
}

/// Media object of an attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaNode {
    /// Video source URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Thumbnail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// Structured error body: `{"error": {"code": 17, "message": "..."}}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}
