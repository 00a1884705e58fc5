// src/services/media.rs

//! Media resolution: flatten a post's attachment tree into download descriptors.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::models::{Attachment, MediaDescriptor, MediaKind, Page};

use super::fetcher::PageFetcher;

/// Attachment type assumed when the API omits it.
const DEFAULT_ATTACHMENT_TYPE: &str = "photo";

/// Resolves attachments into an ordered, capped list of media descriptors.
pub struct MediaResolver<'a> {
    fetcher: &'a PageFetcher,
    max_items: usize,
    cancel: CancellationToken,
}

impl<'a> MediaResolver<'a> {
    pub fn new(fetcher: &'a PageFetcher, max_items: usize) -> Self {
        Self {
            fetcher,
            max_items,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop following album pages once `token` is cancelled.
    pub fn with_cancel(mut self, token: &CancellationToken) -> Self {
        self.cancel = token.clone();
        self
    }

    /// Resolve every attachment of a post, following album pagination.
    ///
    /// Descriptors keep encounter order; items without a usable URL are
    /// skipped. At most `max_items` descriptors are returned.
    pub async fn resolve(&self, attachments: &[Attachment]) -> Vec<MediaDescriptor> {
        let mut out = Vec::new();

        for attachment in attachments {
            if out.len() >= self.max_items {
                break;
            }

            match &attachment.subattachments {
                Some(first) => self.resolve_album(first, &mut out).await,
                None => self.push(attachment, &mut out),
            }
        }

        out
    }

    async fn resolve_album(&self, first: &Page<Attachment>, out: &mut Vec<MediaDescriptor>) {
        for item in &first.data {
            self.push(item, out);
        }
        let mut next = first.next().map(str::to_string);

        while let Some(url) = next.take() {
            if out.len() >= self.max_items {
                log::debug!("Album truncated at {} items", self.max_items);
                break;
            }

            let page: Page<Value> = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    log::info!("Interrupted, keeping {} resolved album items", out.len());
                    break;
                }
                page = self.fetcher.fetch(&url, &[]) => page,
            };

            for item in page.items::<Attachment>() {
                match item {
                    Ok(item) => self.push(&item, out),
                    Err(e) => log::warn!("Skipping malformed album item: {}", e),
                }
            }
            next = page.next().map(str::to_string);
        }
    }

    fn push(&self, item: &Attachment, out: &mut Vec<MediaDescriptor>) {
        if out.len() < self.max_items {
            if let Some(descriptor) = describe(item) {
                out.push(descriptor);
            }
        }
    }
}

/// Build a descriptor for one attachment node, if it has a media URL.
pub fn describe(item: &Attachment) -> Option<MediaDescriptor> {
    let url = media_url(item)?;
    let kind = MediaKind::from_type(item.kind.as_deref().unwrap_or(DEFAULT_ATTACHMENT_TYPE));
    let thumbnail_url = match kind {
        MediaKind::Video => thumbnail_url(item),
        MediaKind::Photo => None,
    };

    Some(MediaDescriptor {
        kind,
        url,
        thumbnail_url,
    })
}

/// Video source first, then the image source.
fn media_url(item: &Attachment) -> Option<String> {
    let media = item.media.as_ref()?;
    non_empty(media.source.as_deref())
        .or_else(|| non_empty(media.image.as_ref().and_then(|i| i.src.as_deref())))
}

/// First thumbnail entry, then the full picture, then the image source.
fn thumbnail_url(item: &Attachment) -> Option<String> {
    if let Some(first) = item.thumbnails.as_ref().and_then(|t| t.data.first()) {
        if let Some(url) = non_empty(first.uri.as_deref()).or_else(|| non_empty(first.src.as_deref())) {
            return Some(url);
        }
    }

    non_empty(item.full_picture.as_deref()).or_else(|| {
        non_empty(
            item.media
                .as_ref()
                .and_then(|m| m.image.as_ref())
                .and_then(|i| i.src.as_deref()),
        )
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
