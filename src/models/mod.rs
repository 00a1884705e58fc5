// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod article;
mod config;
mod post;
mod stats;

// Re-export all public types
pub use article::{
    ArticleRecord, Block, Category, MediaDescriptor, MediaItem, MediaKind, Slug, Span, to_blocks,
};
pub use config::{
    ApiConfig, Config, DownloaderConfig, PathsConfig, RetryConfig, ScrapeConfig, ScrapeMode,
};
pub use post::{
    ApiError, ApiErrorBody, Attachment, ImageNode, MediaNode, Page, Paging, RawPost, Thumbnail,
    is_valid_post_id,
};
pub use stats::RunStats;
