//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Text normalization and title building (`normalize`, `build_title`)
//! - Slug assignment (`SlugRegistry`)
//! - Attribution extraction (`extract`, `ContributorLookup`)
//! - Category classification (`classify`)
//! - Paginated fetching with backoff (`PageFetcher`)
//! - Media resolution (`MediaResolver`)
//! - Concurrent media downloads (`DownloadPool`)

pub mod attribution;
pub mod classify;
pub mod downloader;
pub mod fetcher;
pub mod media;
pub mod slug;
pub mod text;
pub mod title;

pub use attribution::{Attribution, ContributorLookup, extract};
pub use classify::classify;
pub use downloader::{BatchOutcome, DownloadJob, DownloadPool, Downloader, HttpDownloader};
pub use fetcher::{BackoffPolicy, FetchError, JsonTransport, PageFetcher};
pub use media::MediaResolver;
pub use slug::SlugRegistry;
pub use text::normalize;
pub use title::{Title, build_title};
