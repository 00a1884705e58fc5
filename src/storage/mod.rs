//! Storage abstractions for scrape state and output.
//!
//! Everything a run reads or writes lives under one storage directory:
//!
//! ```text
//! {root}/
//! ├── fb_posts.json                  # Article records of the last run
//! ├── last_scrape.txt                # Watermark (newest processed timestamp)
//! ├── extracted_inkers_lookup.txt    # Known contributors, `name=...` per line
//! ├── extracted_inkers.txt           # Contributors new in the last run
//! ├── stats.json                     # Run statistics
//! └── media/                         # Downloaded assets
//!     ├── {slug}_{index}.jpg
//!     └── {slug}_{index}_thumb.jpg
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArticleRecord, RunStats};

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for scrape state backends.
#[async_trait]
pub trait ScrapeStore: Send + Sync {
    /// Timestamp of the newest post processed by an earlier run.
    async fn load_watermark(&self) -> Result<Option<String>>;

    async fn save_watermark(&self, timestamp: &str) -> Result<()>;

    /// Names already present in the contributor lookup.
    async fn load_contributor_lookup(&self) -> Result<Vec<String>>;

    /// Write newly seen contributors as sorted `name=name` lines.
    async fn write_new_contributors(&self, names: &[String]) -> Result<()>;

    /// Replace the output file with the given records.
    async fn write_records(&self, records: &[ArticleRecord]) -> Result<()>;

    async fn write_stats(&self, stats: &RunStats) -> Result<()>;

    /// Write one URL per line for a single post's media.
    async fn write_media_list(&self, post_id: &str, urls: &[String]) -> Result<String>;
}
