//! Pipeline entry points for harvester operations.
//!
//! - `Harvester::run`: Fetch posts, extract records, download media, persist
//! - `Harvester::resolve_post_media`: Resolve one post's media URLs

pub mod scrape;

pub use scrape::{Harvester, RunContext, advance_watermark, build_record};
