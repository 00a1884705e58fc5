//! Run statistics written after every scrape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters collected during one harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Posts pages fetched
    pub pages: usize,
    /// Posts examined, including skipped ones
    pub posts_seen: usize,
    pub records: usize,
    /// Posts without a message
    pub skipped: usize,
    pub media_downloaded: usize,
    pub media_failed: usize,
    pub new_contributors: usize,
    /// Stopped by a cancellation request
    pub interrupted: bool,
    /// Watermark stored at the end of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
}

impl RunStats {
    pub fn started(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: start_time,
            pages: 0,
            posts_seen: 0,
            records: 0,
            skipped: 0,
            media_downloaded: 0,
            media_failed: 0,
            new_contributors: 0,
            interrupted: false,
            watermark: None,
        }
    }

    /// Wall-clock duration in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
