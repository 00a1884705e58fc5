//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API endpoint and request settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Run limits and scrape mode
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Backoff policy for page requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Media downloader settings
    #[serde(default)]
    pub downloader: DownloaderConfig,

    /// Output and state file locations, relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)?;
        url::Url::parse(&self.api.source_link_base)?;
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.page_size == 0 {
            return Err(AppError::validation("api.page_size must be > 0"));
        }
        if self.api.token_env.trim().is_empty() {
            return Err(AppError::validation("api.token_env is empty"));
        }
        if self.scrape.max_posts == 0 {
            return Err(AppError::validation("scrape.max_posts must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.downloader.workers == 0 {
            return Err(AppError::validation("downloader.workers must be > 0"));
        }
        if self.downloader.timeout_secs == 0 {
            return Err(AppError::validation(
                "downloader.timeout_secs must be > 0",
            ));
        }
        Ok(())
    }

    /// Read the API access token from the configured environment variable.
    pub fn access_token(&self) -> Result<String> {
        std::env::var(&self.api.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "environment variable {} is not set",
                    self.api.token_env
                ))
            })
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API host, e.g. `https://graph.facebook.com`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// API version path segment
    #[serde(default = "defaults::version")]
    pub version: String,

    /// Identifier of the page whose posts are harvested
    #[serde(default)]
    pub page_id: String,

    /// Posts requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Field selector sent with the first page request
    #[serde(default = "defaults::fields")]
    pub fields: String,

    /// Environment variable holding the access token
    #[serde(default = "defaults::token_env")]
    pub token_env: String,

    /// Prefix of the canonical source link written into each record
    #[serde(default = "defaults::source_link_base")]
    pub source_link_base: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::api_timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// URL of the first posts page.
    pub fn posts_url(&self) -> String {
        format!(
            "{}/{}/{}/posts",
            self.base_url.trim_end_matches('/'),
            self.version.trim_matches('/'),
            self.page_id
        )
    }

    /// URL of a single post, used by the media inspection command.
    pub fn post_url(&self, post_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.version.trim_matches('/'),
            post_id
        )
    }

    /// Canonical public link for a post.
    pub fn source_link(&self, post_id: &str) -> String {
        format!("{}/{}", self.source_link_base.trim_end_matches('/'), post_id)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            version: defaults::version(),
            page_id: String::new(),
            page_size: defaults::page_size(),
            fields: defaults::fields(),
            token_env: defaults::token_env(),
            source_link_base: defaults::source_link_base(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::api_timeout(),
        }
    }
}

/// Whether a run stops at the persisted watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    /// Stop at the first post at or below the watermark
    #[default]
    Incremental,
    /// Ignore the watermark and harvest up to `max_posts`
    Full,
}

/// Run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub mode: ScrapeMode,

    /// Maximum records produced by one run
    #[serde(default = "defaults::max_posts")]
    pub max_posts: usize,

    /// Maximum media descriptors resolved for a single post
    #[serde(default = "defaults::max_media_per_post")]
    pub max_media_per_post: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            mode: ScrapeMode::default(),
            max_posts: defaults::max_posts(),
            max_media_per_post: defaults::max_media_per_post(),
        }
    }
}

/// Retry/backoff settings for page requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts made for retryable API error codes
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay in seconds, multiplied by `2^attempt`
    #[serde(default = "defaults::base_delay")]
    pub base_delay_secs: u64,

    /// Fixed delay added to every backoff, in seconds
    #[serde(default = "defaults::floor")]
    pub floor_secs: u64,

    /// Delay before the single retry after a transport failure
    #[serde(default = "defaults::transport_delay")]
    pub transport_delay_secs: u64,

    /// API error codes meaning "rate limited" or "temporarily unavailable"
    #[serde(default = "defaults::retryable_codes")]
    pub retryable_codes: Vec<i64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_secs: defaults::base_delay(),
            floor_secs: defaults::floor(),
            transport_delay_secs: defaults::transport_delay(),
            retryable_codes: defaults::retryable_codes(),
        }
    }
}

/// Media downloader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Fixed number of download workers
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Timeout for a media file, in seconds
    #[serde(default = "defaults::download_timeout")]
    pub timeout_secs: u64,

    /// Timeout for a video thumbnail, in seconds
    #[serde(default = "defaults::thumbnail_timeout")]
    pub thumbnail_timeout_secs: u64,
}

impl DownloaderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn thumbnail_timeout(&self) -> Duration {
        Duration::from_secs(self.thumbnail_timeout_secs)
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            timeout_secs: defaults::download_timeout(),
            thumbnail_timeout_secs: defaults::thumbnail_timeout(),
        }
    }
}

/// File locations relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::output_file")]
    pub output_file: String,

    #[serde(default = "defaults::media_dir")]
    pub media_dir: String,

    #[serde(default = "defaults::watermark_file")]
    pub watermark_file: String,

    #[serde(default = "defaults::lookup_file")]
    pub lookup_file: String,

    #[serde(default = "defaults::new_contributors_file")]
    pub new_contributors_file: String,

    #[serde(default = "defaults::stats_file")]
    pub stats_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_file: defaults::output_file(),
            media_dir: defaults::media_dir(),
            watermark_file: defaults::watermark_file(),
            lookup_file: defaults::lookup_file(),
            new_contributors_file: defaults::new_contributors_file(),
            stats_file: defaults::stats_file(),
        }
    }
}

mod defaults {
    // API defaults
    pub fn base_url() -> String {
        "https://graph.facebook.com".into()
    }
    pub fn version() -> String {
        "v21.0".into()
    }
    pub fn page_size() -> usize {
        15
    }
    pub fn fields() -> String {
        "created_time,message,id,attachments{media,type,full_picture,thumbnails,\
         subattachments.limit(100){media,type,full_picture,thumbnails}}"
            .into()
    }
    pub fn token_env() -> String {
        "PAGE_ACCESS_TOKEN".into()
    }
    pub fn source_link_base() -> String {
        "https://facebook.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; harvester/0.1)".into()
    }
    pub fn api_timeout() -> u64 {
        30
    }

    // Scrape defaults
    pub fn max_posts() -> usize {
        490
    }
    pub fn max_media_per_post() -> usize {
        1000
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn base_delay() -> u64 {
        1
    }
    pub fn floor() -> u64 {
        5
    }
    pub fn transport_delay() -> u64 {
        2
    }
    pub fn retryable_codes() -> Vec<i64> {
        vec![4, 17, 32, 613]
    }

    // Downloader defaults
    pub fn workers() -> usize {
        15
    }
    pub fn download_timeout() -> u64 {
        20
    }
    pub fn thumbnail_timeout() -> u64 {
        15
    }

    // Path defaults
    pub fn output_file() -> String {
        "fb_posts.json".into()
    }
    pub fn media_dir() -> String {
        "media".into()
    }
    pub fn watermark_file() -> String {
        "last_scrape.txt".into()
    }
    pub fn lookup_file() -> String {
        "extracted_inkers_lookup.txt".into()
    }
    pub fn new_contributors_file() -> String {
        "extracted_inkers.txt".into()
    }
    pub fn stats_file() -> String {
        "stats.json".into()
    }
}
