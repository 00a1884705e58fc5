//! Local filesystem storage implementation.
//!
//! All writes go through a temp file followed by a rename, so an interrupted
//! run never leaves a half-written output or watermark behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, PathsConfig, RunStats, is_valid_post_id};
use crate::storage::ScrapeStore;

/// Indentation of every JSON file written.
const JSON_INDENT: &[u8] = b"    ";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    paths: PathsConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_paths(root_dir, PathsConfig::default())
    }

    /// Create a LocalStorage with custom file names.
    pub fn with_paths(root_dir: impl Into<PathBuf>, paths: PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            paths,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON with four-space indentation and unescaped non-ASCII text.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let mut bytes = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(JSON_INDENT));
        value.serialize(&mut serializer)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_text(&self, key: &str) -> Result<Option<String>> {
        match self.read_bytes(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AppError::validation(format!("{key} is not UTF-8: {e}"))),
            None => Ok(None),
        }
    }
}

/// Names from `name=alias` lookup lines; the part before `=` is the name.
pub fn parse_lookup(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(name, _)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Sorted, de-duplicated `name=name` lines.
pub fn format_contributors(names: &[String]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.iter().map(|n| format!("{n}={n}\n")).collect()
}

#[async_trait]
impl ScrapeStore for LocalStorage {
    async fn load_watermark(&self) -> Result<Option<String>> {
        Ok(self
            .read_text(&self.paths.watermark_file)
            .await?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    async fn save_watermark(&self, timestamp: &str) -> Result<()> {
        self.write_bytes(&self.paths.watermark_file, timestamp.as_bytes())
            .await
    }

    async fn load_contributor_lookup(&self) -> Result<Vec<String>> {
        match self.read_text(&self.paths.lookup_file).await? {
            Some(content) => Ok(parse_lookup(&content)),
            None => {
                log::debug!("No contributor lookup at {}", self.paths.lookup_file);
                Ok(Vec::new())
            }
        }
    }

    async fn write_new_contributors(&self, names: &[String]) -> Result<()> {
        let content = format_contributors(names);
        self.write_bytes(&self.paths.new_contributors_file, content.as_bytes())
            .await
    }

    async fn write_records(&self, records: &[ArticleRecord]) -> Result<()> {
        log::info!(
            "Writing {} records to {}",
            records.len(),
            self.paths.output_file
        );
        self.write_json(&self.paths.output_file, records).await
    }

    async fn write_stats(&self, stats: &RunStats) -> Result<()> {
        self.write_json(&self.paths.stats_file, stats).await
    }

    async fn write_media_list(&self, post_id: &str, urls: &[String]) -> Result<String> {
        if !is_valid_post_id(post_id) {
            return Err(AppError::validation(format!("invalid post id: {post_id:?}")));
        }
        let key = format!("media_{post_id}.txt");
        let content: String = urls.iter().map(|u| format!("{u}\n")).collect();
        self.write_bytes(&key, content.as_bytes()).await?;
        Ok(self.path(&key).display().to_string())
    }
}
