// src/pipeline/scrape.rs

//! Post harvesting pipeline.
//!
//! One control task walks the posts listing page by page and builds records
//! in API order. Media downloads for each post are fanned out to the shared
//! [`DownloadPool`] and joined before the record is appended.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{
    ArticleRecord, Config, MediaDescriptor, Page, RawPost, RunStats, ScrapeMode, Slug, to_blocks,
};
use crate::services::fetcher::first_page_params;
use crate::services::{
    ContributorLookup, DownloadPool, Downloader, MediaResolver, PageFetcher, SlugRegistry,
    build_title, classify, extract,
};
use crate::storage::ScrapeStore;
use crate::utils::redact_url;

/// Mutable state of one run, owned by the control task.
#[derive(Debug, Default)]
pub struct RunContext {
    pub slugs: SlugRegistry,
    pub contributors: ContributorLookup,
    pub records: Vec<ArticleRecord>,
}

impl RunContext {
    pub fn new(known_contributors: impl IntoIterator<Item = String>) -> Self {
        Self {
            slugs: SlugRegistry::new(),
            contributors: ContributorLookup::new(known_contributors),
            records: Vec::new(),
        }
    }
}

/// Build a record (without media) from a post with a message.
///
/// Registers the slug and any contributors in the run context.
pub fn build_record(post: &RawPost, message: &str, source_link: String, ctx: &mut RunContext) -> ArticleRecord {
    let (first_line, rest) = match message.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (message, ""),
    };

    let title = build_title(first_line);
    let slug = ctx.slugs.assign(&title.text);

    // A shortened title does not carry the whole first line, so keep it in the body.
    let body_text = if title.truncated { message } else { rest };
    let attribution = extract(body_text);
    ctx.contributors.observe(&attribution.contributors);

    ArticleRecord {
        published_at: post.created_time.clone(),
        category: classify(&title.text),
        title: title.text,
        source_link,
        body: to_blocks(&slug, &attribution.body),
        slug: Slug::new(slug),
        contributors: attribution.contributors,
        media: Vec::new(),
        doc_type: ArticleRecord::DOC_TYPE.to_string(),
    }
}

/// Newest of the stored and observed watermarks. Never moves backwards.
pub fn advance_watermark(stored: Option<&str>, observed: Option<&str>) -> Option<String> {
    match (stored, observed) {
        (Some(stored), Some(observed)) if observed > stored => Some(observed.to_string()),
        (Some(stored), _) => Some(stored.to_string()),
        (None, observed) => observed.map(str::to_string),
    }
}

/// Composes fetching, extraction and downloads into a full run.
pub struct Harvester {
    config: Arc<Config>,
    fetcher: PageFetcher,
    downloader: Arc<dyn Downloader>,
    token: String,
}

impl Harvester {
    pub fn new(
        config: Arc<Config>,
        fetcher: PageFetcher,
        downloader: Arc<dyn Downloader>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            config,
            fetcher,
            downloader,
            token: token.into(),
        }
    }

    /// Run one harvest and persist its results.
    ///
    /// Cancellation is observed between posts and during page fetches, album
    /// pages included. The post in progress is finished (downloads included)
    /// before results are saved.
    pub async fn run(&self, store: &dyn ScrapeStore, cancel: &CancellationToken) -> Result<RunStats> {
        let mut stats = RunStats::started(Utc::now());
        let scrape = &self.config.scrape;

        let stored_watermark = store.load_watermark().await?;
        let halt_at = match scrape.mode {
            ScrapeMode::Incremental => stored_watermark.clone(),
            ScrapeMode::Full => None,
        };
        match &halt_at {
            Some(mark) => log::info!("Incremental run, stopping at {}", mark),
            None => log::info!("Full run (max {} posts)", scrape.max_posts),
        }

        let known = store.load_contributor_lookup().await?;
        log::info!("Loaded {} known contributors", known.len());
        let mut ctx = RunContext::new(known);

        let pool = DownloadPool::start(self.downloader.clone(), self.config.downloader.workers);
        let resolver = MediaResolver::new(&self.fetcher, scrape.max_media_per_post).with_cancel(cancel);

        let mut newest: Option<String> = None;
        let mut next_url = Some(self.config.api.posts_url());
        let mut params = first_page_params(&self.config.api.fields, &self.token, self.config.api.page_size);

        'pages: while let Some(url) = next_url.take() {
            if ctx.records.len() >= scrape.max_posts {
                log::info!("Reached max posts ({})", scrape.max_posts);
                break;
            }

            let page: Page<Value> = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stats.interrupted = true;
                    break;
                }
                page = self.fetcher.fetch(&url, &params) => page,
            };
            // Cursor URLs carry their own query.
            params.clear();
            stats.pages += 1;

            if page.is_empty() {
                log::info!("No more posts at {}", redact_url(&url));
                break;
            }

            for item in page.items::<RawPost>() {
                if cancel.is_cancelled() {
                    stats.interrupted = true;
                    break 'pages;
                }
                if ctx.records.len() >= scrape.max_posts {
                    log::info!("Reached max posts ({})", scrape.max_posts);
                    break 'pages;
                }
                let post = match item {
                    Ok(post) => post,
                    Err(e) => {
                        log::warn!("Skipping malformed post: {}", e);
                        stats.posts_seen += 1;
                        stats.skipped += 1;
                        continue;
                    }
                };
                if let Some(mark) = &halt_at {
                    if post.created_time.as_str() <= mark.as_str() {
                        log::info!("Reached previously scraped content ({})", post.created_time);
                        break 'pages;
                    }
                }

                stats.posts_seen += 1;
                if newest.as_deref().is_none_or(|n| post.created_time.as_str() > n) {
                    newest = Some(post.created_time.clone());
                }

                let Some(message) = post.message() else {
                    log::debug!("Skipping post {} without message", post.id);
                    stats.skipped += 1;
                    continue;
                };

                let source_link = self.config.api.source_link(&post.id);
                let mut record = build_record(&post, message, source_link, &mut ctx);

                // Albums stop paging on cancel; what is resolved is still downloaded.
                let descriptors = resolver.resolve(post.attachments()).await;
                let outcome = pool.run_batch(record.slug(), &descriptors).await;
                stats.media_downloaded += outcome.items.len();
                stats.media_failed += outcome.failed;
                record.media = outcome.items;

                log::info!(
                    "[{}] {} | {} | media {}/{}",
                    ctx.records.len() + 1,
                    record.slug(),
                    record.category.as_str(),
                    record.media.len(),
                    descriptors.len()
                );
                ctx.records.push(record);
            }

            next_url = page.next().map(str::to_string);
        }

        if stats.interrupted {
            log::warn!("Interrupted, saving {} completed records", ctx.records.len());
        }
        pool.shutdown().await;

        self.persist(store, &ctx, stored_watermark.as_deref(), newest.as_deref(), &mut stats)
            .await?;
        Ok(stats)
    }

    async fn persist(
        &self,
        store: &dyn ScrapeStore,
        ctx: &RunContext,
        stored_watermark: Option<&str>,
        newest: Option<&str>,
        stats: &mut RunStats,
    ) -> Result<()> {
        stats.records = ctx.records.len();
        stats.new_contributors = ctx.contributors.new_count();

        if !ctx.records.is_empty() {
            store.write_records(&ctx.records).await?;
        }

        let new_names: Vec<String> = ctx.contributors.new_names().map(str::to_string).collect();
        if !new_names.is_empty() {
            log::info!("{} new contributors found", new_names.len());
            store.write_new_contributors(&new_names).await?;
        }

        let watermark = advance_watermark(stored_watermark, newest);
        if watermark.as_deref() != stored_watermark {
            if let Some(mark) = &watermark {
                store.save_watermark(mark).await?;
                log::info!("Watermark advanced to {}", mark);
            }
        }
        stats.watermark = watermark;

        stats.end_time = Utc::now();
        store.write_stats(stats).await?;

        log::info!(
            "Complete: {} records from {} posts ({} skipped) in {:.1}s",
            stats.records,
            stats.posts_seen,
            stats.skipped,
            stats.elapsed_secs()
        );
        Ok(())
    }

    /// Resolve the media of a single post without downloading it.
    pub async fn resolve_post_media(&self, post_id: &str) -> Result<Vec<MediaDescriptor>> {
        let url = self.config.api.post_url(post_id);
        let mut params = first_page_params(&self.config.api.fields, &self.token, 1);
        params.retain(|(key, _)| key != "limit");

        let post: RawPost = self
            .fetcher
            .try_get(&url, &params)
            .await
            .map_err(|e| AppError::fetch(redact_url(&url), e))?;

        let resolver = MediaResolver::new(&self.fetcher, self.config.scrape.max_media_per_post);
        Ok(resolver.resolve(post.attachments()).await)
    }
}
