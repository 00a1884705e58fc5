//! End-to-end harvest runs over an in-memory API and downloader.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use harvester::error::{AppError, Result};
use harvester::models::{ArticleRecord, Config, MediaItem, RunStats, ScrapeMode};
use harvester::pipeline::Harvester;
use harvester::services::{BackoffPolicy, DownloadJob, Downloader, JsonTransport, PageFetcher};
use harvester::storage::{LocalStorage, ScrapeStore};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const POSTS_URL: &str = "https://api.test/v1/page/posts";
const PAGE_2: &str = "https://api.test/v1/page/posts?after=p2";
const PAGE_3: &str = "https://api.test/v1/page/posts?after=p3";
const ALBUM_2: &str = "https://api.test/v1/album?after=a2";

/// Serves fixed JSON bodies per URL and records every request.
///
/// A request to the `hang_on` URL cancels the given token and never returns.
#[derive(Default)]
struct FakeApi {
    pages: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
    hang_on: Option<(String, CancellationToken)>,
}

impl FakeApi {
    fn with(mut self, url: &str, body: Value) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    fn hanging_on(mut self, url: &str, cancel: &CancellationToken) -> Self {
        self.hang_on = Some((url.to_string(), cancel.clone()));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JsonTransport for FakeApi {
    async fn get_json(&self, url: &str, _params: &[(String, String)]) -> Result<Value> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some((hang_url, cancel)) = &self.hang_on {
            if hang_url == url {
                cancel.cancel();
                std::future::pending::<()>().await;
            }
        }
        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| json!({ "data": [] })))
    }
}

/// Pretends to download; fails for URLs containing "broken".
#[derive(Default)]
struct FakeDownloader {
    cancel_on_first: Option<CancellationToken>,
    jobs: Mutex<Vec<String>>,
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, job: &DownloadJob) -> Result<MediaItem> {
        self.jobs.lock().unwrap().push(job.file_name());
        if let Some(token) = &self.cancel_on_first {
            token.cancel();
        }
        if job.descriptor.url.contains("broken") {
            return Err(AppError::download(&job.descriptor.url, "HTTP 404 Not Found"));
        }
        Ok(MediaItem {
            kind: job.descriptor.kind,
            url: job.descriptor.url.clone(),
            local_path: format!("media/{}", job.file_name()),
            thumbnail: None,
        })
    }
}

fn photo(url: &str) -> Value {
    json!({ "type": "photo", "media": { "image": { "src": url } } })
}

fn post(id: &str, day: u32, message: Option<&str>, attachments: Option<Value>) -> Value {
    let mut value = json!({
        "id": id,
        "created_time": format!("2025-01-{day:02}T00:00:00+0000"),
    });
    if let Some(message) = message {
        value["message"] = json!(message);
    }
    if let Some(attachments) = attachments {
        value["attachments"] = attachments;
    }
    value
}

fn api() -> FakeApi {
    FakeApi::default()
        .with(
            POSTS_URL,
            json!({
                "data": [
                    post(
                        "p_6",
                        6,
                        Some("Sports Fest Opens\nThe games begin.\nInkers on Duty:\nAna Cruz & Ken Reyes"),
                        Some(json!({ "data": [
                            photo("https://cdn/a.jpg"),
                            {
                                "type": "album",
                                "subattachments": { "data": [
                                    photo("https://cdn/broken.jpg"),
                                    photo("https://cdn/c.jpg")
                                ] }
                            }
                        ] })),
                    ),
                    post("p_5", 5, None, None),
                    post("p_4", 4, Some("Campus News\nEnrollment opens Monday."), None),
                ],
                "paging": { "next": PAGE_2 }
            }),
        )
        .with(
            PAGE_2,
            json!({
                "data": [
                    post("p_3", 3, Some("Campus News\nSecond notice."), None),
                    post("p_2", 2, Some("Old Post\nAlready harvested."), None),
                    post("p_1", 1, Some("Older Post\nAlso harvested."), None),
                ],
                "paging": { "next": PAGE_3 }
            }),
        )
        .with(PAGE_3, json!({ "data": [post("p_0", 0, Some("Never reached"), None)] }))
}

fn config(mode: ScrapeMode) -> Config {
    let mut config = Config::default();
    config.api.base_url = "https://api.test".to_string();
    config.api.version = "v1".to_string();
    config.api.page_id = "page".to_string();
    config.downloader.workers = 3;
    config.scrape.mode = mode;
    config
}

fn harvester(config: Config, api: Arc<FakeApi>, downloader: Arc<FakeDownloader>) -> Harvester {
    let fetcher = PageFetcher::new(api, BackoffPolicy::default().without_delays());
    Harvester::new(Arc::new(config), fetcher, downloader, "token")
}

fn read_records(dir: &TempDir) -> Vec<ArticleRecord> {
    let content = std::fs::read_to_string(dir.path().join("fb_posts.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn incremental_run_stops_at_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    storage.save_watermark("2025-01-02T00:00:00+0000").await.unwrap();
    std::fs::write(dir.path().join("extracted_inkers_lookup.txt"), "Ana Cruz=Ana Cruz\n").unwrap();

    let api = Arc::new(api());
    let run = harvester(config(ScrapeMode::Incremental), api.clone(), Arc::default());
    let stats = run.run(&storage, &CancellationToken::new()).await.unwrap();

    let records = read_records(&dir);
    let times: Vec<_> = records.iter().map(|r| r.published_at.as_str()).collect();
    assert_eq!(
        times,
        vec![
            "2025-01-06T00:00:00+0000",
            "2025-01-04T00:00:00+0000",
            "2025-01-03T00:00:00+0000"
        ]
    );
    assert_eq!(api.calls(), vec![POSTS_URL.to_string(), PAGE_2.to_string()]);

    assert_eq!(stats.pages, 2);
    assert_eq!(stats.posts_seen, 4);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.records, 3);
    assert!(!stats.interrupted);

    assert_eq!(
        storage.load_watermark().await.unwrap().as_deref(),
        Some("2025-01-06T00:00:00+0000")
    );
}

#[tokio::test]
async fn records_carry_extraction_results_and_ordered_media() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    std::fs::write(dir.path().join("extracted_inkers_lookup.txt"), "Ana Cruz=Ana Cruz\n").unwrap();

    let run = harvester(config(ScrapeMode::Full), Arc::new(api()), Arc::default());
    let stats = run.run(&storage, &CancellationToken::new()).await.unwrap();

    let records = read_records(&dir);
    let first = &records[0];
    assert_eq!(first.title, "Sports Fest Opens");
    assert_eq!(first.slug(), "sports-fest-opens");
    assert_eq!(first.source_link, "https://facebook.com/p_6");
    assert_eq!(first.category.as_str(), "sports");
    assert_eq!(first.contributors, vec!["Ana Cruz", "Ken Reyes"]);
    assert_eq!(first.body.len(), 1);
    assert_eq!(first.body[0].children[0].text, "The games begin.");

    let paths: Vec<_> = first.media.iter().map(|m| m.local_path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["media/sports-fest-opens_0.jpg", "media/sports-fest-opens_2.jpg"]
    );
    assert_eq!(stats.media_downloaded, 2);
    assert_eq!(stats.media_failed, 1);

    // Same title twice in one run.
    assert_eq!(records[1].slug(), "campus-news");
    assert_eq!(records[2].slug(), "campus-news-1");
    assert_eq!(records[1].category.as_str(), "newsandannouncements");

    let new_names = std::fs::read_to_string(dir.path().join("extracted_inkers.txt")).unwrap();
    assert_eq!(new_names, "Ken Reyes=Ken Reyes\n");

    let stats_file: RunStats =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("stats.json")).unwrap())
            .unwrap();
    assert_eq!(stats_file.records, records.len());
}

#[tokio::test]
async fn full_run_ignores_watermark_and_honours_post_cap() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    storage.save_watermark("2025-01-05T00:00:00+0000").await.unwrap();

    let mut config = config(ScrapeMode::Full);
    config.scrape.max_posts = 4;
    let run = harvester(config, Arc::new(api()), Arc::default());
    let stats = run.run(&storage, &CancellationToken::new()).await.unwrap();

    let records = read_records(&dir);
    assert_eq!(records.len(), 4);
    assert_eq!(records[3].published_at, "2025-01-02T00:00:00+0000");
    assert_eq!(stats.records, 4);
    assert_eq!(
        storage.load_watermark().await.unwrap().as_deref(),
        Some("2025-01-06T00:00:00+0000")
    );
}

#[tokio::test]
async fn older_posts_do_not_move_watermark_back() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    storage.save_watermark("2025-02-01T00:00:00+0000").await.unwrap();

    let run = harvester(config(ScrapeMode::Full), Arc::new(api()), Arc::default());
    let stats = run.run(&storage, &CancellationToken::new()).await.unwrap();

    assert!(stats.records > 0);
    assert_eq!(
        storage.load_watermark().await.unwrap().as_deref(),
        Some("2025-02-01T00:00:00+0000")
    );
}

#[tokio::test]
async fn interrupt_finishes_current_post_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let cancel = CancellationToken::new();
    let downloader = Arc::new(FakeDownloader {
        cancel_on_first: Some(cancel.clone()),
        ..FakeDownloader::default()
    });

    let api = Arc::new(api());
    let run = harvester(config(ScrapeMode::Full), api.clone(), downloader.clone());
    let stats = run.run(&storage, &cancel).await.unwrap();

    assert!(stats.interrupted);
    let records = read_records(&dir);
    assert_eq!(records.len(), 1);
    // All three downloads of the interrupted post were still awaited.
    assert_eq!(downloader.jobs.lock().unwrap().len(), 3);
    assert_eq!(records[0].media.len(), 2);
    assert_eq!(api.calls(), vec![POSTS_URL.to_string()]);
    assert_eq!(
        storage.load_watermark().await.unwrap().as_deref(),
        Some("2025-01-06T00:00:00+0000")
    );
}

#[tokio::test]
async fn empty_listing_writes_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    let run = harvester(config(ScrapeMode::Incremental), Arc::new(FakeApi::default()), Arc::default());
    let stats = run.run(&storage, &CancellationToken::new()).await.unwrap();

    assert_eq!(stats.records, 0);
    assert!(!dir.path().join("fb_posts.json").exists());
    assert!(!dir.path().join("extracted_inkers.txt").exists());
    assert!(storage.load_watermark().await.unwrap().is_none());
    assert!(dir.path().join("stats.json").exists());
}

#[tokio::test]
async fn malformed_post_is_skipped_without_losing_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    let mut no_id = post("unused", 2, Some("Lost Post\nNo identifier."), None);
    no_id.as_object_mut().unwrap().remove("id");
    let api = FakeApi::default()
        .with(
            POSTS_URL,
            json!({
                "data": [
                    post("p_3", 3, Some("First Story\nBody one."), None),
                    no_id,
                    post("p_1", 1, Some("Third Story\nBody three."), None),
                ],
                "paging": { "next": PAGE_2 }
            }),
        )
        .with(PAGE_2, json!({ "data": [post("p_0", 0, Some("Last Story\nBody."), None)] }));

    let run = harvester(config(ScrapeMode::Full), Arc::new(api), Arc::default());
    let stats = run.run(&storage, &CancellationToken::new()).await.unwrap();

    let titles: Vec<_> = read_records(&dir).into_iter().map(|r| r.title).collect();
    assert_eq!(titles, vec!["First Story", "Third Story", "Last Story"]);
    assert_eq!(stats.pages, 2);
    assert_eq!(stats.posts_seen, 4);
    assert_eq!(stats.skipped, 1);
}

#[tokio::test]
async fn interrupt_during_page_fetch_saves_completed_pages() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let cancel = CancellationToken::new();

    let api = Arc::new(api().hanging_on(PAGE_2, &cancel));
    let run = harvester(config(ScrapeMode::Full), api.clone(), Arc::default());
    let stats = tokio::time::timeout(Duration::from_secs(5), run.run(&storage, &cancel))
        .await
        .expect("run did not stop after cancellation")
        .unwrap();

    assert!(stats.interrupted);
    assert_eq!(api.calls(), vec![POSTS_URL.to_string(), PAGE_2.to_string()]);
    let records = read_records(&dir);
    assert_eq!(records.len(), 2);
    assert_eq!(
        storage.load_watermark().await.unwrap().as_deref(),
        Some("2025-01-06T00:00:00+0000")
    );
}

#[tokio::test]
async fn interrupt_during_album_fetch_keeps_resolved_media() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let cancel = CancellationToken::new();

    let album = json!({ "data": [{
        "type": "album",
        "subattachments": {
            "data": [photo("https://cdn/a1.jpg"), photo("https://cdn/a2.jpg")],
            "paging": { "next": ALBUM_2 }
        }
    }] });
    let api = FakeApi::default()
        .with(
            POSTS_URL,
            json!({
                "data": [
                    post("p_9", 9, Some("Album Day\nPhotos inside."), Some(album)),
                    post("p_8", 8, Some("Next Story\nBody."), None),
                ],
                "paging": { "next": PAGE_2 }
            }),
        )
        .with(ALBUM_2, json!({ "data": [photo("https://cdn/a3.jpg")] }))
        .hanging_on(ALBUM_2, &cancel);
    let api = Arc::new(api);
    let downloader = Arc::new(FakeDownloader::default());

    let run = harvester(config(ScrapeMode::Full), api.clone(), downloader.clone());
    let stats = tokio::time::timeout(Duration::from_secs(5), run.run(&storage, &cancel))
        .await
        .expect("run did not stop after cancellation")
        .unwrap();

    assert!(stats.interrupted);
    assert_eq!(api.calls(), vec![POSTS_URL.to_string(), ALBUM_2.to_string()]);

    let records = read_records(&dir);
    assert_eq!(records.len(), 1);
    let urls: Vec<_> = records[0].media.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(urls, vec!["https://cdn/a1.jpg", "https://cdn/a2.jpg"]);
    assert_eq!(downloader.jobs.lock().unwrap().len(), 2);
    assert_eq!(
        storage.load_watermark().await.unwrap().as_deref(),
        Some("2025-01-09T00:00:00+0000")
    );
}

