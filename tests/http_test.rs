//! HTTP transport and downloader tests against a local mock server.

use std::sync::Arc;

use harvester::models::{
    ApiConfig, DownloaderConfig, MediaDescriptor, MediaKind, Page, RawPost,
};
use harvester::services::{
    BackoffPolicy, DownloadJob, DownloadPool, Downloader, HttpDownloader, JsonTransport,
    PageFetcher,
};
use harvester::utils::{HttpTransport, create_download_client};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader(dir: &TempDir) -> HttpDownloader {
    HttpDownloader::new(
        create_download_client("harvester-test").unwrap(),
        dir.path(),
        "media",
        &DownloaderConfig::default(),
    )
}

fn job(slug: &str, index: usize, kind: MediaKind, url: String, thumb: Option<String>) -> DownloadJob {
    DownloadJob {
        slug: slug.to_string(),
        index,
        descriptor: MediaDescriptor {
            kind,
            url,
            thumbnail_url: thumb,
        },
    }
}

#[tokio::test]
async fn downloads_photo_to_named_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 100_000]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let item = downloader(&dir)
        .download(&job("post", 0, MediaKind::Photo, format!("{}/a.jpg", server.uri()), None))
        .await
        .unwrap();

    assert_eq!(item.local_path, "media/post_0.jpg");
    assert_eq!(item.thumbnail, None);
    let bytes = std::fs::read(dir.path().join("media/post_0.jpg")).unwrap();
    assert_eq!(bytes.len(), 100_000);
    assert!(!dir.path().join("media/post_0.jpg.part").exists());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let result = downloader(&dir)
        .download(&job("post", 1, MediaKind::Photo, format!("{}/missing.jpg", server.uri()), None))
        .await;

    assert!(result.is_err());
    assert!(!dir.path().join("media/post_1.jpg").exists());
}

#[tokio::test]
async fn video_gets_thumbnail_and_tolerates_thumbnail_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/thumb.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = downloader(&dir);

    let with_thumb = downloader
        .download(&job(
            "clip",
            0,
            MediaKind::Video,
            format!("{}/v.mp4", server.uri()),
            Some(format!("{}/thumb.jpg", server.uri())),
        ))
        .await
        .unwrap();
    assert_eq!(with_thumb.local_path, "media/clip_0.mp4");
    assert_eq!(with_thumb.thumbnail.as_deref(), Some("media/clip_0_thumb.jpg"));
    assert_eq!(
        std::fs::read(dir.path().join("media/clip_0_thumb.jpg")).unwrap(),
        b"thumb"
    );

    let without_thumb = downloader
        .download(&job(
            "clip",
            1,
            MediaKind::Video,
            format!("{}/v.mp4", server.uri()),
            Some(format!("{}/gone.jpg", server.uri())),
        ))
        .await
        .unwrap();
    assert_eq!(without_thumb.local_path, "media/clip_1.mp4");
    assert_eq!(without_thumb.thumbnail, None);
}

#[tokio::test]
async fn pool_omits_failed_downloads() {
    let server = MockServer::start().await;
    for name in ["/0.jpg", "/2.jpg"] {
        Mock::given(method("GET"))
            .and(path(name))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let pool = DownloadPool::start(Arc::new(downloader(&dir)), 2);
    let descriptors: Vec<_> = (0..3)
        .map(|n| MediaDescriptor {
            kind: MediaKind::Photo,
            url: format!("{}/{n}.jpg", server.uri()),
            thumbnail_url: None,
        })
        .collect();

    let outcome = pool.run_batch("album", &descriptors).await;
    pool.shutdown().await;

    let paths: Vec<_> = outcome.items.iter().map(|i| i.local_path.as_str()).collect();
    assert_eq!(paths, vec!["media/album_0.jpg", "media/album_2.jpg"]);
    assert_eq!(outcome.failed, 1);
}

#[tokio::test]
async fn transport_returns_error_bodies_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/page/posts"))
        .and(query_param("limit", "15"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 190, "message": "Invalid OAuth access token" }
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::from_config(&ApiConfig::default()).unwrap();
    let params = vec![("limit".to_string(), "15".to_string())];
    let value = transport
        .get_json(&format!("{}/v1/page/posts", server.uri()), &params)
        .await
        .unwrap();
    assert_eq!(value["error"]["code"], 190);
}

#[tokio::test]
async fn fetcher_reads_pages_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/page/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "1", "created_time": "2025-01-01T00:00:00+0000", "message": "Hi" }],
            "paging": { "next": format!("{}/v1/page/posts?after=x", server.uri()) }
        })))
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::from_config(&ApiConfig::default()).unwrap());
    let fetcher = PageFetcher::new(transport, BackoffPolicy::default().without_delays());
    let page: Page<RawPost> = fetcher
        .fetch(&format!("{}/v1/page/posts", server.uri()), &[])
        .await;

    assert_eq!(page.data.len(), 1);
    assert!(page.next().unwrap().ends_with("after=x"));
}
