// src/services/downloader.rs

//! Media downloads through a fixed pool of workers.
//!
//! The pool is started once per run. Each post's descriptors are queued as a
//! batch; results come back in any order and are re-sorted by index, so the
//! record's media list always matches the resolver's encounter order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{DownloaderConfig, MediaDescriptor, MediaItem, MediaKind};

/// One unit of download work.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub slug: String,
    /// Position of the descriptor within its post
    pub index: usize,
    pub descriptor: MediaDescriptor,
}

impl DownloadJob {
    /// `{slug}_{index}.{ext}`
    pub fn file_name(&self) -> String {
        format!("{}_{}.{}", self.slug, self.index, self.descriptor.kind.extension())
    }

    /// `{slug}_{index}_thumb.jpg`
    pub fn thumbnail_name(&self) -> String {
        format!("{}_{}_thumb.jpg", self.slug, self.index)
    }
}

/// Fetches one job's asset (and thumbnail) to local storage.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, job: &DownloadJob) -> Result<MediaItem>;
}

/// Streams assets over HTTP into the media directory.
#[derive(Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    /// Filesystem location of the media directory
    media_dir: PathBuf,
    /// Media directory as written into records
    media_prefix: String,
    timeout: Duration,
    thumbnail_timeout: Duration,
}

impl HttpDownloader {
    pub fn new(
        client: reqwest::Client,
        root_dir: impl Into<PathBuf>,
        media_dir: &str,
        config: &DownloaderConfig,
    ) -> Self {
        let media_prefix = media_dir.trim_end_matches('/').to_string();
        Self {
            client,
            media_dir: root_dir.into().join(&media_prefix),
            media_prefix,
            timeout: config.timeout(),
            thumbnail_timeout: config.thumbnail_timeout(),
        }
    }

    fn local_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.media_prefix, file_name)
    }

    /// Stream `url` into `file_name`, replacing any previous file atomically.
    async fn fetch_to(&self, url: &str, file_name: &str, timeout: Duration) -> Result<u64> {
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::download(url, e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::download(url, format!("HTTP {status}")));
        }

        let path = self.media_dir.join(file_name);
        let tmp = self.media_dir.join(format!("{file_name}.part"));

        let written = match stream_to_file(response, &tmp, url).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&tmp, &path).await?;
        Ok(written)
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path, url: &str) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::download(url, e.without_url()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, job: &DownloadJob) -> Result<MediaItem> {
        let descriptor = &job.descriptor;
        let file_name = job.file_name();
        let bytes = self.fetch_to(&descriptor.url, &file_name, self.timeout).await?;
        log::debug!("Saved {} ({} bytes)", file_name, bytes);

        let thumbnail = match (descriptor.kind, descriptor.thumbnail_url.as_deref()) {
            (MediaKind::Video, Some(thumb_url)) => {
                let thumb_name = job.thumbnail_name();
                match self
                    .fetch_to(thumb_url, &thumb_name, self.thumbnail_timeout)
                    .await
                {
                    Ok(_) => Some(self.local_path(&thumb_name)),
                    Err(e) => {
                        log::warn!("Thumbnail for {} failed: {}", file_name, e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(MediaItem {
            kind: descriptor.kind,
            url: descriptor.url.clone(),
            local_path: self.local_path(&file_name),
            thumbnail,
        })
    }
}

/// Result of downloading one post's media.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successful downloads in descriptor order
    pub items: Vec<MediaItem>,
    pub failed: usize,
}

struct Task {
    job: DownloadJob,
    reply: mpsc::UnboundedSender<(usize, Result<MediaItem>)>,
}

/// Fixed set of download workers sharing one job queue.
pub struct DownloadPool {
    sender: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl DownloadPool {
    /// Spawn `workers` tasks. Must be called inside a tokio runtime.
    pub fn start(downloader: Arc<dyn Downloader>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Task>(workers * 2);
        let queue = Arc::new(Mutex::new(receiver));

        let workers = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, downloader.clone(), queue.clone())))
            .collect();

        Self { sender, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Download all descriptors of one post and wait for every result.
    ///
    /// Failed items are logged and omitted.
    pub async fn run_batch(&self, slug: &str, descriptors: &[MediaDescriptor]) -> BatchOutcome {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let mut outcome = BatchOutcome::default();

        for (index, descriptor) in descriptors.iter().enumerate() {
            let task = Task {
                job: DownloadJob {
                    slug: slug.to_string(),
                    index,
                    descriptor: descriptor.clone(),
                },
                reply: reply_tx.clone(),
            };
            if self.sender.send(task).await.is_err() {
                log::error!("Download queue closed; dropping {}_{}", slug, index);
                outcome.failed += 1;
            }
        }
        drop(reply_tx);

        let mut finished = Vec::with_capacity(descriptors.len());
        while let Some((index, result)) = reply_rx.recv().await {
            match result {
                Ok(item) => finished.push((index, item)),
                Err(e) => {
                    log::warn!("Download {}_{} failed: {}", slug, index, e);
                    outcome.failed += 1;
                }
            }
        }

        finished.sort_by_key(|(index, _)| *index);
        outcome.items = finished.into_iter().map(|(_, item)| item).collect();
        outcome
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.workers {
            if let Err(e) = handle.await {
                log::error!("Download worker panicked: {}", e);
            }
        }
    }
}

async fn worker_loop(id: usize, downloader: Arc<dyn Downloader>, queue: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        let task = queue.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };

        let result = downloader.download(&task.job).await;
        // The batch may have been abandoned; nothing to do then.
        let _ = task.reply.send((task.job.index, result));
    }
    log::debug!("Download worker {} stopped", id);
}
