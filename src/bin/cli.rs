//! Post Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use harvester::{
    error::{AppError, Result},
    models::{Config, ScrapeMode, is_valid_post_id},
    pipeline::Harvester,
    services::{BackoffPolicy, HttpDownloader, PageFetcher},
    storage::{LocalStorage, ScrapeStore},
    utils::{HttpTransport, create_download_client},
};
use tokio_util::sync::CancellationToken;

/// Harvester - Page Post Archiver
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvests page posts into article records with local media"
)]
struct Cli {
    /// Path to storage directory containing config and state files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch posts and write article records
    Scrape {
        /// Override the configured scrape mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Override the configured post cap
        #[arg(long)]
        max_posts: Option<usize>,
    },

    /// Resolve one post's media URLs into media_<POST_ID>.txt
    Media {
        /// Remote post identifier
        post_id: String,
    },

    /// Validate configuration and access token
    Validate,

    /// Show current state info
    Info,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    /// Stop at the stored watermark
    Incremental,
    /// Ignore the watermark
    Full,
}

impl From<ModeArg> for ScrapeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Incremental => ScrapeMode::Incremental,
            ModeArg::Full => ScrapeMode::Full,
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the token on Ctrl+C (or SIGTERM on unix).
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    log::error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        log::warn!("Interrupt received, finishing current post...");
        token.cancel();
    });
}

fn build_harvester(config: &Arc<Config>, storage: &LocalStorage) -> Result<Harvester> {
    let token = config.access_token()?;
    let transport = Arc::new(HttpTransport::from_config(&config.api)?);
    let fetcher = PageFetcher::new(transport, BackoffPolicy::from_config(&config.retry));
    let downloader = Arc::new(HttpDownloader::new(
        create_download_client(&config.api.user_agent)?,
        storage.root_dir(),
        &config.paths.media_dir,
        &config.downloader,
    ));
    Ok(Harvester::new(Arc::clone(config), fetcher, downloader, token))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Harvester starting...");

    // Load configuration
    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);

    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    if let Command::Scrape { mode, max_posts } = &cli.command {
        if let Some(mode) = mode {
            config.scrape.mode = (*mode).into();
        }
        if let Some(max_posts) = max_posts {
            config.scrape.max_posts = *max_posts;
        }
    }

    let config = Arc::new(config);
    let storage = LocalStorage::with_paths(&cli.storage_dir, config.paths.clone());

    match cli.command {
        Command::Scrape { .. } => {
            config.validate()?;
            if config.api.page_id.trim().is_empty() {
                return Err(AppError::config("api.page_id is not set"));
            }
            let harvester = build_harvester(&config, &storage)?;

            let cancel = CancellationToken::new();
            spawn_shutdown_listener(cancel.clone());

            let stats = harvester.run(&storage, &cancel).await?;

            log::info!(
                "Scrape {}: {} records, {} media ({} failed)",
                if stats.interrupted { "interrupted" } else { "complete" },
                stats.records,
                stats.media_downloaded,
                stats.media_failed
            );
        }

        Command::Media { post_id } => {
            if !is_valid_post_id(&post_id) {
                return Err(AppError::validation(format!("invalid post id: {post_id:?}")));
            }
            let harvester = build_harvester(&config, &storage)?;
            let descriptors = harvester.resolve_post_media(&post_id).await?;

            let urls: Vec<String> = descriptors.into_iter().map(|d| d.url).collect();
            let path = storage.write_media_list(&post_id, &urls).await?;
            log::info!("Saved {} media URLs to {}", urls.len(), path);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            match config.access_token() {
                Ok(_) => log::info!("✓ Access token found in {}", config.api.token_env),
                Err(e) => {
                    log::error!("{}", e);
                    return Err(e);
                }
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Mode: {:?}", config.scrape.mode);

            match storage.load_watermark().await? {
                Some(mark) => log::info!("Watermark: {}", mark),
                None => log::info!("Watermark: none"),
            }

            let known = storage.load_contributor_lookup().await?;
            log::info!("Known contributors: {}", known.len());

            let output_path = cli.storage_dir.join(&config.paths.output_file);
            if output_path.exists() {
                let content = tokio::fs::read_to_string(&output_path).await?;
                let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;
                log::info!("Output: {} records in {}", records.len(), output_path.display());
            } else {
                log::info!("Output: not found");
            }
        }
    }

    Ok(())
}
