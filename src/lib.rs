//! Multi-source manga chapter downloader.
//!
//! Given a series URL and a chapter selector, resolves the chapter list
//! through a site-specific adapter, queues the selected chapters and
//! packages each one as a CBZ archive. The queue retries transient network
//! failures, checkpoints per-page progress so interrupted downloads resume
//! after a restart, and streams progress events to whatever front end is
//! embedding it.

pub mod assembler;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod models;
pub mod queue;
pub mod selector;
pub mod sources;
pub mod util;

use std::sync::Arc;

pub use config::{DownloadConfig, HttpConfig};
pub use error::{Error, Result};
pub use fetcher::{FetchedPage, HttpPageFetcher, PageFetch};
pub use models::{Chapter, ChapterNumber, Page, Series};
pub use queue::{DownloadQueue, EventKind, JobId, JobState, JobStatus, QueueEvent};
pub use selector::ChapterSelector;
pub use sources::SourceAdapter;

/// One download request, as handed over by the embedding front end.
#[derive(Debug, Clone)]
pub struct StartDownload {
    pub series_url: String,
    /// Empty for all chapters, `"34"` or `"34.5"` for one, `"5-10"` for an
    /// inclusive range.
    pub chapter_selector: String,
    pub config: DownloadConfig,
}

/// Resolve a series, apply the chapter selector and enqueue every selected
/// chapter.
///
/// Unsatisfiable requests (`UnsupportedSource`, `SeriesNotFound`,
/// `InvalidChapterReference`, `ChapterNotFound`, `EmptyRange`) fail here,
/// before any job exists. On success the queue handle and the enqueued job
/// ids come back; progress arrives on [`DownloadQueue::subscribe`].
pub async fn start_download(request: StartDownload) -> Result<(DownloadQueue, Vec<JobId>)> {
    let selector = ChapterSelector::parse(&request.chapter_selector)?;
    let client = http::HttpClient::new(&request.config.http)?;
    let adapter = sources::adapter_for(&request.series_url, client.clone())?;

    log::info!(
        "resolving series via {} adapter: {}",
        adapter.site(),
        request.series_url
    );
    let series = adapter.resolve_series(&request.series_url).await?;
    let selected: Vec<Chapter> = selector
        .select(&series.chapters)?
        .into_iter()
        .cloned()
        .collect();
    log::info!(
        "'{}': {} of {} chapters selected",
        series.title,
        selected.len(),
        series.chapters.len()
    );

    let fetcher = Arc::new(HttpPageFetcher::new(client));
    let queue = DownloadQueue::open(request.config, adapter, fetcher)?;

    let mut job_ids = Vec::with_capacity(selected.len());
    for chapter in &selected {
        job_ids.push(queue.enqueue(&series, chapter).await?);
    }
    Ok((queue, job_ids))
}
