//! Page retrieval behind an object-safe seam.
//!
//! The queue only sees `PageFetch`, so pipeline tests can substitute a
//! scripted fetcher and the HTTP implementation stays swappable.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::http::HttpClient;
use crate::models::Page;

/// Result of one page fetch: the payload plus how many retries it cost.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub bytes: Bytes,
    pub retries: u32,
}

#[async_trait]
pub trait PageFetch: Send + Sync {
    /// Retrieve the raw bytes for one page image. No side effects beyond the
    /// network call; the caller decides what to do with the payload.
    async fn fetch(&self, page: &Page, referer: &str) -> Result<FetchedPage>;
}

/// Production fetcher over the shared retrying client. Per-host concurrency
/// ceilings and the bounded backoff policy live in [`HttpClient`].
pub struct HttpPageFetcher {
    client: HttpClient,
}

impl HttpPageFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetch for HttpPageFetcher {
    async fn fetch(&self, page: &Page, referer: &str) -> Result<FetchedPage> {
        let referer = if referer.is_empty() {
            None
        } else {
            Some(referer)
        };
        let (bytes, retries) = self.client.get_bytes(&page.url, referer).await?;
        log::debug!(
            "fetched page {} ({} bytes, {} retries)",
            page.index,
            bytes.len(),
            retries
        );
        Ok(FetchedPage { bytes, retries })
    }
}
