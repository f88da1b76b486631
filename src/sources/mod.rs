//! Site-specific source adapters.
//!
//! Each supported site is one module implementing [`SourceAdapter`]; adding a
//! site means a new module and one arm in [`adapter_for`]. The queue and the
//! assembler never know which site they are serving.

pub mod asura;
pub mod katana;
pub mod webtoon;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::models::{Chapter, Page, Series};

/// Capability set every site adapter provides: series resolution, chapter
/// listing and page-image listing.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn site(&self) -> &'static str;

    /// Referer sent with chapter and image requests for this site.
    fn referer(&self) -> &'static str;

    /// Resolve a series URL into an immutable `Series` with its discovered
    /// chapter list. `SeriesNotFound` when the page yields no listing.
    async fn resolve_series(&self, url: &str) -> Result<Series>;

    /// Parse the series page into deduplicated chapters, ascending by
    /// number.
    async fn list_chapters(&self, series_url: &str) -> Result<Vec<Chapter>>;

    /// Extract the chapter's page images in reading order.
    /// `ChapterUnavailable` when the chapter is locked or has no images.
    async fn list_pages(&self, chapter: &Chapter) -> Result<Vec<Page>>;
}

/// Pick the adapter for a series URL, or `UnsupportedSource`.
pub fn adapter_for(url: &str, client: HttpClient) -> Result<Arc<dyn SourceAdapter>> {
    if asura::matches_url(url) {
        Ok(Arc::new(asura::AsuraAdapter::new(client)))
    } else if katana::matches_url(url) {
        Ok(Arc::new(katana::KatanaAdapter::new(client)))
    } else if webtoon::matches_url(url) {
        Ok(Arc::new(webtoon::WebtoonAdapter::new(client)))
    } else {
        Err(Error::UnsupportedSource(url.to_string()))
    }
}

/// Shared listing cleanup: drop chapters repeated in markup (first occurrence
/// wins) and sort ascending by number. The sort is stable, so entries that
/// survive dedup keep their document order relative to equals.
pub(crate) fn finalize_chapters(raw: Vec<Chapter>) -> Vec<Chapter> {
    let mut seen = HashSet::new();
    let mut chapters: Vec<Chapter> = raw
        .into_iter()
        .filter(|c| seen.insert(c.number))
        .collect();
    chapters.sort_by_key(|c| c.number);
    chapters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::ChapterNumber;

    fn chapter(num: &str, url: &str) -> Chapter {
        Chapter {
            number: ChapterNumber::parse(num).unwrap(),
            title: String::new(),
            url: url.to_string(),
        }
    }

    #[test]
    fn finalize_dedupes_and_sorts() {
        let raw = vec![
            chapter("10", "a"),
            chapter("2", "b"),
            chapter("10", "c"),
            chapter("2.5", "d"),
        ];
        let out = finalize_chapters(raw);
        let numbers: Vec<String> = out.iter().map(|c| c.number.to_string()).collect();
        assert_eq!(numbers, ["2", "2.5", "10"]);
        // First occurrence of a duplicated number wins.
        assert_eq!(out[2].url, "a");
    }

    #[tokio::test]
    async fn adapter_selection_by_url() {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let cases = [
            ("https://asuracomic.net/series/solo-leveling-a1b2c3", "asura"),
            ("https://mangakatana.com/manga/one-piece.12345", "katana"),
            (
                "https://www.webtoons.com/en/fantasy/tower-of-god/list?title_no=95",
                "webtoon",
            ),
        ];
        for (url, expected) in cases {
            let adapter = adapter_for(url, client.clone()).unwrap();
            assert_eq!(adapter.site(), expected, "for {url}");
        }

        let err = match adapter_for("https://example.com/manga/foo", client) {
            Ok(_) => panic!("expected an error for an unsupported source"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::UnsupportedSource(_)));
    }
}
