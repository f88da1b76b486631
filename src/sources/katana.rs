//! MangaKatana adapter. Chapter listings are a plain HTML table; page images
//! live in a script-embedded `var thzq = [...]` array with a DOM fallback.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use super::{finalize_chapters, SourceAdapter};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::models::{Chapter, ChapterNumber, Page, Series};
use crate::util::title_from_slug;

const REFERER: &str = "https://mangakatana.com/";

pub fn matches_url(url: &str) -> bool {
    Regex::new(r"^https?://mangakatana\.com/manga/[A-Za-z0-9._-]+/?$")
        .unwrap()
        .is_match(url)
}

pub struct KatanaAdapter {
    client: HttpClient,
}

impl KatanaAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for KatanaAdapter {
    fn site(&self) -> &'static str {
        "katana"
    }

    fn referer(&self) -> &'static str {
        REFERER
    }

    async fn resolve_series(&self, url: &str) -> Result<Series> {
        let chapters = self.list_chapters(url).await?;
        Ok(Series {
            url: url.to_string(),
            title: series_title_from_url(url),
            site: self.site(),
            chapters,
        })
    }

    async fn list_chapters(&self, series_url: &str) -> Result<Vec<Chapter>> {
        let html = self.client.get_html(series_url, Some(REFERER)).await?;
        let chapters = parse_chapter_list(&html);
        if chapters.is_empty() {
            return Err(Error::SeriesNotFound(series_url.to_string()));
        }
        log::debug!("katana: {} chapters at {}", chapters.len(), series_url);
        Ok(finalize_chapters(chapters))
    }

    async fn list_pages(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        let html = self.client.get_html(&chapter.url, Some(REFERER)).await?;
        let urls = parse_page_urls(&html);
        if urls.is_empty() {
            return Err(Error::ChapterUnavailable(format!(
                "no page images at {}",
                chapter.url
            )));
        }
        Ok(urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Page { index, url })
            .collect())
    }
}

/// `/manga/one-piece.12345` -> `One Piece` (trailing numeric id stripped).
fn series_title_from_url(url: &str) -> String {
    let slug = Regex::new(r"/manga/([^/]+)")
        .unwrap()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("unknown-manga");
    let slug = Regex::new(r"\.\d+$").unwrap().replace(slug, "");
    title_from_slug(&slug)
}

fn parse_chapter_list(html: &str) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("div.chapters table tbody tr").unwrap();
    let link_selector = Selector::parse("td div a").unwrap();
    let number_re = Regex::new(r"Chapter\s+(\d+(?:\.\d+)?)").unwrap();

    let mut chapters = Vec::new();
    for row in document.select(&row_selector) {
        let Some(link) = row.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let text = link.text().collect::<String>();
        let text = text.trim();
        let Some(cap) = number_re.captures(text) else {
            continue;
        };
        let Ok(number) = ChapterNumber::parse(&cap[1]) else {
            continue;
        };
        chapters.push(Chapter {
            number,
            title: text.to_string(),
            url: href.to_string(),
        });
    }
    chapters
}

fn parse_page_urls(html: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    // Primary: the reader script's image array.
    let script_re = Regex::new(r"(?s)var\s+thzq\s*=\s*\[(.*?)\];").unwrap();
    if let Some(cap) = script_re.captures(html) {
        urls = cap[1]
            .split(',')
            .map(|raw| raw.trim().trim_matches(['\'', '"']).to_string())
            .filter(|url| url.contains("http"))
            .collect();
    }

    if urls.is_empty() {
        let document = Html::parse_document(html);
        let selector =
            Selector::parse("div#imgs div.uk-grid.uk-grid-collapse div.wrap_img img").unwrap();
        for img in document.select(&selector) {
            if let Some(src) = img.value().attr("data-src") {
                urls.push(src.to_string());
            }
        }
    }

    urls.retain(|url| !url.is_empty() && !url.contains("about:blank") && !url.contains('#'));
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES_HTML: &str = r#"
        <html><body>
        <div class="chapters"><table><tbody>
        <tr><td><div><a href="https://mangakatana.com/manga/one-piece.12345/c103">Chapter 103: Whale</a></div></td></tr>
        <tr><td><div><a href="https://mangakatana.com/manga/one-piece.12345/c102.5">Chapter 102.5: Extra</a></div></td></tr>
        <tr><td><div><a href="https://mangakatana.com/manga/one-piece.12345/c102">Chapter 102</a></div></td></tr>
        </tbody></table></div>
        </body></html>"#;

    const CHAPTER_SCRIPT_HTML: &str = r#"
        <html><head><script>
        var thzq=['https://i3.mkcdn.xyz/one-piece/c103/001.jpg',
                  'https://i3.mkcdn.xyz/one-piece/c103/002.jpg',
                  'about:blank',''];
        </script></head><body></body></html>"#;

    const CHAPTER_DOM_HTML: &str = r#"
        <html><body><div id="imgs"><div class="uk-grid uk-grid-collapse">
        <div class="wrap_img"><img data-src="https://i3.mkcdn.xyz/x/001.png"/></div>
        <div class="wrap_img"><img data-src="https://i3.mkcdn.xyz/x/002.png"/></div>
        </div></div></body></html>"#;

    #[test]
    fn url_pattern() {
        assert!(matches_url("https://mangakatana.com/manga/one-piece.12345"));
        assert!(matches_url("https://mangakatana.com/manga/solo_leveling/"));
        assert!(!matches_url("https://mangakatana.com/latest"));
        assert!(!matches_url("https://asuracomic.net/series/x"));
    }

    #[test]
    fn chapter_table_parses_and_sorts_ascending() {
        let chapters = finalize_chapters(parse_chapter_list(SERIES_HTML));
        let numbers: Vec<String> = chapters.iter().map(|c| c.number.to_string()).collect();
        assert_eq!(numbers, ["102", "102.5", "103"]);
        assert_eq!(chapters[2].title, "Chapter 103: Whale");
        assert_eq!(
            chapters[2].url,
            "https://mangakatana.com/manga/one-piece.12345/c103"
        );
    }

    #[test]
    fn script_array_is_primary_page_source() {
        let urls = parse_page_urls(CHAPTER_SCRIPT_HTML);
        assert_eq!(
            urls,
            [
                "https://i3.mkcdn.xyz/one-piece/c103/001.jpg",
                "https://i3.mkcdn.xyz/one-piece/c103/002.jpg",
            ]
        );
    }

    #[test]
    fn dom_fallback_when_script_missing() {
        let urls = parse_page_urls(CHAPTER_DOM_HTML);
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("001.png"));
    }

    #[test]
    fn series_title_strips_listing_id() {
        assert_eq!(
            series_title_from_url("https://mangakatana.com/manga/one-piece.12345"),
            "One Piece"
        );
        assert_eq!(
            series_title_from_url("https://mangakatana.com/manga/berserk"),
            "Berserk"
        );
    }
}
