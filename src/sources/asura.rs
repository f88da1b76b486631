//! Asura Scans adapter. Next.js site; the series and chapter pages arrive
//! with the data already rendered into the HTML.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use super::{finalize_chapters, SourceAdapter};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::models::{Chapter, ChapterNumber, Page, Series};
use crate::util::title_from_slug;

const BASE_URL: &str = "https://asuracomic.net";
const REFERER: &str = "https://asuracomic.net/";

pub fn matches_url(url: &str) -> bool {
    Regex::new(r"^https?://asuracomic\.net/series/[A-Za-z0-9_-]+/?$")
        .unwrap()
        .is_match(url)
}

pub struct AsuraAdapter {
    client: HttpClient,
}

impl AsuraAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for AsuraAdapter {
    fn site(&self) -> &'static str {
        "asura"
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
        log::debug!("asura: {} chapters at {}", chapters.len(), series_url);
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

/// Series slug without its trailing hash segment, title-cased:
/// `/series/solo-leveling-a1b2c3` -> `Solo Leveling`.
fn series_title_from_url(url: &str) -> String {
    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let parts: Vec<&str> = slug.split('-').collect();
    let trimmed = if parts.len() > 1 {
        parts[..parts.len() - 1].join("-")
    } else {
        slug.to_string()
    };
    title_from_slug(&trimmed)
}

fn parse_chapter_list(html: &str) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let container = Selector::parse("div.pl-4.pr-2.pb-4.overflow-y-auto div.relative a").unwrap();
    let heading = Regex::new(r"^(\d+(?:\.\d+)?)\s*(.*)$").unwrap();

    let mut chapters = Vec::new();
    for link in document.select(&container) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let text = link.text().collect::<String>();
        let text = text.trim().replacen("Chapter", "", 1);
        let text = text.trim();

        let (number_text, title) = match heading.captures(text) {
            Some(cap) => (
                cap.get(1).map(|m| m.as_str()).unwrap_or_default(),
                cap.get(2).map(|m| m.as_str().trim()).unwrap_or_default(),
            ),
            None => (text, ""),
        };
        let Ok(number) = ChapterNumber::parse(number_text) else {
            log::debug!("asura: skipping unparseable chapter entry {text:?}");
            continue;
        };
        chapters.push(Chapter {
            number,
            title: title.to_string(),
            url: resolve_href(href),
        });
    }

    if chapters.is_empty() {
        // Markup drifts; fall back to scanning raw chapter links.
        let link_re = Regex::new(r#"href="([^"]*chapter/(\d+(?:\.\d+)?)[^"]*)""#).unwrap();
        for cap in link_re.captures_iter(html) {
            if let Ok(number) = ChapterNumber::parse(&cap[2]) {
                chapters.push(Chapter {
                    number,
                    title: String::new(),
                    url: resolve_href(&cap[1]),
                });
            }
        }
    }
    chapters
}

fn resolve_href(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{BASE_URL}{href}")
    } else {
        format!("{BASE_URL}/series/{href}")
    }
}

fn parse_page_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.w-full.mx-auto.center img.object-cover").unwrap();

    let mut urls = Vec::new();
    for img in document.select(&selector) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        let alt = img.value().attr("alt").unwrap_or_default().to_lowercase();
        if src.contains("gg.asuracomic.net") && src.contains("/storage/media/") && alt.contains("chapter page")
        {
            urls.push(src.to_string());
        }
    }

    if urls.is_empty() {
        let image_re = Regex::new(
            r#"https?://gg\.asuracomic\.net/storage/media/[^"'\s>]+\.(?:jpg|jpeg|png|webp)"#,
        )
        .unwrap();
        let mut seen = std::collections::HashSet::new();
        for cap in image_re.captures_iter(html) {
            let url = cap.get(0).unwrap().as_str().to_string();
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES_HTML: &str = r#"
        <html><body>
        <div class="pl-4 pr-2 pb-4 overflow-y-auto">
            <div class="relative"><a href="/series/solo-leveling-a1b2c3/chapter/34.5">Chapter 34.5 The Fall</a></div>
            <div class="relative"><a href="solo-leveling-a1b2c3/chapter/2">Chapter 2</a></div>
            <div class="relative"><a href="/series/solo-leveling-a1b2c3/chapter/1">Chapter 1 Awakening</a></div>
            <div class="relative"><a href="/series/solo-leveling-a1b2c3/chapter/1">Chapter 1 Awakening</a></div>
        </div>
        </body></html>"#;

    const CHAPTER_HTML: &str = r#"
        <html><body>
        <div class="w-full mx-auto center">
            <img class="object-cover" alt="chapter page 1" src="https://gg.asuracomic.net/storage/media/1/01.webp"/>
        </div>
        <div class="w-full mx-auto center">
            <img class="object-cover" alt="chapter page 2" src="https://gg.asuracomic.net/storage/media/1/02.webp"/>
        </div>
        <div class="w-full mx-auto center">
            <img class="object-cover" alt="banner" src="https://gg.asuracomic.net/storage/media/ads/banner.webp"/>
        </div>
        </body></html>"#;

    #[test]
    fn url_pattern() {
        assert!(matches_url("https://asuracomic.net/series/solo-leveling-a1b2c3"));
        assert!(matches_url("http://asuracomic.net/series/x/"));
        assert!(!matches_url("https://asuracomic.net/series/x/chapter/1"));
        assert!(!matches_url("https://mangakatana.com/manga/x"));
    }

    #[test]
    fn chapter_list_parses_numbers_titles_and_urls() {
        let chapters = finalize_chapters(parse_chapter_list(SERIES_HTML));
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].number.to_string(), "1");
        assert_eq!(chapters[0].title, "Awakening");
        assert_eq!(
            chapters[0].url,
            "https://asuracomic.net/series/solo-leveling-a1b2c3/chapter/1"
        );
        // Relative href without leading slash resolves under /series/.
        assert_eq!(
            chapters[1].url,
            "https://asuracomic.net/series/solo-leveling-a1b2c3/chapter/2"
        );
        assert_eq!(chapters[2].number.to_string(), "34.5");
        assert_eq!(chapters[2].title, "The Fall");
    }

    #[test]
    fn page_urls_keep_reading_order_and_skip_non_pages() {
        let urls = parse_page_urls(CHAPTER_HTML);
        assert_eq!(
            urls,
            [
                "https://gg.asuracomic.net/storage/media/1/01.webp",
                "https://gg.asuracomic.net/storage/media/1/02.webp",
            ]
        );
    }

    #[test]
    fn series_title_drops_slug_hash() {
        assert_eq!(
            series_title_from_url("https://asuracomic.net/series/solo-leveling-a1b2c3"),
            "Solo Leveling"
        );
        assert_eq!(
            series_title_from_url("https://asuracomic.net/series/omniscient-reader-x9y8/"),
            "Omniscient Reader"
        );
    }
}
