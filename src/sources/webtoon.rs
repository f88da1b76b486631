//! Webtoon (webtoons.com) adapter. Episodes are numbered by the
//! `episode_no` query parameter; page images sit in the `#_imageList`
//! container with lazy-loaded `data-url` attributes.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use super::{finalize_chapters, SourceAdapter};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::models::{Chapter, ChapterNumber, Page, Series};
use crate::util::title_from_slug;

const BASE_URL: &str = "https://www.webtoons.com";
const REFERER: &str = "https://www.webtoons.com/";

pub fn matches_url(url: &str) -> bool {
    Regex::new(r"^https?://www\.webtoons\.com/[a-z]{2}/[^/]+/[^/]+/list\?title_no=\d+$")
        .unwrap()
        .is_match(url)
}

pub struct WebtoonAdapter {
    client: HttpClient,
}

impl WebtoonAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for WebtoonAdapter {
    fn site(&self) -> &'static str {
        "webtoon"
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
        let chapters = parse_episode_list(&html);
        if chapters.is_empty() {
            return Err(Error::SeriesNotFound(series_url.to_string()));
        }
        log::debug!("webtoon: {} episodes at {}", chapters.len(), series_url);
        Ok(finalize_chapters(chapters))
    }

    async fn list_pages(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        let html = self.client.get_html(&chapter.url, Some(REFERER)).await?;
        let urls = parse_page_urls(&html);
        if urls.is_empty() {
            // Fast-pass episodes render a purchase curtain instead of the
            // image list; the tool has no entitlement for those.
            let reason = if html.contains("fastPass") || html.contains("Fast Pass") {
                format!("episode is fast-pass locked: {}", chapter.url)
            } else {
                format!("no page images at {}", chapter.url)
            };
            return Err(Error::ChapterUnavailable(reason));
        }
        Ok(urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Page { index, url })
            .collect())
    }
}

/// `/en/fantasy/tower-of-god/list?title_no=95` -> `Tower Of God`.
fn series_title_from_url(url: &str) -> String {
    Regex::new(r"/([^/]+)/list")
        .unwrap()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| title_from_slug(m.as_str()))
        .unwrap_or_else(|| "Unknown Series".to_string())
}

fn parse_episode_list(html: &str) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse("ul#_listUl > li").unwrap();
    let link_selector = Selector::parse("a").unwrap();
    let title_selector = Selector::parse(".subj").unwrap();
    let episode_re = Regex::new(r"episode_no=(\d+)").unwrap();

    let mut chapters = Vec::new();
    for item in document.select(&item_selector) {
        let Some(link) = item.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{BASE_URL}{href}")
        };
        let Some(cap) = episode_re.captures(&url) else {
            continue;
        };
        let Ok(number) = ChapterNumber::parse(&cap[1]) else {
            continue;
        };
        let title = item
            .select(&title_selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Episode {number}"));
        chapters.push(Chapter { number, title, url });
    }
    chapters
}

fn parse_page_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#_imageList img").unwrap();

    document
        .select(&selector)
        .filter_map(|img| {
            img.value()
                .attr("data-url")
                .or_else(|| img.value().attr("src"))
        })
        .map(|url| url.to_string())
        .filter(|url| !url.is_empty())
        .collect()
}
