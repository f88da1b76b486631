//! Resolution-time failures must surface synchronously from `start_download`,
//! before any job is enqueued. These paths fail prior to any network call.

use mangadl::{start_download, DownloadConfig, Error, StartDownload};

fn request(url: &str, selector: &str) -> StartDownload {
    StartDownload {
        series_url: url.to_string(),
        chapter_selector: selector.to_string(),
        config: DownloadConfig::default(),
    }
}

#[tokio::test]
async fn unsupported_url_is_rejected_before_enqueue() {
    let err = start_download(request("https://example.com/manga/foo", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedSource(_)));
}

#[tokio::test]
async fn chapter_page_urls_are_not_series_urls() {
    let err = start_download(request(
        "https://asuracomic.net/series/solo-leveling-a1b2c3/chapter/1",
        "",
    ))
    .await
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedSource(_)));
}

#[tokio::test]
async fn bad_selector_is_rejected_before_resolution() {
    let err = start_download(request(
        "https://asuracomic.net/series/solo-leveling-a1b2c3",
        "newest",
    ))
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidChapterReference(_)));
}
