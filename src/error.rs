use thiserror::Error;

/// Crate-wide error type.
///
/// Resolution-time errors (`UnsupportedSource`, `SeriesNotFound`,
/// `InvalidChapterReference`, `ChapterNotFound`, `EmptyRange`) surface to the
/// caller before anything is enqueued. Everything else is caught at the job
/// boundary and recorded on the failing job without touching other jobs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported source URL: {0}")]
    UnsupportedSource(String),

    #[error("no chapter listing found at {0}")]
    SeriesNotFound(String),

    #[error("invalid chapter reference: {0:?}")]
    InvalidChapterReference(String),

    #[error("chapter {0} not found in series")]
    ChapterNotFound(String),

    #[error("no chapters in range {start}-{end}")]
    EmptyRange { start: String, end: String },

    #[error("chapter unavailable: {0}")]
    ChapterUnavailable(String),

    #[error("page unavailable (HTTP {status}): {url}")]
    PageUnavailable { url: String, status: u16 },

    #[error("incomplete chapter: have {got} of {expected} pages")]
    IncompleteChapter { expected: usize, got: usize },

    /// Non-2xx response that is not a hard page miss. 429/5xx instances are
    /// retried by the fetch policy; anything left over surfaces as-is.
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("unknown job {0}")]
    UnknownJob(u64),

    #[error("download queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Failure classes worth another attempt: timeouts, connection drops,
    /// rate limiting and server-side errors (including the Cloudflare 52x
    /// family). Hard misses like 404/403 are not retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Status { status, .. } => {
                matches!(status, 429 | 500..=504 | 520..=527)
            }
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let retryable = Error::Status {
            url: "http://x/1.jpg".into(),
            status: 503,
        };
        assert!(retryable.is_transient());

        let rate_limited = Error::Status {
            url: "http://x/1.jpg".into(),
            status: 429,
        };
        assert!(rate_limited.is_transient());

        let missing = Error::PageUnavailable {
            url: "http://x/1.jpg".into(),
            status: 404,
        };
        assert!(!missing.is_transient());

        assert!(!Error::SeriesNotFound("http://x".into()).is_transient());
    }
}
