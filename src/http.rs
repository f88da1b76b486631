//! Shared HTTP client for series pages, chapter pages and page images.
//!
//! Wraps `reqwest` with browser-like headers, a rotating user-agent pool,
//! a jittered exponential-backoff retry policy and a per-host concurrency
//! ceiling. The ceiling is independent of job concurrency: no matter how many
//! chapters are in flight, one origin never sees more than
//! `per_host_limit` simultaneous requests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use reqwest::{Client, ClientBuilder, Url};
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// User agents rotated across requests to avoid trivial bot fingerprints.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Bounded-retry policy: `max_attempts` total tries with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(cfg: &HttpConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: cfg.initial_backoff(),
            max_backoff: cfg.max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), doubled per attempt
    /// with ±25% jitter to avoid thundering-herd retries.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let capped = (base << attempt.min(16)).min(self.max_backoff.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((capped as f64 * jitter) as u64)
    }
}

/// Run `op` under the retry policy. Only transient failures (timeouts,
/// connection drops, 429/5xx) are retried; everything else returns
/// immediately. On success, returns the value together with the number of
/// retries that were needed.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<(T, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                log::warn!(
                    "transient failure (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    policy.max_attempts,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

struct Inner {
    client: Client,
    policy: RetryPolicy,
    per_host_limit: usize,
    host_limits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// Cheap to clone; all clones share the connection pool and host ceilings.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl HttpClient {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .parse()
                .unwrap(),
        );
        headers.insert("Accept-Language", "en-US,en;q=0.9".parse().unwrap());
        headers.insert("DNT", "1".parse().unwrap());
        headers.insert("Connection", "keep-alive".parse().unwrap());
        headers.insert("Upgrade-Insecure-Requests", "1".parse().unwrap());

        let client = ClientBuilder::new()
            .timeout(cfg.timeout())
            .user_agent(random_user_agent())
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                policy: RetryPolicy::from(cfg),
                per_host_limit: cfg.per_host_limit.max(1),
                host_limits: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.policy.clone()
    }

    fn host_semaphore(&self, url: &str) -> Arc<Semaphore> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        let mut limits = self.inner.host_limits.lock().unwrap();
        limits
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.inner.per_host_limit)))
            .clone()
    }

    async fn get_once(&self, url: &str, referer: Option<&str>) -> Result<reqwest::Response> {
        let semaphore = self.host_semaphore(url);
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| Error::QueueClosed)?;

        let mut request = self
            .inner
            .client
            .get(url)
            .header("User-Agent", random_user_agent());
        if let Some(referer) = referer {
            request = request.header("Referer", referer);
        }
        let response = request.send().await?;
        Ok(response)
    }

    async fn html_once(&self, url: &str, referer: Option<&str>) -> Result<String> {
        let response = self.get_once(url, referer).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn bytes_once(&self, url: &str, referer: Option<&str>) -> Result<Bytes> {
        let response = self.get_once(url, referer).await?;
        let status = response.status();
        match status.as_u16() {
            200..=299 => Ok(response.bytes().await?),
            403 | 404 => Err(Error::PageUnavailable {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            code => Err(Error::Status {
                url: url.to_string(),
                status: code,
            }),
        }
    }

    /// Fetch a document, retrying transient failures. Any non-2xx final
    /// status surfaces as `Error::Status`.
    pub async fn get_html(&self, url: &str, referer: Option<&str>) -> Result<String> {
        let policy = self.inner.policy.clone();
        let (text, _) = with_retry(&policy, |_| self.html_once(url, referer)).await?;
        Ok(text)
    }

    /// Fetch raw bytes (page images), retrying transient failures. Hard
    /// misses, 404 and 403, are `PageUnavailable` and never retried.
    /// Returns the payload and the number of retries spent.
    pub async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<(Bytes, u32)> {
        let policy = self.inner.policy.clone();
        with_retry(&policy, |_| self.bytes_once(url, referer)).await
    }
}

fn random_user_agent() -> &'static str {
    let index = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[index]
}
