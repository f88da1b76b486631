//! Download configuration.
//!
//! Everything that used to be ambient (working directory, concurrency,
//! retry tuning) is an explicit field here and travels with the request.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    /// Root directory for archives: `<root>/<Series Title>/Chapter <N>.cbz`.
    /// Queue checkpoint and page staging live under `<root>/.mangadl/`.
    #[serde(default = "default_destination_root")]
    pub destination_root: PathBuf,

    /// Chapters downloaded in parallel.
    #[serde(default = "default_job_concurrency")]
    pub job_concurrency: usize,

    /// In-flight page fetches per chapter job. Requests are additionally
    /// capped per source host by `http.per_host_limit`.
    #[serde(default = "default_page_fan_out")]
    pub page_fan_out: usize,

    /// Re-download chapters that already exist as valid archives.
    #[serde(default)]
    pub force_redownload: bool,

    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per fetch (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// In-flight requests allowed per source host. Keeps the tool under
    /// site-side rate limits no matter how many jobs are running.
    #[serde(default = "default_per_host_limit")]
    pub per_host_limit: usize,
}

fn default_destination_root() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_job_concurrency() -> usize {
    2
}
fn default_page_fan_out() -> usize {
    4
}
fn default_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    1000
}
fn default_max_backoff() -> u64 {
    8000
}
fn default_per_host_limit() -> usize {
    4
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            destination_root: default_destination_root(),
            job_concurrency: default_job_concurrency(),
            page_fan_out: default_page_fan_out(),
            force_redownload: false,
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            per_host_limit: default_per_host_limit(),
        }
    }
}

impl DownloadConfig {
    /// Load from `config.toml` in the working directory, falling back to
    /// defaults when the file is missing or malformed.
    pub fn load() -> Self {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(cfg) = toml::from_str::<DownloadConfig>(&content) {
                    return cfg;
                }
                log::warn!("ignoring malformed config at {}", path.display());
            }
        }
        Self::default()
    }

    /// Directory holding queue checkpoint and staged pages.
    pub fn state_dir(&self) -> PathBuf {
        self.destination_root.join(".mangadl")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.state_dir().join("queue.json")
    }

    pub fn staging_root(&self) -> PathBuf {
        self.state_dir().join("staging")
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_retry_contract() {
        let cfg = HttpConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.initial_backoff(), Duration::from_secs(1));
        assert!(cfg.per_host_limit >= 1);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: DownloadConfig = toml::from_str(
            r#"
            destination_root = "/tmp/manga"
            [http]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.destination_root, PathBuf::from("/tmp/manga"));
        assert_eq!(cfg.http.max_attempts, 5);
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.job_concurrency, 2);
    }

    #[test]
    fn state_paths_live_under_destination() {
        let cfg = DownloadConfig {
            destination_root: PathBuf::from("/data/manga"),
            ..Default::default()
        };
        assert_eq!(
            cfg.checkpoint_path(),
            PathBuf::from("/data/manga/.mangadl/queue.json")
        );
        assert_eq!(
            cfg.staging_root(),
            PathBuf::from("/data/manga/.mangadl/staging")
        );
    }
}
