//! Persistent queue state.
//!
//! The queue checkpoints job identities and per-page completion bitmaps so a
//! restarted process resumes in-flight chapters without re-fetching pages it
//! already has. The file is only ever touched by the queue's owner task;
//! writes go through a temp file and an atomic rename.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::queue::{JobId, JobState};

/// Serialized form of one download job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub series_url: String,
    pub series_title: String,
    pub site: String,
    /// Canonical chapter number rendering (`"34"`, `"34.5"`).
    pub chapter_number: String,
    pub chapter_title: String,
    pub chapter_url: String,
    pub state: JobState,
    pub retries: u32,
    pub pages_total: Option<usize>,
    /// Completion bitmap indexed by page sequence number.
    pub pages_done: Vec<bool>,
    pub archive_path: Option<PathBuf>,
}

impl JobRecord {
    pub fn pages_fetched(&self) -> usize {
        self.pages_done.iter().filter(|d| **d).count()
    }
}

/// Everything the queue needs to survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueState {
    pub version: u32,
    pub destination_root: PathBuf,
    pub next_job_id: JobId,
    pub jobs: BTreeMap<JobId, JobRecord>,
    pub last_saved: Option<DateTime<Utc>>,
}

impl QueueState {
    pub fn new(destination_root: PathBuf) -> Self {
        Self {
            version: 1,
            destination_root,
            next_job_id: 1,
            jobs: BTreeMap::new(),
            last_saved: None,
        }
    }

    /// Load from disk; a missing file is an empty state.
    pub fn load(path: &Path, destination_root: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(destination_root.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let mut state: QueueState = serde_json::from_str(&content)?;
        // An interrupted process leaves jobs marked Active; they were not
        // actually running anymore, so they go back to the pending pool.
        for record in state.jobs.values_mut() {
            if record.state == JobState::Active {
                record.state = JobState::Pending;
            }
        }
        Ok(state)
    }

    /// Atomic save: write a temp sibling, fsync, rename.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.last_saved = Some(Utc::now());
        let content = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut tmp: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(state: JobState) -> JobRecord {
        JobRecord {
            series_url: "https://example.test/series/foo".into(),
            series_title: "Foo".into(),
            site: "stub".into(),
            chapter_number: "12.5".into(),
            chapter_title: "The Fall".into(),
            chapter_url: "https://example.test/series/foo/chapter/12.5".into(),
            state,
            retries: 1,
            pages_total: Some(4),
            pages_done: vec![true, true, false, false],
            archive_path: None,
        }
    }

    #[test]
    fn round_trips_bitmap_and_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");

        let mut state = QueueState::new(dir.path().to_path_buf());
        state.jobs.insert(7, record(JobState::Pending));
        state.next_job_id = 8;
        state.save(&path).unwrap();

        let loaded = QueueState::load(&path, dir.path()).unwrap();
        assert_eq!(loaded.next_job_id, 8);
        let job = &loaded.jobs[&7];
        assert_eq!(job.chapter_number, "12.5");
        assert_eq!(job.pages_done, vec![true, true, false, false]);
        assert_eq!(job.pages_fetched(), 2);
        assert_eq!(loaded.destination_root, dir.path());
    }

    #[test]
    fn active_jobs_collapse_to_pending_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");

        let mut state = QueueState::new(dir.path().to_path_buf());
        state.jobs.insert(1, record(JobState::Active));
        state.jobs.insert(2, record(JobState::Completed));
        state.save(&path).unwrap();

        let loaded = QueueState::load(&path, dir.path()).unwrap();
        assert_eq!(loaded.jobs[&1].state, JobState::Pending);
        assert_eq!(loaded.jobs[&2].state, JobState::Completed);
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = QueueState::load(&dir.path().join("queue.json"), dir.path()).unwrap();
        assert!(state.jobs.is_empty());
        assert_eq!(state.next_job_id, 1);
    }
}
