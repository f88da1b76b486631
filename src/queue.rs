//! The download queue: job state machine, bounded worker pool, progress
//! events and restart resume.
//!
//! One owner task holds all job state, the checkpoint file and the event
//! channel; everything else talks to it through commands. Chapter jobs run as
//! spawned tasks that fan out page fetches, stage payloads to disk and report
//! back over an internal channel, so the checkpoint only ever has a single
//! writer.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::assembler::{self, PagePayload};
use crate::checkpoint::{JobRecord, QueueState};
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::fetcher::PageFetch;
use crate::models::{Chapter, ChapterNumber, Page, Series};
use crate::sources::SourceAdapter;
use crate::util::{ext_from_url, sanitize_filename};

pub type JobId = u64;

/// Lifecycle of one chapter job. `Completed` and `Cancelled` are terminal;
/// `Failed` is terminal for the attempt but may be re-queued with `retry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Active,
    Paused,
    Completed,
    Failed { reason: String },
    Cancelled,
}

/// Progress events, emitted fire-and-forget. Slow or absent sinks never
/// block the pipeline; the broadcast buffer is bounded and old events are
/// dropped for laggards.
#[derive(Debug, Clone)]
pub struct QueueEvent {
    pub job: JobId,
    pub kind: EventKind,
}

#[derive(Debug, Clone)]
pub enum EventKind {
    StateChanged(JobState),
    PageProgress { fetched: usize, total: usize },
    Completed { archive: PathBuf },
    Failed { reason: String },
}

/// Point-in-time view of one job, as returned by `status()`.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: JobId,
    pub series_title: String,
    pub chapter_number: String,
    pub chapter_title: String,
    pub state: JobState,
    pub pages_fetched: usize,
    pub pages_total: Option<usize>,
    pub retries: u32,
    pub archive_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobControl {
    Run,
    Pause,
    Cancel,
}

enum Command {
    Enqueue {
        series_url: String,
        series_title: String,
        site: String,
        chapter: Chapter,
        reply: oneshot::Sender<Result<JobId>>,
    },
    Pause {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Retry {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<Vec<JobStatus>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum JobMsg {
    Listed {
        job: JobId,
        total: usize,
    },
    PageDone {
        job: JobId,
        index: usize,
        retries: u32,
    },
    Ended {
        job: JobId,
        outcome: JobOutcome,
    },
}

enum JobOutcome {
    Completed(PathBuf),
    Failed(String),
    Paused,
    Cancelled,
}

/// Handle to a running queue. Cheap to clone; the owner task shuts down once
/// every handle is dropped and all active jobs have settled.
#[derive(Clone, Debug)]
pub struct DownloadQueue {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<QueueEvent>,
}

impl DownloadQueue {
    /// Initialize the queue: load the checkpoint, re-queue interrupted jobs
    /// and start the owner task. Requires a running tokio runtime.
    pub fn open(
        config: DownloadConfig,
        adapter: Arc<dyn SourceAdapter>,
        fetcher: Arc<dyn PageFetch>,
    ) -> Result<Self> {
        fs::create_dir_all(config.state_dir())?;
        let checkpoint_path = config.checkpoint_path();
        let state = QueueState::load(&checkpoint_path, &config.destination_root)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (events, _) = broadcast::channel(256);
        let (job_tx, job_rx) = mpsc::unbounded_channel();

        let pending: VecDeque<JobId> = state
            .jobs
            .iter()
            .filter(|(_, r)| r.state == JobState::Pending)
            .map(|(id, _)| *id)
            .collect();
        if !pending.is_empty() {
            log::info!("resuming {} interrupted job(s) from checkpoint", pending.len());
        }
        let index = state
            .jobs
            .iter()
            .map(|(id, r)| ((r.series_url.clone(), r.chapter_number.clone()), *id))
            .collect();

        let owner = Owner {
            state,
            checkpoint_path,
            staging_root: config.staging_root(),
            destination_root: config.destination_root.clone(),
            job_concurrency: config.job_concurrency.max(1),
            page_fan_out: config.page_fan_out.max(1),
            force_redownload: config.force_redownload,
            adapter,
            fetcher,
            events: events.clone(),
            job_tx,
            pending,
            index,
            controls: HashMap::new(),
            active: 0,
            shutting_down: false,
            shutdown_reply: None,
        };
        tokio::spawn(owner.run(cmd_rx, job_rx));

        Ok(Self { cmd_tx, events })
    }

    /// Queue one chapter. Returns the existing handle when an equivalent job
    /// (same series URL + chapter number) is already live, so a chapter is
    /// never downloaded twice concurrently.
    pub async fn enqueue(&self, series: &Series, chapter: &Chapter) -> Result<JobId> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Enqueue {
                series_url: series.url.clone(),
                series_title: series.title.clone(),
                site: series.site.to_string(),
                chapter: chapter.clone(),
                reply,
            })
            .await
            .map_err(|_| Error::QueueClosed)?;
        rx.await.map_err(|_| Error::QueueClosed)?
    }

    pub async fn pause(&self, id: JobId) -> Result<()> {
        self.simple(|reply| Command::Pause { id, reply }).await
    }

    pub async fn resume(&self, id: JobId) -> Result<()> {
        self.simple(|reply| Command::Resume { id, reply }).await
    }

    pub async fn cancel(&self, id: JobId) -> Result<()> {
        self.simple(|reply| Command::Cancel { id, reply }).await
    }

    /// Re-queue a failed job. Staged pages from the previous attempt are
    /// kept, so only missing pages are fetched again.
    pub async fn retry(&self, id: JobId) -> Result<()> {
        self.simple(|reply| Command::Retry { id, reply }).await
    }

    /// Snapshot of every job the queue knows about, ascending by id.
    pub async fn status(&self) -> Result<Vec<JobStatus>> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Status { reply })
            .await
            .map_err(|_| Error::QueueClosed)?;
        rx.await.map_err(|_| Error::QueueClosed)
    }

    /// Subscribe to the progress event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Graceful teardown: active jobs pause (in-flight fetches finish and
    /// are staged), state is checkpointed as re-queueable, and the owner
    /// task ends.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| Error::QueueClosed)?;
        rx.await.map_err(|_| Error::QueueClosed)
    }

    async fn simple<F>(&self, make: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> Command,
    {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .await
            .map_err(|_| Error::QueueClosed)?;
        rx.await.map_err(|_| Error::QueueClosed)?
    }
}

struct Owner {
    state: QueueState,
    checkpoint_path: PathBuf,
    staging_root: PathBuf,
    destination_root: PathBuf,
    job_concurrency: usize,
    page_fan_out: usize,
    force_redownload: bool,
    adapter: Arc<dyn SourceAdapter>,
    fetcher: Arc<dyn PageFetch>,
    events: broadcast::Sender<QueueEvent>,
    job_tx: mpsc::UnboundedSender<JobMsg>,
    pending: VecDeque<JobId>,
    index: HashMap<(String, String), JobId>,
    controls: HashMap<JobId, watch::Sender<JobControl>>,
    active: usize,
    shutting_down: bool,
    shutdown_reply: Option<oneshot::Sender<()>>,
}

impl Owner {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut job_rx: mpsc::UnboundedReceiver<JobMsg>,
    ) {
        self.schedule();
        let mut cmd_open = true;
        loop {
            if !cmd_open && self.active == 0 {
                break;
            }
            tokio::select! {
                cmd = cmd_rx.recv(), if cmd_open => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => cmd_open = false,
                },
                msg = job_rx.recv() => {
                    if let Some(msg) = msg {
                        if self.handle_msg(msg) {
                            break;
                        }
                    }
                }
            }
        }
        self.save();
        log::debug!("queue owner task ended");
    }

    /// Returns true when the owner should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Enqueue {
                series_url,
                series_title,
                site,
                chapter,
                reply,
            } => {
                let result = self.enqueue(series_url, series_title, site, chapter);
                let _ = reply.send(result);
            }
            Command::Pause { id, reply } => {
                let _ = reply.send(self.pause(id));
            }
            Command::Resume { id, reply } => {
                let _ = reply.send(self.resume(id));
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(id));
            }
            Command::Retry { id, reply } => {
                let _ = reply.send(self.retry(id));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown { reply } => {
                self.shutting_down = true;
                for control in self.controls.values() {
                    let _ = control.send(JobControl::Pause);
                }
                if self.active == 0 {
                    self.save();
                    let _ = reply.send(());
                    return true;
                }
                self.shutdown_reply = Some(reply);
            }
        }
        false
    }

    fn handle_msg(&mut self, msg: JobMsg) -> bool {
        match msg {
            JobMsg::Listed { job, total } => {
                if let Some(record) = self.state.jobs.get_mut(&job) {
                    record.pages_total = Some(total);
                    if record.pages_done.len() != total {
                        record.pages_done = vec![false; total];
                    }
                    let fetched = record.pages_fetched();
                    self.emit(job, EventKind::PageProgress { fetched, total });
                    self.save();
                }
            }
            JobMsg::PageDone {
                job,
                index,
                retries,
            } => {
                if let Some(record) = self.state.jobs.get_mut(&job) {
                    if index < record.pages_done.len() {
                        record.pages_done[index] = true;
                    }
                    record.retries += retries;
                    let fetched = record.pages_fetched();
                    let total = record.pages_total.unwrap_or(fetched);
                    self.emit(job, EventKind::PageProgress { fetched, total });
                    self.save();
                }
            }
            JobMsg::Ended { job, outcome } => {
                self.active = self.active.saturating_sub(1);
                self.controls.remove(&job);
                if let Some(record) = self.state.jobs.get_mut(&job) {
                    match outcome {
                        JobOutcome::Completed(archive) => {
                            record.state = JobState::Completed;
                            record.archive_path = Some(archive.clone());
                            self.emit(job, EventKind::StateChanged(JobState::Completed));
                            self.emit(job, EventKind::Completed { archive });
                        }
                        JobOutcome::Failed(reason) => {
                            log::warn!("job {job} failed: {reason}");
                            let state = JobState::Failed {
                                reason: reason.clone(),
                            };
                            record.state = state.clone();
                            self.emit(job, EventKind::StateChanged(state));
                            self.emit(job, EventKind::Failed { reason });
                        }
                        JobOutcome::Paused => {
                            // During shutdown a paused job goes straight back
                            // to Pending so the next run resumes it.
                            let state = if self.shutting_down {
                                JobState::Pending
                            } else {
                                JobState::Paused
                            };
                            record.state = state.clone();
                            self.emit(job, EventKind::StateChanged(state));
                        }
                        JobOutcome::Cancelled => {
                            record.state = JobState::Cancelled;
                            record.pages_done.clear();
                            record.pages_total = None;
                            self.emit(job, EventKind::StateChanged(JobState::Cancelled));
                        }
                    }
                }
                self.save();
                self.schedule();
                if self.shutting_down && self.active == 0 {
                    self.save();
                    if let Some(reply) = self.shutdown_reply.take() {
                        let _ = reply.send(());
                    }
                    return true;
                }
            }
        }
        false
    }

    fn enqueue(
        &mut self,
        series_url: String,
        series_title: String,
        site: String,
        chapter: Chapter,
    ) -> Result<JobId> {
        if self.shutting_down {
            return Err(Error::QueueClosed);
        }
        let key = (series_url.clone(), chapter.number.to_string());
        if let Some(&id) = self.index.get(&key) {
            let record = self.state.jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
            match record.state {
                JobState::Pending | JobState::Active | JobState::Paused => return Ok(id),
                JobState::Completed if !self.force_redownload => return Ok(id),
                _ => {
                    // Failed, Cancelled, or forced re-download: fresh attempt.
                    record.state = JobState::Pending;
                    record.retries = 0;
                    if self.force_redownload {
                        record.pages_done.clear();
                        record.pages_total = None;
                        record.archive_path = None;
                    }
                    self.pending.push_back(id);
                    self.emit(id, EventKind::StateChanged(JobState::Pending));
                    self.schedule();
                    self.save();
                    return Ok(id);
                }
            }
        }

        let id = self.state.next_job_id;
        self.state.next_job_id += 1;

        let archive = assembler::archive_path(&self.destination_root, &series_title, chapter.number);
        let satisfied = !self.force_redownload && valid_archive(&archive);

        let mut record = JobRecord {
            series_url,
            series_title,
            site,
            chapter_number: chapter.number.to_string(),
            chapter_title: chapter.title,
            chapter_url: chapter.url,
            state: JobState::Pending,
            retries: 0,
            pages_total: None,
            pages_done: Vec::new(),
            archive_path: None,
        };

        if satisfied {
            log::info!(
                "chapter {} already downloaded, skipping",
                record.chapter_number
            );
            record.state = JobState::Completed;
            record.archive_path = Some(archive.clone());
            self.state.jobs.insert(id, record);
            self.index.insert(key, id);
            self.emit(id, EventKind::StateChanged(JobState::Completed));
            self.emit(id, EventKind::Completed { archive });
        } else {
            self.state.jobs.insert(id, record);
            self.index.insert(key, id);
            self.pending.push_back(id);
            self.emit(id, EventKind::StateChanged(JobState::Pending));
            self.schedule();
        }
        self.save();
        Ok(id)
    }

    fn pause(&mut self, id: JobId) -> Result<()> {
        let record = self.state.jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
        match record.state {
            JobState::Active => {
                if let Some(control) = self.controls.get(&id) {
                    let _ = control.send(JobControl::Pause);
                }
            }
            JobState::Pending => {
                record.state = JobState::Paused;
                self.emit(id, EventKind::StateChanged(JobState::Paused));
                self.save();
            }
            _ => {}
        }
        Ok(())
    }

    fn resume(&mut self, id: JobId) -> Result<()> {
        let record = self.state.jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
        if record.state == JobState::Paused {
            record.state = JobState::Pending;
            self.pending.push_back(id);
            self.emit(id, EventKind::StateChanged(JobState::Pending));
            self.schedule();
            self.save();
        }
        Ok(())
    }

    fn cancel(&mut self, id: JobId) -> Result<()> {
        let record = self.state.jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
        match record.state {
            JobState::Active => {
                if let Some(control) = self.controls.get(&id) {
                    let _ = control.send(JobControl::Cancel);
                }
            }
            JobState::Pending | JobState::Paused | JobState::Failed { .. } => {
                record.state = JobState::Cancelled;
                record.pages_done.clear();
                record.pages_total = None;
                let staging = staging_dir_for(&self.staging_root, record);
                let _ = fs::remove_dir_all(staging);
                self.emit(id, EventKind::StateChanged(JobState::Cancelled));
                self.save();
            }
            _ => {}
        }
        Ok(())
    }

    fn retry(&mut self, id: JobId) -> Result<()> {
        let record = self.state.jobs.get_mut(&id).ok_or(Error::UnknownJob(id))?;
        if matches!(record.state, JobState::Failed { .. }) {
            record.state = JobState::Pending;
            self.pending.push_back(id);
            self.emit(id, EventKind::StateChanged(JobState::Pending));
            self.schedule();
            self.save();
        }
        Ok(())
    }

    fn status(&self) -> Vec<JobStatus> {
        self.state
            .jobs
            .iter()
            .map(|(id, r)| JobStatus {
                id: *id,
                series_title: r.series_title.clone(),
                chapter_number: r.chapter_number.clone(),
                chapter_title: r.chapter_title.clone(),
                state: r.state.clone(),
                pages_fetched: r.pages_fetched(),
                pages_total: r.pages_total,
                retries: r.retries,
                archive_path: r.archive_path.clone(),
            })
            .collect()
    }

    fn schedule(&mut self) {
        while self.active < self.job_concurrency && !self.shutting_down {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            // Stale entries (paused or cancelled while waiting) are skipped.
            let runnable = self
                .state
                .jobs
                .get(&id)
                .map(|r| r.state == JobState::Pending)
                .unwrap_or(false);
            if runnable {
                self.spawn_job(id);
            }
        }
    }

    fn spawn_job(&mut self, id: JobId) {
        let record = match self.state.jobs.get_mut(&id) {
            Some(r) => r,
            None => return,
        };
        record.state = JobState::Active;
        let number = match ChapterNumber::parse(&record.chapter_number) {
            Ok(n) => n,
            Err(e) => {
                record.state = JobState::Failed {
                    reason: e.to_string(),
                };
                return;
            }
        };
        let chapter = Chapter {
            number,
            title: record.chapter_title.clone(),
            url: record.chapter_url.clone(),
        };
        let staging_dir = staging_dir_for(&self.staging_root, record);
        let series_title = record.series_title.clone();

        let (control_tx, control_rx) = watch::channel(JobControl::Run);
        self.controls.insert(id, control_tx);
        self.active += 1;

        let ctx = JobContext {
            id,
            chapter,
            series_title,
            destination_root: self.destination_root.clone(),
            staging_dir,
            fan_out: self.page_fan_out,
            adapter: self.adapter.clone(),
            fetcher: self.fetcher.clone(),
            msgs: self.job_tx.clone(),
            control: control_rx,
        };
        tokio::spawn(run_job(ctx));

        self.emit(id, EventKind::StateChanged(JobState::Active));
        self.save();
    }

    fn emit(&self, job: JobId, kind: EventKind) {
        // Fire-and-forget: no subscribers or a full buffer is not an error.
        let _ = self.events.send(QueueEvent { job, kind });
    }

    fn save(&mut self) {
        if let Err(e) = self.state.save(&self.checkpoint_path) {
            log::error!("failed to checkpoint queue state: {e}");
        }
    }
}

fn valid_archive(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => true,
        Ok(_) => {
            // Zero-byte leftovers from a dead run are not archives.
            let _ = fs::remove_file(path);
            false
        }
        Err(_) => false,
    }
}

fn staging_dir_for(staging_root: &Path, record: &JobRecord) -> PathBuf {
    staging_root
        .join(sanitize_filename(&record.series_title))
        .join(&record.chapter_number)
}

struct JobContext {
    id: JobId,
    chapter: Chapter,
    series_title: String,
    destination_root: PathBuf,
    staging_dir: PathBuf,
    fan_out: usize,
    adapter: Arc<dyn SourceAdapter>,
    fetcher: Arc<dyn PageFetch>,
    msgs: mpsc::UnboundedSender<JobMsg>,
    control: watch::Receiver<JobControl>,
}

async fn run_job(ctx: JobContext) {
    let id = ctx.id;
    let msgs = ctx.msgs.clone();
    let outcome = execute_job(ctx).await;
    let _ = msgs.send(JobMsg::Ended { job: id, outcome });
}

async fn execute_job(ctx: JobContext) -> JobOutcome {
    let JobContext {
        id,
        chapter,
        series_title,
        destination_root,
        staging_dir,
        fan_out,
        adapter,
        fetcher,
        msgs,
        mut control,
    } = ctx;

    let pages = match adapter.list_pages(&chapter).await {
        Ok(pages) if !pages.is_empty() => pages,
        Ok(_) => {
            return JobOutcome::Failed(
                Error::ChapterUnavailable(format!("no pages listed for chapter {}", chapter.number))
                    .to_string(),
            )
        }
        Err(e) => return JobOutcome::Failed(e.to_string()),
    };
    let total = pages.len();
    let _ = msgs.send(JobMsg::Listed { job: id, total });
    log::debug!("job {id}: chapter {} has {total} pages", chapter.number);

    if let Err(e) = fs::create_dir_all(&staging_dir) {
        return JobOutcome::Failed(Error::Io(e).to_string());
    }

    // Resume support: anything already staged from a previous attempt is
    // skipped, so a paused or interrupted chapter only fetches what is left.
    let staged = scan_staging(&staging_dir);
    let mut remaining: VecDeque<Page> = pages
        .iter()
        .filter(|p| !staged.contains_key(&p.index))
        .cloned()
        .collect();

    let referer = adapter.referer().to_string();
    let mut in_flight = FuturesUnordered::new();
    let mut failure: Option<String> = None;
    let mut control_open = true;

    loop {
        let directive = *control.borrow();
        if directive == JobControl::Run && failure.is_none() {
            while in_flight.len() < fan_out {
                let Some(page) = remaining.pop_front() else {
                    break;
                };
                let fetcher = fetcher.clone();
                let referer = referer.clone();
                in_flight.push(async move {
                    let result = fetcher.fetch(&page, &referer).await;
                    (page, result)
                });
            }
        }
        if in_flight.is_empty() {
            break;
        }
        tokio::select! {
            completed = in_flight.next() => {
                let Some((page, result)) = completed else { continue };
                match result {
                    Ok(fetched) => {
                        let ext = ext_from_url(&page.url);
                        let path = staging_dir.join(format!("{:03}.{}", page.index, ext));
                        match tokio::fs::write(&path, &fetched.bytes).await {
                            Ok(()) => {
                                let _ = msgs.send(JobMsg::PageDone {
                                    job: id,
                                    index: page.index,
                                    retries: fetched.retries,
                                });
                            }
                            Err(e) => {
                                failure.get_or_insert(Error::Io(e).to_string());
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("job {id}: page {} failed: {e}", page.index);
                        failure.get_or_insert(e.to_string());
                    }
                }
            }
            changed = control.changed(), if control_open => {
                // A dropped sender means the owner is gone; jobs keep
                // draining what is already in flight.
                if changed.is_err() {
                    control_open = false;
                }
            }
        }
    }

    let final_control = *control.borrow();
    match final_control {
        JobControl::Cancel => {
            let _ = fs::remove_dir_all(&staging_dir);
            JobOutcome::Cancelled
        }
        _ if failure.is_some() => JobOutcome::Failed(failure.unwrap()),
        JobControl::Pause => JobOutcome::Paused,
        JobControl::Run => assemble_staged(
            &staging_dir,
            &destination_root,
            &series_title,
            chapter.number,
            total,
        ),
    }
}

fn assemble_staged(
    staging_dir: &Path,
    destination_root: &Path,
    series_title: &str,
    number: ChapterNumber,
    expected: usize,
) -> JobOutcome {
    let staged = scan_staging(staging_dir);
    if staged.len() != expected {
        return JobOutcome::Failed(
            Error::IncompleteChapter {
                expected,
                got: staged.len(),
            }
            .to_string(),
        );
    }
    let mut payloads = Vec::with_capacity(expected);
    for (index, path) in staged {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();
        match fs::read(&path) {
            Ok(bytes) => payloads.push(PagePayload {
                index,
                ext,
                bytes: bytes.into(),
            }),
            Err(e) => return JobOutcome::Failed(Error::Io(e).to_string()),
        }
    }
    match assembler::assemble(destination_root, series_title, number, payloads) {
        Ok(archive) => {
            let _ = fs::remove_dir_all(staging_dir);
            JobOutcome::Completed(archive)
        }
        Err(e) => JobOutcome::Failed(e.to_string()),
    }
}

/// Map of staged page index to file path, from the chapter's staging dir.
fn scan_staging(dir: &Path) -> HashMap<usize, PathBuf> {
    let mut staged = HashMap::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return staged;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(index) = stem.parse::<usize>() {
            staged.insert(index, path);
        }
    }
    staged
}
