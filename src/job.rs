// src/job.rs

use crate::backend::BackendSelector;
use crate::estimator::{ProgressEstimator, TickSample, TickUpdate};
use crate::id::derive_job_id;
use crate::models::{JobId, JobInfo, JobStatus, Source};
use crate::monitor;
use crate::process::{self, DiagnosticCapture, Termination};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const NO_BACKEND_MESSAGE: &str =
    "No torrent downloader found. Please install aria2c, transmission-cli, or rtorrent.";
pub const PROCESS_FAILED_MESSAGE: &str = "Download process failed";

/// Errors from lifecycle operations on a single job.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("cannot {action} a job that is {status}")]
    InvalidState { action: &'static str, status: JobStatus },
    #[error("{}", NO_BACKEND_MESSAGE)]
    NoBackend,
    #[error("failed to start download tool: {0}")]
    Spawn(String),
}

/// Collaborators and timings shared by every job of one supervisor.
#[derive(Clone)]
pub struct JobEnv {
    pub selector: BackendSelector,
    pub estimator: Arc<dyn ProgressEstimator>,
    pub tick_interval: Duration,
    pub diagnostic_timeout: Duration,
    pub terminate_timeout: Duration,
    pub error_excerpt_len: usize,
}

/// Result of checking the bound process during a monitor tick.
#[derive(Debug)]
pub(crate) enum ExitPoll {
    Running,
    Exited(ExitStatus),
    /// The job has moved on to another run (or none); the caller should stop.
    Stale,
    Failed(std::io::Error),
}

/// Mutable fields of a job. Always read and written under one lock so a
/// snapshot never mixes two ticks.
#[derive(Debug)]
struct JobState {
    status: JobStatus,
    progress: f64,
    seeders: u32,
    leechers: u32,
    download_speed: u64,
    upload_speed: u64,
    eta: f64,
    total_size: u64,
    downloaded_size: u64,
    start_time: Instant,
    is_paused: bool,
    error_message: String,
    /// Incremented on every successful start; monitors carry the value they were spawned with.
    run: u64,
}

impl JobState {
    fn new() -> Self {
        Self {
            status: JobStatus::Pending,
            progress: 0.0,
            seeders: 1,
            leechers: 0,
            download_speed: 0,
            upload_speed: 0,
            eta: 0.0,
            total_size: 0,
            downloaded_size: 0,
            start_time: Instant::now(),
            is_paused: false,
            error_message: String::new(),
            run: 0,
        }
    }

    fn sample(&self) -> TickSample {
        TickSample {
            progress: self.progress,
            seeders: self.seeders,
            leechers: self.leechers,
            eta: self.eta,
            elapsed: self.start_time.elapsed(),
        }
    }

    fn apply(&mut self, update: TickUpdate) {
        // Estimators are swappable; the monotonic and bounds guarantees live here.
        self.progress = update.progress.clamp(0.0, 100.0).max(self.progress);
        self.seeders = update.seeders.max(1);
        self.leechers = update.leechers;
        self.download_speed = update.download_speed;
        self.upload_speed = update.upload_speed;
        self.eta = if update.eta.is_finite() { update.eta.max(0.0) } else { 0.0 };
        if let Some(total) = update.total_size {
            self.total_size = total;
        }
        if let Some(done) = update.downloaded_size {
            self.downloaded_size = done;
        }
    }

    /// No transfer means no speed, and no speed means no ETA.
    fn halt_transfer(&mut self) {
        self.download_speed = 0;
        self.upload_speed = 0;
        self.eta = 0.0;
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error_message = message.into();
        self.halt_transfer();
    }
}

/// The running tool, owned by the job.
struct ProcessHandle {
    child: Child,
    cancel: CancellationToken,
    run: u64,
}

/// One tracked torrent transfer.
pub struct Job {
    id: JobId,
    source: Source,
    download_path: PathBuf,
    env: Arc<JobEnv>,
    state: Mutex<JobState>,
    process: Mutex<Option<ProcessHandle>>,
}

impl Job {
    /// Create a pending job. No process is spawned until [`Job::start`].
    pub fn new(source: Source, download_path: PathBuf, env: Arc<JobEnv>) -> Arc<Self> {
        Arc::new(Self {
            id: derive_job_id(&source),
            source,
            download_path,
            env,
            state: Mutex::new(JobState::new()),
            process: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn download_path(&self) -> &Path {
        &self.download_path
    }

    pub(crate) fn env(&self) -> &JobEnv {
        &self.env
    }

    pub async fn status(&self) -> JobStatus {
        self.state.lock().await.status
    }

    pub async fn progress(&self) -> f64 {
        self.state.lock().await.progress
    }

    pub async fn info(&self) -> JobInfo {
        let state = self.state.lock().await;
        JobInfo {
            id: self.id.clone(),
            status: state.status,
            progress: (state.progress * 10.0).round() / 10.0,
            seeders: state.seeders,
            leechers: state.leechers,
            download_speed: state.download_speed,
            upload_speed: state.upload_speed,
            eta: state.eta as u64,
            total_size: state.total_size,
            downloaded_size: state.downloaded_size,
            is_paused: state.is_paused,
            error_message: state.error_message.clone(),
        }
    }

    /// Spawn the transfer tool for a pending job.
    ///
    /// A missing backend or spawn failure puts the job in `error` and is
    /// reported to the caller; it is never fatal.
    pub async fn start(self: &Arc<Self>) -> Result<(), ControlError> {
        let mut slot = self.process.lock().await;
        let status = self.state.lock().await.status;
        if status != JobStatus::Pending {
            return Err(ControlError::InvalidState { action: "start", status });
        }
        self.launch(&mut slot).await
    }

    /// Terminate the tool and keep progress for a later resume.
    pub async fn pause(&self) -> Result<(), ControlError> {
        let mut slot = self.process.lock().await;
        {
            let mut state = self.state.lock().await;
            if state.status != JobStatus::Downloading {
                return Err(ControlError::InvalidState { action: "pause", status: state.status });
            }
            state.status = JobStatus::Paused;
            state.is_paused = true;
            state.halt_transfer();
        }
        if let Some(handle) = slot.take() {
            self.release(handle);
        }
        tracing::info!(job_id = %self.id, "download paused");
        Ok(())
    }

    /// Re-resolve the backend and respawn; progress continues from where it was.
    pub async fn resume(self: &Arc<Self>) -> Result<(), ControlError> {
        let mut slot = self.process.lock().await;
        {
            let mut state = self.state.lock().await;
            if state.status != JobStatus::Paused {
                return Err(ControlError::InvalidState { action: "resume", status: state.status });
            }
            state.is_paused = false;
        }
        self.launch(&mut slot).await?;
        tracing::info!(job_id = %self.id, "download resumed");
        Ok(())
    }

    /// Terminate the tool and mark the job cancelled. Stopping a cancelled job succeeds.
    ///
    /// A stopped `error` job drops its message along with the status.
    pub async fn stop(&self) -> Result<(), ControlError> {
        let mut slot = self.process.lock().await;
        {
            let mut state = self.state.lock().await;
            match state.status {
                JobStatus::Cancelled => return Ok(()),
                JobStatus::Pending | JobStatus::Completed => {
                    return Err(ControlError::InvalidState { action: "stop", status: state.status });
                }
                JobStatus::Downloading | JobStatus::Paused | JobStatus::Error => {}
            }
            state.status = JobStatus::Cancelled;
            state.is_paused = false;
            state.error_message.clear();
            state.halt_transfer();
        }
        if let Some(handle) = slot.take() {
            self.release(handle);
        }
        tracing::info!(job_id = %self.id, "download cancelled");
        Ok(())
    }

    async fn launch(self: &Arc<Self>, slot: &mut Option<ProcessHandle>) -> Result<(), ControlError> {
        let Some(invocation) = self.env.selector.select_invocation(&self.source, &self.download_path) else {
            tracing::warn!(job_id = %self.id, "no transfer tool available");
            self.state.lock().await.fail(NO_BACKEND_MESSAGE);
            return Err(ControlError::NoBackend);
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.download_path).await {
            let reason = format!("cannot create {}: {}", self.download_path.display(), e);
            tracing::warn!(job_id = %self.id, "{}", reason);
            self.state.lock().await.fail(reason.clone());
            return Err(ControlError::Spawn(reason));
        }

        let (child, collector) = match process::spawn(&invocation) {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::warn!(job_id = %self.id, tool = %invocation.tool, "spawn failed: {}", e);
                self.state.lock().await.fail(e.to_string());
                return Err(ControlError::Spawn(e.to_string()));
            }
        };

        let cancel = CancellationToken::new();
        let run = {
            let mut state = self.state.lock().await;
            state.run += 1;
            state.status = JobStatus::Downloading;
            state.start_time = Instant::now();
            state.error_message.clear();
            state.run
        };
        *slot = Some(ProcessHandle {
            child,
            cancel: cancel.clone(),
            run,
        });

        tracing::info!(job_id = %self.id, tool = %invocation.tool, run, "download started");
        tokio::spawn(monitor::run(Arc::downgrade(self), run, cancel, collector));
        Ok(())
    }

    /// Signal the monitor and reap the tool in the background.
    fn release(&self, handle: ProcessHandle) {
        handle.cancel.cancel();
        let id = self.id.clone();
        let timeout = self.env.terminate_timeout;
        tokio::spawn(async move {
            match process::terminate(handle.child, timeout).await {
                Termination::Exited(status) => tracing::debug!(job_id = %id, "tool exited: {}", status),
                Termination::TimedOut => tracing::warn!(job_id = %id, "tool did not exit within {:?}", timeout),
                Termination::Failed(e) => tracing::warn!(job_id = %id, "failed to terminate tool: {}", e),
            }
        });
    }

    pub(crate) async fn poll_exit(&self, run: u64) -> ExitPoll {
        let mut slot = self.process.lock().await;
        match slot.as_mut() {
            Some(handle) if handle.run == run => match handle.child.try_wait() {
                Ok(Some(status)) => ExitPoll::Exited(status),
                Ok(None) => ExitPoll::Running,
                Err(e) => ExitPoll::Failed(e),
            },
            _ => ExitPoll::Stale,
        }
    }

    /// Advance metrics by one estimator tick. Returns false once the run is no longer current.
    pub(crate) async fn apply_tick(&self, run: u64) -> bool {
        let mut state = self.state.lock().await;
        if state.run != run || state.status != JobStatus::Downloading {
            return false;
        }
        match self.env.estimator.next_tick(&state.sample()) {
            Ok(update) => {
                state.apply(update);
                tracing::debug!(job_id = %self.id, progress = state.progress, "tick");
            }
            Err(e) => tracing::debug!(job_id = %self.id, "tick skipped: {}", e),
        }
        true
    }

    pub(crate) async fn complete_run(&self, run: u64) {
        let mut slot = self.process.lock().await;
        let mut state = self.state.lock().await;
        if state.run != run || state.status != JobStatus::Downloading {
            return;
        }
        state.status = JobStatus::Completed;
        state.progress = 100.0;
        state.halt_transfer();
        slot.take();
        tracing::info!(job_id = %self.id, "download completed");
    }

    pub(crate) async fn fail_run(&self, run: u64, exit: ExitStatus, capture: DiagnosticCapture) {
        let mut slot = self.process.lock().await;
        let mut state = self.state.lock().await;
        if state.run != run || state.status != JobStatus::Downloading {
            return;
        }
        let message = match capture {
            DiagnosticCapture::Captured(text) if !text.trim().is_empty() => {
                process::excerpt(&text, self.env.error_excerpt_len)
            }
            DiagnosticCapture::Captured(_) => format!("{} ({})", PROCESS_FAILED_MESSAGE, exit),
            DiagnosticCapture::TimedOut => {
                tracing::debug!(job_id = %self.id, "diagnostic capture timed out");
                PROCESS_FAILED_MESSAGE.to_string()
            }
            DiagnosticCapture::Failed(e) => {
                tracing::debug!(job_id = %self.id, "diagnostic capture failed: {}", e);
                PROCESS_FAILED_MESSAGE.to_string()
            }
        };
        tracing::warn!(job_id = %self.id, "download failed: {}", message);
        state.fail(message);
        slot.take();
    }
}
