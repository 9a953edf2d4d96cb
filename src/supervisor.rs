// src/supervisor.rs

use crate::backend::{BackendSelector, EnvironmentReport, PathProbe};
use crate::config::SupervisorConfig;
use crate::estimator::{ProgressEstimator, SimulatedEstimator};
use crate::job::{ControlError, Job, JobEnv, NO_BACKEND_MESSAGE};
use crate::models::{ControlAction, ControlOutcome, JobId, JobInfo, Source};
use crate::registry::{JobRegistry, RegistryError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("No magnet link provided")]
    MissingMagnet,
    #[error("Invalid magnet link format")]
    InvalidMagnet,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Invalid file type. Please upload .torrent files only")]
    UnsupportedFile,
    #[error("{}", NO_BACKEND_MESSAGE)]
    NoBackend { job_id: JobId },
    #[error("Failed to start download: {reason}")]
    Spawn { job_id: JobId, reason: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SubmitError {
    /// The job left behind in `error` status, when one was created.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            SubmitError::NoBackend { job_id } | SubmitError::Spawn { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

/// Reject bad sources before any job exists.
pub fn validate_source(source: &Source) -> Result<Source, SubmitError> {
    match source {
        Source::Magnet(uri) => {
            let uri = uri.trim();
            if uri.is_empty() {
                return Err(SubmitError::MissingMagnet);
            }
            if !uri.starts_with("magnet:") {
                return Err(SubmitError::InvalidMagnet);
            }
            Ok(Source::Magnet(uri.to_string()))
        }
        Source::TorrentFile(path) => {
            if path.as_os_str().is_empty() {
                return Err(SubmitError::NoFileSelected);
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some("torrent") {
                return Err(SubmitError::UnsupportedFile);
            }
            Ok(source.clone())
        }
    }
}

/// Entry point for callers: creates, lists and controls download jobs.
pub struct Supervisor {
    registry: JobRegistry,
    env: Arc<JobEnv>,
    download_dir: PathBuf,
}

impl Supervisor {
    /// Build a supervisor probing tools on `$PATH` (or the configured search path).
    pub fn new(config: &SupervisorConfig) -> Self {
        let probe = match &config.tool_search_path {
            Some(dirs) => PathProbe::new(dirs.clone()),
            None => PathProbe::from_env(),
        };
        let selector = BackendSelector::new(Arc::new(probe), config.aria2.clone());
        Self::with_parts(config, selector, Arc::new(SimulatedEstimator::new()))
    }

    pub fn with_parts(
        config: &SupervisorConfig,
        selector: BackendSelector,
        estimator: Arc<dyn ProgressEstimator>,
    ) -> Self {
        let env = JobEnv {
            selector,
            estimator,
            tick_interval: config.tick_interval(),
            diagnostic_timeout: config.diagnostic_timeout(),
            terminate_timeout: config.terminate_timeout(),
            error_excerpt_len: config.error_excerpt_len,
        };
        Self {
            registry: JobRegistry::new(),
            env: Arc::new(env),
            download_dir: config.download_dir.clone(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Submit into the configured download directory.
    pub async fn submit(&self, source: Source) -> Result<JobId, SubmitError> {
        let dir = self.download_dir.clone();
        self.submit_to(source, dir).await
    }

    /// Validate, register and start a job.
    ///
    /// If the job cannot start it stays registered in `error` status and the
    /// returned error carries its id.
    pub async fn submit_to(&self, source: Source, download_path: PathBuf) -> Result<JobId, SubmitError> {
        let source = validate_source(&source)?;
        let job = Job::new(source, download_path, self.env.clone());
        let job_id = job.id().clone();
        self.registry.add(job.clone()).await?;
        tracing::info!(job_id = %job_id, "job submitted");

        match job.start().await {
            Ok(()) => Ok(job_id),
            Err(ControlError::NoBackend) => Err(SubmitError::NoBackend { job_id }),
            Err(e) => Err(SubmitError::Spawn {
                job_id,
                reason: match e {
                    ControlError::Spawn(reason) => reason,
                    other => other.to_string(),
                },
            }),
        }
    }

    pub async fn list_all(&self) -> BTreeMap<JobId, JobInfo> {
        self.registry.snapshot_all().await
    }

    pub async fn info(&self, id: &JobId) -> Option<JobInfo> {
        match self.registry.get(id).await {
            Some(job) => Some(job.info().await),
            None => None,
        }
    }

    async fn job(&self, id: &JobId) -> Result<Arc<Job>, ControlError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| ControlError::NotFound(id.clone()))
    }

    pub async fn pause(&self, id: &JobId) -> Result<(), ControlError> {
        self.job(id).await?.pause().await
    }

    pub async fn resume(&self, id: &JobId) -> Result<(), ControlError> {
        self.job(id).await?.resume().await
    }

    pub async fn stop(&self, id: &JobId) -> Result<(), ControlError> {
        self.job(id).await?.stop().await
    }

    /// Stop (whatever state the job is in) and forget the job.
    pub async fn delete(&self, id: &JobId) -> Result<(), ControlError> {
        let job = self.job(id).await?;
        if let Err(e) = job.stop().await {
            tracing::debug!(job_id = %id, "stop before delete: {}", e);
        }
        self.registry.remove(id).await;
        tracing::info!(job_id = %id, "job deleted");
        Ok(())
    }

    pub async fn control(&self, id: &JobId, action: ControlAction) -> ControlOutcome {
        let result = match action {
            ControlAction::Pause => self.pause(id).await,
            ControlAction::Resume => self.resume(id).await,
            ControlAction::Stop => self.stop(id).await,
            ControlAction::Delete => self.delete(id).await,
        };
        match result {
            Ok(()) => ControlOutcome::succeeded(action),
            Err(ControlError::NotFound(_)) => ControlOutcome::failed("Download not found"),
            Err(e) => ControlOutcome::failed(format!("Failed to {} download: {}", action, e)),
        }
    }

    /// Like [`Supervisor::control`] with the action given by name.
    pub async fn control_named(&self, id: &JobId, action: &str) -> ControlOutcome {
        match action.parse::<ControlAction>() {
            Ok(action) => self.control(id, action).await,
            Err(_) => ControlOutcome::failed("Invalid action"),
        }
    }

    pub fn environment_check(&self) -> EnvironmentReport {
        self.env.selector.environment_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_malformed_magnets() {
        assert!(matches!(
            validate_source(&Source::Magnet("   ".into())),
            Err(SubmitError::MissingMagnet)
        ));
        assert!(matches!(
            validate_source(&Source::Magnet("http://example.com/x".into())),
            Err(SubmitError::InvalidMagnet)
        ));
        assert_eq!(
            validate_source(&Source::Magnet("  magnet:?xt=urn:btih:AAA \n".into())).unwrap(),
            Source::Magnet("magnet:?xt=urn:btih:AAA".into())
        );
    }

    #[test]
    fn rejects_non_torrent_files() {
        assert!(matches!(
            validate_source(&Source::TorrentFile(PathBuf::new())),
            Err(SubmitError::NoFileSelected)
        ));
        assert!(matches!(
            validate_source(&Source::TorrentFile(PathBuf::from("/up/movie.zip"))),
            Err(SubmitError::UnsupportedFile)
        ));
        assert!(matches!(
            validate_source(&Source::TorrentFile(PathBuf::from("/up/torrent"))),
            Err(SubmitError::UnsupportedFile)
        ));
        assert!(validate_source(&Source::TorrentFile(PathBuf::from("/up/linux.torrent"))).is_ok());
    }

    #[test]
    fn messages_match_user_facing_text() {
        assert_eq!(SubmitError::MissingMagnet.to_string(), "No magnet link provided");
        let err = SubmitError::NoBackend { job_id: JobId::from("abcd1234") };
        assert_eq!(err.to_string(), NO_BACKEND_MESSAGE);
        assert_eq!(err.job_id(), Some(&JobId::from("abcd1234")));
        assert_eq!(SubmitError::UnsupportedFile.job_id(), None);
    }

    #[tokio::test]
    async fn unknown_ids_and_actions_fail_structurally() {
        let config = SupervisorConfig {
            tool_search_path: Some(Vec::new()),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(&config);
        let id = JobId::from("deadbeef");

        let outcome = supervisor.control(&id, ControlAction::Pause).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Download not found");

        let outcome = supervisor.control_named(&id, "explode").await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Invalid action");
    }

    #[tokio::test]
    async fn invalid_input_creates_no_job() {
        let config = SupervisorConfig {
            tool_search_path: Some(Vec::new()),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(&config);
        assert!(supervisor.submit(Source::Magnet(String::new())).await.is_err());
        assert!(supervisor
            .submit(Source::TorrentFile(PathBuf::from("notes.txt")))
            .await
            .is_err());
        assert!(supervisor.list_all().await.is_empty());
    }
}
