// src/registry.rs

use crate::job::Job;
use crate::models::{JobId, JobInfo};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("job id {0} is already registered")]
    Duplicate(JobId),
}

/// In-memory map of every known job.
///
/// The map lock only guards membership; each job's metrics sit behind the
/// job's own lock, so work on one job never waits on another.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, job: Arc<Job>) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.id()) {
            return Err(RegistryError::Duplicate(job.id().clone()));
        }
        jobs.insert(job.id().clone(), job);
        Ok(())
    }

    pub async fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Per-job consistent view of every job, keyed by id.
    pub async fn snapshot_all(&self) -> BTreeMap<JobId, JobInfo> {
        let jobs: Vec<Arc<Job>> = self.jobs.read().await.values().cloned().collect();
        join_all(jobs.iter().map(|job| job.info()))
            .await
            .into_iter()
            .map(|info| (info.id.clone(), info))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendSelector, PathProbe};
    use crate::config::Aria2Tuning;
    use crate::estimator::SimulatedEstimator;
    use crate::job::JobEnv;
    use crate::models::{JobStatus, Source};
    use std::path::PathBuf;
    use std::time::Duration;

    fn env() -> Arc<JobEnv> {
        Arc::new(JobEnv {
            selector: BackendSelector::new(Arc::new(PathProbe::new(Vec::new())), Aria2Tuning::default()),
            estimator: Arc::new(SimulatedEstimator::seeded(1)),
            tick_interval: Duration::from_millis(10),
            diagnostic_timeout: Duration::from_millis(50),
            terminate_timeout: Duration::from_millis(50),
            error_excerpt_len: 100,
        })
    }

    fn job(uri: &str) -> Arc<Job> {
        Job::new(Source::Magnet(uri.to_string()), PathBuf::from("downloads"), env())
    }

    #[tokio::test]
    async fn add_get_remove() {
        let registry = JobRegistry::new();
        let a = job("magnet:?xt=urn:btih:A");
        let id = a.id().clone();

        registry.add(a.clone()).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&id).await.is_some());
        assert!(matches!(registry.add(a).await, Err(RegistryError::Duplicate(_))));

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.get(&id).await.is_none());
        assert!(registry.remove(&id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_covers_every_job() {
        let registry = JobRegistry::new();
        let a = job("magnet:?xt=urn:btih:A");
        let b = job("magnet:?xt=urn:btih:B");
        registry.add(a.clone()).await.unwrap();
        registry.add(b.clone()).await.unwrap();

        let snapshot = registry.snapshot_all().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[a.id()].status, JobStatus::Pending);
        assert_eq!(snapshot[b.id()].id, *b.id());
    }

    #[tokio::test]
    async fn concurrent_adds_are_all_kept() {
        let registry = Arc::new(JobRegistry::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.add(job(&format!("magnet:?xt=urn:btih:{i}"))).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.snapshot_all().await.len(), 32);
    }
}
