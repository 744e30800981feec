use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::parser::ArticleRecord;

pub type JobId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A background scrape requested over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub articles: Option<Vec<ArticleRecord>>,
}

impl Job {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
            articles: None,
        }
    }

    fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Finished jobs kept for polling before the oldest are evicted.
pub const DEFAULT_RETAINED_JOBS: usize = 100;

/// In-memory job table. Pending and running jobs are always kept; only the
/// most recently finished `retained` jobs are.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    retained: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retained: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retained,
        }
    }

    pub async fn create(&self) -> Job {
        let job = Job::new();
        self.jobs.write().await.insert(job.id, job.clone());
        job
    }

    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn mark_running(&self, id: JobId) {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.status = JobStatus::Running;
        }
    }

    pub async fn complete(&self, id: JobId, articles: Vec<ArticleRecord>) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            job.status = JobStatus::Completed;
            job.finished_at = Some(Utc::now());
            job.articles = Some(articles);
        }
        self.evict(&mut jobs);
    }

    pub async fn fail(&self, id: JobId, error: String) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.finished_at = Some(Utc::now());
            job.error = Some(error);
        }
        self.evict(&mut jobs);
    }

    /// Drop the oldest finished jobs beyond the retention limit.
    fn evict(&self, jobs: &mut HashMap<JobId, Job>) {
        let mut finished: Vec<(DateTime<Utc>, JobId)> = jobs
            .values()
            .filter(|job| job.is_finished())
            .map(|job| (job.finished_at.unwrap_or(job.created_at), job.id))
            .collect();
        if finished.len() <= self.retained {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.retained;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
            debug!("Evicted finished job {}", id);
        }
    }
}
