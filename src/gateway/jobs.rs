//! In-memory transcription jobs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::provider::{JobStatus, TranscriptionResult};

/// Finished jobs nobody collected are dropped after this long
pub const FINISHED_JOB_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct Job {
    result: TranscriptionResult,
    updated: Instant,
}

/// Transcription jobs keyed by UUID
///
/// A finished job is handed out once and then forgotten.
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    ttl: Duration,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::with_ttl(FINISHED_JOB_TTL)
    }
}

impl JobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose uncollected finished jobs expire after `ttl`
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Register a queued job and return its id
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut jobs = self.jobs.write().await;
        self.sweep(&mut jobs);
        jobs.insert(
            id.clone(),
            Job {
                result: TranscriptionResult::pending(JobStatus::Queued),
                updated: Instant::now(),
            },
        );
        tracing::debug!(job_id = %id, "transcription job created");
        id
    }

    /// Replace the state of a job
    pub async fn update(&self, id: &str, result: TranscriptionResult) {
        tracing::debug!(job_id = %id, status = ?result.status, "transcription job updated");
        self.jobs.write().await.insert(
            id.to_string(),
            Job {
                result,
                updated: Instant::now(),
            },
        );
    }

    /// Current state of a job; a finished job is removed once read
    pub async fn fetch(&self, id: &str) -> Option<TranscriptionResult> {
        let mut jobs = self.jobs.write().await;
        if jobs.get(id)?.result.status.is_terminal() {
            tracing::debug!(job_id = %id, "transcription job collected");
            jobs.remove(id).map(|job| job.result)
        } else {
            jobs.get(id).map(|job| job.result.clone())
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    fn sweep(&self, jobs: &mut HashMap<String, Job>) {
        let before = jobs.len();
        jobs.retain(|_, job| !job.result.status.is_terminal() || job.updated.elapsed() < self.ttl);
        let dropped = before - jobs.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired uncollected transcription jobs");
        }
    }
}
