//! In-process registry for background PDF preparation.
//!
//! Jobs live in memory only and are forgotten on restart. Finished jobs are
//! kept for the configured retention window, then purged lazily on the next
//! registry access.

pub mod poll;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbId;
use crate::error::ReportError;

pub use poll::{poll_until_terminal, JobPoller, PollOutcome, PollPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct SigningJob {
    pub id: Uuid,
    pub report_id: DbId,
    pub company_id: DbId,
    pub status: JobStatus,
    /// Where the result landed once completed.
    pub result_artifact_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    finished_at: Option<Instant>,
}

/// Response to a prepare request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// What a status lookup returns.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_artifact_ref: Option<String>,
}

impl From<&SigningJob> for JobAccepted {
    fn from(job: &SigningJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
        }
    }
}

impl From<&SigningJob> for JobStatusView {
    fn from(job: &SigningJob) -> Self {
        Self {
            status: job.status,
            error: job.error.clone(),
            result_artifact_ref: job.result_artifact_ref.clone(),
        }
    }
}

fn unsigned_artifact_ref(report_id: DbId) -> String {
    format!("reports/{}/unsigned", report_id)
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<Uuid, SigningJob>,
    /// (company, report) -> job that is pending or processing.
    in_flight: HashMap<(DbId, DbId), Uuid>,
}

impl Registry {
    fn purge(&mut self, retention: Duration) {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| job.finished_at.map_or(true, |t| t.elapsed() < retention));
        let purged = before - self.jobs.len();
        if purged > 0 {
            log::debug!("Purged {} expired jobs", purged);
        }
    }
}

#[derive(Clone)]
pub struct JobTracker {
    registry: Arc<Mutex<Registry>>,
    retention: Duration,
}

impl JobTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            retention,
        }
    }

    /// Start `work` in the background for a report, or return the job that
    /// is already running for it.
    pub fn submit<F, Fut>(&self, company_id: DbId, report_id: DbId, work: F) -> SigningJob
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ReportError>> + Send + 'static,
    {
        let job = {
            let mut registry = self.registry.lock();
            registry.purge(self.retention);

            if let Some(existing) = registry
                .in_flight
                .get(&(company_id, report_id))
                .and_then(|id| registry.jobs.get(id))
            {
                log::info!(
                    "Reusing job {} for report {} ({:?})",
                    existing.id,
                    report_id,
                    existing.status
                );
                return existing.clone();
            }

            let job = SigningJob {
                id: Uuid::new_v4(),
                report_id,
                company_id,
                status: JobStatus::Pending,
                result_artifact_ref: None,
                error: None,
                created_at: Utc::now(),
                finished_at: None,
            };
            registry.in_flight.insert((company_id, report_id), job.id);
            registry.jobs.insert(job.id, job.clone());
            job
        };

        log::info!("Queued job {} for report {}", job.id, report_id);
        let tracker = self.clone();
        let job_id = job.id;
        let fut = work();
        tokio::spawn(async move {
            tracker.transition(job_id, JobStatus::Processing, None);
            match fut.await {
                Ok(()) => tracker.transition(job_id, JobStatus::Completed, None),
                Err(e) => {
                    log::error!("Job {} for report {} failed: {}", job_id, report_id, e);
                    tracker.transition(job_id, JobStatus::Failed, Some(e.public_message()));
                }
            }
        });
        job
    }

    fn transition(&self, job_id: Uuid, status: JobStatus, error: Option<String>) {
        let mut registry = self.registry.lock();
        let Some(job) = registry.jobs.get_mut(&job_id) else {
            return;
        };
        job.status = status;
        job.error = error;
        if status == JobStatus::Completed {
            job.result_artifact_ref = Some(unsigned_artifact_ref(job.report_id));
        }
        if status.is_terminal() {
            job.finished_at = Some(Instant::now());
            let key = (job.company_id, job.report_id);
            if registry.in_flight.get(&key) == Some(&job_id) {
                registry.in_flight.remove(&key);
            }
        }
    }

    /// Register work that already finished on the caller's path, so the
    /// synchronous and background prepare answer with the same shape.
    pub fn record_completed(&self, company_id: DbId, report_id: DbId) -> SigningJob {
        let job = SigningJob {
            id: Uuid::new_v4(),
            report_id,
            company_id,
            status: JobStatus::Completed,
            result_artifact_ref: Some(unsigned_artifact_ref(report_id)),
            error: None,
            created_at: Utc::now(),
            finished_at: Some(Instant::now()),
        };
        let mut registry = self.registry.lock();
        registry.purge(self.retention);
        registry.jobs.insert(job.id, job.clone());
        job
    }

    /// Job of the caller's company. Unknown and foreign ids both yield `None`.
    pub fn status(&self, company_id: DbId, job_id: Uuid) -> Option<SigningJob> {
        let mut registry = self.registry.lock();
        registry.purge(self.retention);
        registry
            .jobs
            .get(&job_id)
            .filter(|job| job.company_id == company_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    async fn wait_terminal(tracker: &JobTracker, company_id: DbId, id: Uuid) -> SigningJob {
        for _ in 0..200 {
            let job = tracker.status(company_id, id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} never finished", id);
    }

    #[tokio::test]
    async fn test_second_submit_reuses_running_job() {
        let tracker = JobTracker::new(Duration::from_secs(60));
        let (release, gate) = oneshot::channel::<()>();

        let first = tracker.submit(1, 10, || async move {
            let _ = gate.await;
            Ok(())
        });
        let reruns = AtomicUsize::new(0);
        let second = tracker.submit(1, 10, || {
            reruns.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        assert_eq!(first.id, second.id);
        assert_eq!(reruns.load(Ordering::SeqCst), 0);

        release.send(()).unwrap();
        let done = wait_terminal(&tracker, 1, first.id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result_artifact_ref.as_deref(), Some("reports/10/unsigned"));

        let third = tracker.submit(1, 10, || async { Ok(()) });
        assert_ne!(third.id, first.id);
    }

    #[tokio::test]
    async fn test_failed_job_keeps_public_message() {
        let tracker = JobTracker::new(Duration::from_secs(60));
        let job = tracker.submit(1, 11, || async {
            Err(ReportError::Internal("password=hunter2".to_string()))
        });
        let done = wait_terminal(&tracker, 1, job.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("An internal error occurred"));
    }

    #[tokio::test]
    async fn test_status_is_tenant_scoped_and_unknown_is_none() {
        let tracker = JobTracker::new(Duration::from_secs(60));
        let job = tracker.submit(1, 12, || async { Ok(()) });
        assert!(tracker.status(2, job.id).is_none());
        assert!(tracker.status(1, Uuid::new_v4()).is_none());
        assert!(tracker.status(1, job.id).is_some());
    }

    #[tokio::test]
    async fn test_finished_jobs_are_purged_after_retention() {
        let tracker = JobTracker::new(Duration::from_millis(10));
        let job = tracker.submit(1, 13, || async { Ok(()) });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tracker.status(1, job.id).is_none());
    }
}
