//! Client-side polling of a background job until it settles.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use super::{JobStatus, JobStatusView};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// How a poll ended. `Unknown` means the outcome was never observed: the
/// attempts ran out or the job could not be looked up. It is not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed(Option<String>),
    Unknown,
}

/// Call `fetch` until it reports a terminal status, a lookup error occurs,
/// or the policy runs out of attempts.
pub async fn poll_until_terminal<F, Fut, E>(policy: &PollPolicy, mut fetch: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobStatusView, E>>,
    E: std::fmt::Display,
{
    for attempt in 1..=policy.max_attempts {
        match fetch().await {
            Ok(view) => match view.status {
                JobStatus::Completed => return PollOutcome::Completed,
                JobStatus::Failed => return PollOutcome::Failed(view.error),
                JobStatus::Pending | JobStatus::Processing => {}
            },
            Err(e) => {
                log::warn!("Job lookup failed on attempt {}: {}", attempt, e);
                return PollOutcome::Unknown;
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    PollOutcome::Unknown
}

#[derive(Deserialize)]
struct Envelope {
    data: Option<JobStatusView>,
}

/// Polls `GET /api/reports/jobs/{id}` of a running server.
pub struct JobPoller {
    client: reqwest::Client,
    base_url: String,
    token: String,
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(client: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch(&self, job_id: Uuid) -> Result<JobStatusView, String> {
        let url = format!("{}/api/reports/jobs/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let envelope: Envelope = response.json().await.map_err(|e| e.to_string())?;
        envelope.data.ok_or_else(|| "missing data".to_string())
    }

    pub async fn wait(&self, job_id: Uuid) -> PollOutcome {
        poll_until_terminal(&self.policy, || self.fetch(job_id)).await
    }
}
