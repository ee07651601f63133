//! Job records tracked from submission to terminal outcome.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccountId, GenerationParams, ProviderId, ProviderJobStatus};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
///
/// Transitions are monotonic forward: `Queued → Submitted → Running →
/// Succeeded`. `Failed` is terminal and reachable from any prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, ledger untouched
    #[default]
    Queued,
    /// Charged and accepted by the provider
    Submitted,
    /// Provider reports active rendering
    Running,
    /// Rendered asset is available for download
    Succeeded,
    /// Terminal failure; any charge has been refunded
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One request-to-render cycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Billing account
    pub account_id: AccountId,

    /// Rendering provider
    pub provider: ProviderId,

    /// Request parameters as submitted
    pub params: GenerationParams,

    /// Provider-side job identifier, assigned once submit returns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_job_id: Option<String>,

    /// Lifecycle state
    #[serde(default)]
    pub state: JobState,

    /// Tokens charged for this job
    pub cost: u64,

    /// Whether the charge is outstanding (cleared by the single refund)
    pub charged: bool,

    /// Last progress seen from the provider (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Last provider snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<ProviderJobStatus>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When the provider accepted the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job. The ledger has not been touched yet.
    pub fn new(
        account_id: impl Into<AccountId>,
        provider: ProviderId,
        params: GenerationParams,
        cost: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            account_id: account_id.into(),
            provider,
            params,
            provider_job_id: None,
            state: JobState::Queued,
            cost,
            charged: false,
            progress: 0,
            last_status: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Record the successful charge.
    pub fn charge_applied(mut self) -> Self {
        self.charged = true;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as accepted by the provider.
    pub fn submitted(mut self, provider_job_id: impl Into<String>) -> Self {
        self.provider_job_id = Some(provider_job_id.into());
        self.state = JobState::Submitted;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as actively rendering.
    pub fn running(mut self, progress: u8) -> Self {
        self.state = JobState::Running;
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as succeeded.
    pub fn succeed(mut self, status: ProviderJobStatus) -> Self {
        self.state = JobState::Succeeded;
        self.progress = 100;
        self.last_status = Some(status);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Record the refund; the charge is no longer outstanding.
    pub fn refunded(mut self) -> Self {
        self.charged = false;
        self.updated_at = Utc::now();
        self
    }

    /// Retain the latest provider snapshot.
    pub fn with_status(mut self, status: ProviderJobStatus) -> Self {
        self.progress = status.progress.min(100);
        self.last_status = Some(status);
        self.updated_at = Utc::now();
        self
    }

    /// Check if the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Handle exposed to the chat layer.
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.id.clone(),
            state: self.state,
        }
    }
}

/// What the chat layer holds while a job is in flight.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobHandle {
    /// Job ID
    pub job_id: JobId,
    /// Lifecycle state at the time the handle was produced
    pub state: JobState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderJobStatus;

    fn test_job() -> Job {
        Job::new(
            1001,
            ProviderId::Luma,
            GenerationParams::new("a lighthouse at dawn"),
            2,
        )
    }

    #[test]
    fn test_job_creation() {
        let job = test_job();
        assert_eq!(job.state, JobState::Queued);
        assert!(!job.charged);
        assert!(job.provider_job_id.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_job_happy_path_transitions() {
        let job = test_job().charge_applied().submitted("gen-abc");

        assert_eq!(job.state, JobState::Submitted);
        assert!(job.charged);
        assert_eq!(job.provider_job_id.as_deref(), Some("gen-abc"));
        assert!(job.started_at.is_some());

        let job = job.running(40);
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.progress, 40);

        let job = job.succeed(ProviderJobStatus::succeeded("https://cdn/a.mp4"));
        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.progress, 100);
        assert!(job.is_terminal());
        assert!(job.charged, "success never refunds");
    }

    #[test]
    fn test_job_failure_from_any_state() {
        let queued = test_job().fail("provider rejected");
        assert_eq!(queued.state, JobState::Failed);
        assert!(queued.completed_at.is_some());

        let running = test_job().charge_applied().submitted("x").running(10);
        let failed = running.fail("timeout").refunded();
        assert_eq!(failed.state, JobState::Failed);
        assert!(!failed.charged);
    }

    #[test]
    fn test_handle_reflects_state() {
        let job = test_job().charge_applied().submitted("gen-1");
        let handle = job.handle();
        assert_eq!(handle.job_id, job.id);
        assert_eq!(handle.state, JobState::Submitted);
    }
}
