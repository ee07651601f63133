//! Engine error types.
//!
//! This is the taxonomy the chat layer sees. Transient provider trouble is
//! absorbed inside the engine and only surfaces here once retry budgets are
//! exhausted; every terminal failure has already passed through the refund
//! gate by the time it reaches a caller.

use thiserror::Error;

use vidforge_ledger::LedgerError;
use vidforge_models::JobId;
use vidforge_providers::ProviderError;

use crate::jobs::JobStoreError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Insufficient balance: need {required}, have {balance}")]
    InsufficientBalance { required: u64, balance: u64 },

    #[error("Provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("Provider quota exhausted")]
    ProviderThrottled,

    #[error("Provider unavailable: {0}")]
    ProviderTransient(String),

    #[error("Generation timed out")]
    ProviderTimeout,

    #[error("Generation failed: {0}")]
    ProviderFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),

    #[error("Too many active jobs (limit {limit})")]
    TooManyActiveJobs { limit: u32 },

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {job_id} is not ready: {reason}")]
    JobNotReady { job_id: JobId, reason: String },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Job store error: {0}")]
    JobStore(#[from] JobStoreError),
}

impl EngineError {
    /// Map a terminal provider error onto the engine taxonomy.
    ///
    /// Used only after local retries are exhausted; retryable classes are
    /// handled before anything escapes as a job failure.
    pub fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { status, message } => {
                Self::ProviderRejected(format!("{} ({})", message, status))
            }
            ProviderError::Throttled { .. } => Self::ProviderThrottled,
            ProviderError::Transient(msg) => Self::ProviderTransient(msg),
            ProviderError::InvalidResponse(msg) => Self::ProviderTransient(msg),
            ProviderError::DownloadFailed(msg) => Self::DownloadFailed(msg),
            ProviderError::Unsupported(msg) => Self::Unsupported(msg),
            ProviderError::Io(e) => Self::DownloadFailed(e.to_string()),
        }
    }

    /// Short human-readable reason for the chat layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            EngineError::InsufficientBalance { .. } => "insufficient balance",
            EngineError::ProviderRejected(_) => "provider rejected the request",
            EngineError::ProviderThrottled => "quota exceeded, try again later",
            EngineError::ProviderTransient(_) => "provider error, try again later",
            EngineError::ProviderTimeout => "generation timed out",
            EngineError::ProviderFailed(_) => "provider error",
            EngineError::DownloadFailed(_) => "could not fetch the video",
            EngineError::Unsupported(_) => "this provider does not support that request",
            EngineError::TooManyActiveJobs { .. } => "too many active generations",
            EngineError::JobNotFound(_) => "unknown job",
            EngineError::JobNotReady { .. } => "job is not finished",
            EngineError::Ledger(_) | EngineError::JobStore(_) => "internal error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_mapping() {
        let err = EngineError::from_provider(ProviderError::Rejected {
            status: 403,
            message: "forbidden".into(),
        });
        assert!(matches!(err, EngineError::ProviderRejected(_)));

        let err = EngineError::from_provider(ProviderError::throttled(None));
        assert!(matches!(err, EngineError::ProviderThrottled));

        let err = EngineError::from_provider(ProviderError::transient("io"));
        assert!(matches!(err, EngineError::ProviderTransient(_)));
    }

    #[test]
    fn test_user_messages_are_nonempty() {
        assert!(!EngineError::ProviderTimeout.user_message().is_empty());
        assert!(!EngineError::InsufficientBalance {
            required: 2,
            balance: 0
        }
        .user_message()
        .is_empty());
    }
}
