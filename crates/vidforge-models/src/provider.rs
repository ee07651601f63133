//! Provider identity and the normalized poll snapshot.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported rendering providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Luma Dream Machine
    Luma,
    /// Google Veo
    Veo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Luma => "luma",
            ProviderId::Veo => "veo",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "luma" => Ok(ProviderId::Luma),
            "veo" | "veo3" => Ok(ProviderId::Veo),
            _ => Err(ProviderIdParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown provider: {0}")]
pub struct ProviderIdParseError(String);

/// Phase of a provider-side job, normalized across vendors.
///
/// Every vendor vocabulary is mapped onto these four states. Unknown or
/// ambiguous vendor states map to `Pending` — never to `Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Accepted but not yet running
    #[default]
    Pending,
    /// Actively rendering
    Running,
    /// Finished with a downloadable result
    Succeeded,
    /// Finished without a result
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Pending => "pending",
            JobPhase::Running => "running",
            JobPhase::Succeeded => "succeeded",
            JobPhase::Failed => "failed",
        }
    }

    /// Check if this is a terminal phase (no more polling needed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a provider job as reported by one poll call.
///
/// Ephemeral by design; only the last-seen snapshot is retained on the job
/// record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ProviderJobStatus {
    /// Normalized phase
    pub phase: JobPhase,

    /// Progress (0-100), best effort — many vendors report none
    #[serde(default)]
    pub progress: u8,

    /// Vendor error message (only on Failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Reference to the rendered asset (only on Succeeded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
}

impl ProviderJobStatus {
    pub fn pending(progress: u8) -> Self {
        Self {
            phase: JobPhase::Pending,
            progress: progress.min(100),
            error: None,
            result_ref: None,
        }
    }

    pub fn running(progress: u8) -> Self {
        Self {
            phase: JobPhase::Running,
            progress: progress.min(100),
            error: None,
            result_ref: None,
        }
    }

    pub fn succeeded(result_ref: impl Into<String>) -> Self {
        Self {
            phase: JobPhase::Succeeded,
            progress: 100,
            error: None,
            result_ref: Some(result_ref.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            phase: JobPhase::Failed,
            progress: 0,
            error: Some(error.into()),
            result_ref: None,
        }
    }

    /// Check if this snapshot is terminal.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_roundtrip() {
        assert_eq!("luma".parse::<ProviderId>().unwrap(), ProviderId::Luma);
        assert_eq!("veo".parse::<ProviderId>().unwrap(), ProviderId::Veo);
        assert_eq!("VEO3".parse::<ProviderId>().unwrap(), ProviderId::Veo);
        assert!("runway".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_phase_terminal() {
        assert!(!JobPhase::Pending.is_terminal());
        assert!(!JobPhase::Running.is_terminal());
        assert!(JobPhase::Succeeded.is_terminal());
        assert!(JobPhase::Failed.is_terminal());
    }

    #[test]
    fn test_status_constructors() {
        let s = ProviderJobStatus::succeeded("https://cdn.example.com/a.mp4");
        assert_eq!(s.phase, JobPhase::Succeeded);
        assert_eq!(s.progress, 100);
        assert!(s.result_ref.is_some());

        let f = ProviderJobStatus::failed("boom");
        assert_eq!(f.phase, JobPhase::Failed);
        assert_eq!(f.error.as_deref(), Some("boom"));

        let p = ProviderJobStatus::pending(250);
        assert_eq!(p.progress, 100); // clamped
    }
}
