//! Job orchestration and billing engine for VidForge.
//!
//! The orchestrator drives one job from submission through completion:
//! charge the ledger, submit through the credential dispatcher, poll on a
//! declarative schedule until a terminal state or the deadline, refund
//! exactly once on any terminal failure. Callers receive either
//! `succeeded` plus a downloadable asset, or `failed` plus a typed reason
//! — and "failed" implies the account was not billed, with the single
//! documented download-failure exception.

mod config;
mod error;
mod jobs;
mod metrics;
mod orchestrator;
mod retry;
mod schedule;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use jobs::{JobStore, JobStoreError, JobStoreResult, MemoryJobStore, RedisJobStore};
pub use orchestrator::Orchestrator;
pub use retry::{with_retry, RetryConfig};
pub use schedule::PollSchedule;
