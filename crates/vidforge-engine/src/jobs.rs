//! Job record persistence.
//!
//! Job records survive restarts: the redis store keeps one JSON document
//! per job plus a per-account set of non-terminal job ids for the active
//! job cap. The memory store backs tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use vidforge_models::{AccountId, Job, JobId};

pub type JobStoreResult<T> = Result<T, JobStoreError>;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Persistence for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Upsert a job record.
    async fn put(&self, job: &Job) -> JobStoreResult<()>;

    /// Fetch a job record.
    async fn get(&self, id: &JobId) -> JobStoreResult<Option<Job>>;

    /// Number of non-terminal jobs for an account.
    async fn active_count(&self, account_id: AccountId) -> JobStoreResult<u32>;
}

// =============================================================================
// Redis store
// =============================================================================

/// Job store backed by Redis.
pub struct RedisJobStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisJobStore {
    pub fn new(redis_url: &str, key_prefix: impl Into<String>) -> JobStoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:job:{}", self.key_prefix, id)
    }

    fn active_key(&self, account_id: AccountId) -> String {
        format!("{}:acct:{}:active_jobs", self.key_prefix, account_id)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn put(&self, job: &Job) -> JobStoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        let job_key = self.job_key(&job.id);
        let active_key = self.active_key(job.account_id);

        let mut pipe = redis::pipe();
        pipe.atomic().set(&job_key, payload);
        if job.is_terminal() {
            pipe.srem(&active_key, job.id.as_str());
        } else {
            pipe.sadd(&active_key, job.id.as_str());
        }
        pipe.query_async::<()>(&mut conn).await?;

        debug!(job_id = %job.id, state = %job.state, "Stored job");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> JobStoreResult<Option<Job>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = redis::cmd("GET")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn active_count(&self, account_id: AccountId) -> JobStoreResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: u32 = redis::cmd("SCARD")
            .arg(self.active_key(account_id))
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-memory job store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, job: &Job) -> JobStoreResult<()> {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(job.id.as_str().to_string(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> JobStoreResult<Option<Job>> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.get(id.as_str()).cloned())
    }

    async fn active_count(&self, account_id: AccountId) -> JobStoreResult<u32> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .values()
            .filter(|j| j.account_id == account_id && !j.is_terminal())
            .count() as u32)
    }
}
