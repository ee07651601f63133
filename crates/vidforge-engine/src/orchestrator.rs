//! The job orchestrator.
//!
//! Owns the charge/refund decision and the poll loop. The billing contract:
//! - the charge happens before the provider sees anything, so a job that
//!   cannot pay never reaches a vendor
//! - every terminal failure passes through one refund gate keyed on the
//!   job's `charged` flag, so a refund fires at most once no matter how
//!   many failure paths trigger
//! - success never refunds; the charge stands even if a later download
//!   attempt fails, since the asset remains fetchable

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use vidforge_dispatch::{KeyPool, LeasedKey, Pacer};
use vidforge_ledger::TokenLedger;
use vidforge_models::{
    generation_cost, Account, AccountId, GenerationParams, GenerationRequest, Job, JobHandle,
    JobId, JobPhase, JobState, ProviderId, ProviderJobStatus,
};
use vidforge_providers::{ProviderError, ProviderRegistry, ProviderResult, VideoProvider};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::jobs::JobStore;
use crate::metrics;
use crate::retry::{calculate_delay, with_retry};

/// Drives jobs from submission through completion.
pub struct Orchestrator {
    config: EngineConfig,
    ledger: Arc<dyn TokenLedger>,
    jobs: Arc<dyn JobStore>,
    registry: ProviderRegistry,
    pools: HashMap<ProviderId, Arc<KeyPool>>,
    pacer: Pacer,
}

impl Orchestrator {
    /// Wire up the orchestrator from config and its collaborators.
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn TokenLedger>,
        jobs: Arc<dyn JobStore>,
        registry: ProviderRegistry,
    ) -> Self {
        let mut pools = HashMap::new();
        for provider in [ProviderId::Luma, ProviderId::Veo] {
            let keys = config.api_keys_for(provider);
            if let Ok(pool) = KeyPool::new(keys.to_vec(), config.default_cooldown) {
                pools.insert(provider, Arc::new(pool));
            }
        }
        let pacer = Pacer::new(config.min_submit_gap);

        Self {
            config,
            ledger,
            jobs,
            registry,
            pools,
            pacer,
        }
    }

    // =========================================================================
    // Account operations
    // =========================================================================

    /// Create the account on first contact, seeding the free-token grant
    /// exactly once. Returns the resulting account snapshot.
    pub async fn register_account(&self, account_id: AccountId) -> EngineResult<Account> {
        let balance = self
            .ledger
            .ensure_account(account_id, self.config.free_tokens_on_join)
            .await?;
        Ok(Account::new(account_id, balance))
    }

    /// Current token balance.
    pub async fn balance(&self, account_id: AccountId) -> EngineResult<u64> {
        Ok(self.ledger.balance(account_id).await?)
    }

    /// Gift tokens between accounts. All-or-nothing; `false` means the
    /// sender could not cover the amount.
    pub async fn transfer_tokens(
        &self,
        from: AccountId,
        to: AccountId,
        amount: u64,
    ) -> EngineResult<bool> {
        Ok(self.ledger.transfer(from, to, amount).await?)
    }

    // =========================================================================
    // Job lifecycle
    // =========================================================================

    /// Charge the account and submit a generation job.
    ///
    /// Order matters: capability and quota checks run before the charge,
    /// the charge runs before any provider call, and a submit failure
    /// refunds before the error reaches the caller.
    pub async fn submit(&self, request: GenerationRequest) -> EngineResult<JobHandle> {
        let account_id = request.account_id;
        let provider = request.provider;
        let params = request.params.normalized();

        let adapter = self
            .registry
            .get(provider)
            .map_err(EngineError::from_provider)?;
        adapter
            .capabilities()
            .check(&params)
            .map_err(EngineError::from_provider)?;
        let pool = self.pool_for(provider)?;

        let limit = self.config.max_active_jobs_per_account;
        if limit > 0 && self.jobs.active_count(account_id).await? >= limit {
            return Err(EngineError::TooManyActiveJobs { limit });
        }

        let cost = generation_cost(provider, params.render_mode);
        let mut job = Job::new(account_id, provider, params, cost);

        if self.config.is_admin(account_id) {
            debug!(account_id = %account_id, "Admin account, billing bypassed");
        } else {
            if !self.ledger.charge(account_id, cost).await? {
                let balance = self.ledger.balance(account_id).await.unwrap_or(0);
                info!(
                    account_id = %account_id,
                    required = cost,
                    balance,
                    "Submission declined, insufficient balance"
                );
                return Err(EngineError::InsufficientBalance {
                    required: cost,
                    balance,
                });
            }
            job = job.charge_applied();
        }

        if let Err(e) = self.jobs.put(&job).await {
            // Do not keep tokens for a job we failed to record.
            if job.charged {
                self.ledger.refund(account_id, cost).await?;
            }
            return Err(e.into());
        }

        match self
            .submit_with_rotation(adapter.as_ref(), &pool, &job.params)
            .await
        {
            Ok(provider_job_id) => {
                job = job.submitted(provider_job_id);
                self.jobs.put(&job).await?;
                metrics::record_submitted(provider.as_str());
                info!(
                    job_id = %job.id,
                    account_id = %account_id,
                    provider = %provider,
                    cost,
                    "Job submitted"
                );
                Ok(job.handle())
            }
            Err(e) => {
                let reason = e.to_string();
                self.fail_and_refund(job, &reason, "submit_failed").await?;
                Err(EngineError::from_provider(e))
            }
        }
    }

    /// Poll the provider until the job reaches a terminal state or the
    /// wall-clock deadline expires.
    ///
    /// Transient poll errors are retried within each slot per the retry
    /// budget; only exhaustion fails the job. The deadline is a hard
    /// fail-safe — the job is failed and refunded even though the provider
    /// might still complete the render vendor-side.
    pub async fn await_completion(&self, job_id: &JobId) -> EngineResult<JobHandle> {
        let mut job = self.require_job(job_id).await?;
        if job.is_terminal() {
            return Ok(job.handle());
        }

        let provider_job_id = job.provider_job_id.clone().ok_or_else(|| {
            EngineError::JobNotReady {
                job_id: job.id.clone(),
                reason: "job was never submitted".to_string(),
            }
        })?;
        let adapter = self
            .registry
            .get(job.provider)
            .map_err(EngineError::from_provider)?;
        let pool = self.pool_for(job.provider)?;

        let deadline = Instant::now() + self.config.poll_timeout;
        let mut attempt: usize = 0;

        loop {
            let polled = with_retry(&self.config.poll_retry, "poll", || {
                self.poll_once(adapter.as_ref(), &pool, &provider_job_id)
            })
            .await;

            match polled {
                Ok(snapshot) => match snapshot.phase {
                    JobPhase::Succeeded => {
                        let job = job.succeed(snapshot);
                        self.jobs.put(&job).await?;
                        info!(job_id = %job.id, "Job succeeded");
                        return Ok(job.handle());
                    }
                    JobPhase::Failed => {
                        let reason = snapshot
                            .error
                            .clone()
                            .unwrap_or_else(|| "generation failed".to_string());
                        self.fail_and_refund(job, &reason, "provider_failed").await?;
                        return Err(EngineError::ProviderFailed(reason));
                    }
                    JobPhase::Running => {
                        job = job.running(snapshot.progress).with_status(snapshot);
                        self.jobs.put(&job).await?;
                    }
                    JobPhase::Pending => {
                        job = job.with_status(snapshot);
                        self.jobs.put(&job).await?;
                    }
                },
                Err(e) => {
                    // Retry budget exhausted inside this slot.
                    let reason = e.to_string();
                    self.fail_and_refund(job, &reason, "poll_failed").await?;
                    return Err(EngineError::from_provider(e));
                }
            }

            if Instant::now() >= deadline {
                self.fail_and_refund(job, "timeout", "timeout").await?;
                return Err(EngineError::ProviderTimeout);
            }

            tokio::time::sleep(self.config.poll_schedule.interval_for(attempt)).await;
            attempt += 1;
        }
    }

    /// Fetch the rendered asset for a succeeded job.
    ///
    /// A failure here does not refund: the provider delivered, and the
    /// asset stays fetchable by calling `download` again.
    pub async fn download(&self, job_id: &JobId) -> EngineResult<PathBuf> {
        let job = self.require_job(job_id).await?;
        if job.state != JobState::Succeeded {
            return Err(EngineError::JobNotReady {
                job_id: job.id.clone(),
                reason: format!("state is {}", job.state),
            });
        }
        let provider_job_id = job.provider_job_id.as_deref().ok_or_else(|| {
            EngineError::JobNotReady {
                job_id: job.id.clone(),
                reason: "no provider job id".to_string(),
            }
        })?;

        let adapter = self
            .registry
            .get(job.provider)
            .map_err(EngineError::from_provider)?;
        let pool = self.pool_for(job.provider)?;
        let key = pool.pick();

        let path = adapter
            .download(provider_job_id, &key.credential, &self.config.download_dir)
            .await
            .map_err(EngineError::from_provider)?;
        info!(job_id = %job.id, path = %path.display(), "Asset downloaded");
        Ok(path)
    }

    /// Current job record (status lookups from the chat layer).
    pub async fn job(&self, job_id: &JobId) -> EngineResult<Job> {
        self.require_job(job_id).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn pool_for(&self, provider: ProviderId) -> EngineResult<Arc<KeyPool>> {
        self.pools.get(&provider).cloned().ok_or_else(|| {
            EngineError::Unsupported(format!("no credentials configured for {}", provider))
        })
    }

    async fn require_job(&self, job_id: &JobId) -> EngineResult<Job> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(job_id.clone()))
    }

    /// One poll attempt with the currently-best credential. A throttle
    /// signal cools that credential down before the error propagates to
    /// the retry wrapper.
    async fn poll_once(
        &self,
        adapter: &dyn VideoProvider,
        pool: &Arc<KeyPool>,
        provider_job_id: &str,
    ) -> ProviderResult<ProviderJobStatus> {
        let key = pool.pick();
        let result = adapter.poll(provider_job_id, &key.credential).await;
        if let Err(e) = &result {
            self.note_throttle(adapter, pool, &key, e);
        }
        result
    }

    /// Submission with credential rotation.
    ///
    /// A throttled attempt cools the key down and the next attempt picks
    /// the next credential, so a single saturated key does not fail the
    /// job while others in the pool are idle.
    async fn submit_with_rotation(
        &self,
        adapter: &dyn VideoProvider,
        pool: &Arc<KeyPool>,
        params: &GenerationParams,
    ) -> ProviderResult<String> {
        let retry = &self.config.submit_retry;
        let mut last_error = None;

        for attempt in 0..=retry.max_retries {
            self.pacer.wait().await;
            let key = pool.pick();

            match adapter.submit(params, &key.credential).await {
                Ok(provider_job_id) => return Ok(provider_job_id),
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    self.note_throttle(adapter, pool, &key, &e);
                    // Rotation may hand the next attempt a fresh key, so
                    // back off without the throttle hint.
                    let delay = calculate_delay(retry, attempt, None);
                    warn!(
                        provider = %adapter.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Submit failed, retrying: {}",
                        e
                    );
                    metrics::record_retry("submit");
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => {
                    self.note_throttle(adapter, pool, &key, &e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::transient("submit retries exhausted")))
    }

    fn note_throttle(
        &self,
        adapter: &dyn VideoProvider,
        pool: &Arc<KeyPool>,
        key: &LeasedKey,
        err: &ProviderError,
    ) {
        if err.is_throttled() {
            pool.mark_rate_limited(key.index, err.retry_after());
            metrics::record_throttle_hit(adapter.id().as_str());
        }
    }

    /// The single refund gate.
    ///
    /// Every terminal failure funnels through here; the `charged` flag is
    /// cleared together with the state write, so overlapping failure paths
    /// refund at most once.
    async fn fail_and_refund(
        &self,
        job: Job,
        reason: &str,
        metric_reason: &'static str,
    ) -> EngineResult<Job> {
        let mut failed = job.fail(reason);

        if failed.charged {
            self.ledger.refund(failed.account_id, failed.cost).await?;
            metrics::record_refund();
            failed = failed.refunded();
        }

        metrics::record_job_failed(metric_reason);
        self.jobs.put(&failed).await?;
        warn!(job_id = %failed.id, reason, "Job failed");
        Ok(failed)
    }
}
