//! Engine configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use vidforge_models::{AccountId, ProviderId, FREE_TOKENS_ON_JOIN};

use crate::retry::RetryConfig;
use crate::schedule::PollSchedule;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Poll interval schedule
    pub poll_schedule: PollSchedule,
    /// Hard wall-clock deadline for one job's poll loop
    pub poll_timeout: Duration,
    /// Retry budget for a single poll slot
    pub poll_retry: RetryConfig,
    /// Retry budget for submission (throttle rotation included)
    pub submit_retry: RetryConfig,
    /// Where downloaded assets land
    pub download_dir: PathBuf,
    /// Default credential cooldown after a rate-limit signal
    pub default_cooldown: Duration,
    /// Process-wide minimum gap between submissions
    pub min_submit_gap: Duration,
    /// Tokens granted to a brand-new account
    pub free_tokens_on_join: u64,
    /// Accounts that are never charged
    pub admin_accounts: HashSet<AccountId>,
    /// Cap on concurrently active jobs per account (0 disables the cap)
    pub max_active_jobs_per_account: u32,
    /// Luma API keys
    pub luma_api_keys: Vec<String>,
    /// Veo API keys
    pub veo_api_keys: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_schedule: PollSchedule::default(),
            poll_timeout: Duration::from_secs(20 * 60),
            poll_retry: RetryConfig::default(),
            submit_retry: RetryConfig::default(),
            download_dir: std::env::temp_dir().join("vidforge"),
            default_cooldown: Duration::from_secs(60),
            min_submit_gap: Duration::from_secs(1),
            free_tokens_on_join: FREE_TOKENS_ON_JOIN,
            admin_accounts: HashSet::new(),
            max_active_jobs_per_account: 1,
            luma_api_keys: Vec::new(),
            veo_api_keys: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_schedule: defaults.poll_schedule,
            poll_timeout: Duration::from_secs(
                env_parse("VIDFORGE_JOB_MAX_WAIT_MIN", 20u64) * 60,
            ),
            poll_retry: defaults.poll_retry,
            submit_retry: defaults.submit_retry,
            download_dir: std::env::var("VIDFORGE_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            default_cooldown: Duration::from_secs(env_parse(
                "VIDFORGE_KEY_COOLDOWN_SECS",
                60u64,
            )),
            min_submit_gap: Duration::from_millis(env_parse(
                "VIDFORGE_MIN_SUBMIT_GAP_MS",
                1000u64,
            )),
            free_tokens_on_join: env_parse("VIDFORGE_FREE_TOKENS_ON_JOIN", FREE_TOKENS_ON_JOIN),
            admin_accounts: parse_account_list(
                &std::env::var("VIDFORGE_ADMIN_ACCOUNTS").unwrap_or_default(),
            ),
            max_active_jobs_per_account: env_parse("VIDFORGE_MAX_ACTIVE_JOBS", 1u32),
            luma_api_keys: parse_key_list(&std::env::var("VIDFORGE_LUMA_API_KEYS").unwrap_or_default()),
            veo_api_keys: parse_key_list(&std::env::var("VIDFORGE_VEO_API_KEYS").unwrap_or_default()),
        }
    }

    /// Check if the account bypasses billing.
    pub fn is_admin(&self, account_id: AccountId) -> bool {
        self.admin_accounts.contains(&account_id)
    }

    /// Configured credentials for a provider.
    pub fn api_keys_for(&self, provider: ProviderId) -> &[String] {
        match provider {
            ProviderId::Luma => &self.luma_api_keys,
            ProviderId::Veo => &self.veo_api_keys,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma/space/semicolon separated account id list.
fn parse_account_list(raw: &str) -> HashSet<AccountId> {
    raw.split([',', ';', ' '])
        .filter_map(|tok| tok.trim().parse::<i64>().ok())
        .map(AccountId)
        .collect()
}

/// Parse a comma-separated credential list, dropping empties.
fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
