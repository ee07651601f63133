//! Redis-backed ledger.
//!
//! Balances live at `{prefix}:acct:{id}:balance`. The conditional decrement
//! and the transfer run as server-side Lua, so the compare-and-write is one
//! atomic round trip regardless of how many processes share the pool.

use async_trait::async_trait;
use redis::Script;
use tracing::{debug, info};

use vidforge_models::AccountId;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::TokenLedger;

/// Decrement iff the balance covers the amount.
/// Returns -1 when the account key is missing, 0 on insufficient funds,
/// 1 on success.
const CHARGE_SCRIPT: &str = r#"
local bal = redis.call('GET', KEYS[1])
if not bal then return -1 end
local amount = tonumber(ARGV[1])
if tonumber(bal) >= amount then
    redis.call('DECRBY', KEYS[1], amount)
    return 1
end
return 0
"#;

/// Move the amount between two balances in one atomic step.
/// Same return convention as the charge script.
const TRANSFER_SCRIPT: &str = r#"
local bal = redis.call('GET', KEYS[1])
if not bal then return -1 end
local amount = tonumber(ARGV[1])
if tonumber(bal) < amount then return 0 end
redis.call('DECRBY', KEYS[1], amount)
redis.call('INCRBY', KEYS[2], amount)
return 1
"#;

/// Redis ledger configuration.
#[derive(Debug, Clone)]
pub struct RedisLedgerConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key namespace prefix
    pub key_prefix: String,
}

impl Default for RedisLedgerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "vf".to_string(),
        }
    }
}

impl RedisLedgerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("VIDFORGE_REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("VIDFORGE_KEY_PREFIX").unwrap_or_else(|_| "vf".to_string()),
        }
    }
}

/// Ledger backed by Redis.
pub struct RedisLedger {
    client: redis::Client,
    config: RedisLedgerConfig,
    charge_script: Script,
    transfer_script: Script,
}

impl RedisLedger {
    /// Create a new Redis ledger.
    pub fn new(config: RedisLedgerConfig) -> LedgerResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            charge_script: Script::new(CHARGE_SCRIPT),
            transfer_script: Script::new(TRANSFER_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> LedgerResult<Self> {
        Self::new(RedisLedgerConfig::from_env())
    }

    fn balance_key(&self, id: AccountId) -> String {
        format!("{}:acct:{}:balance", self.config.key_prefix, id)
    }

    async fn connection(&self) -> LedgerResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl TokenLedger for RedisLedger {
    async fn ensure_account(&self, id: AccountId, starting_balance: u64) -> LedgerResult<u64> {
        let mut conn = self.connection().await?;
        let key = self.balance_key(id);

        let created: bool = redis::cmd("SET")
            .arg(&key)
            .arg(starting_balance)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        if created {
            info!(account_id = %id, starting_balance, "Created account");
        }

        let balance: u64 = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        Ok(balance)
    }

    async fn balance(&self, id: AccountId) -> LedgerResult<u64> {
        let mut conn = self.connection().await?;
        let balance: Option<u64> = redis::cmd("GET")
            .arg(self.balance_key(id))
            .query_async(&mut conn)
            .await?;
        balance.ok_or(LedgerError::AccountNotFound(id))
    }

    async fn charge(&self, id: AccountId, amount: u64) -> LedgerResult<bool> {
        let mut conn = self.connection().await?;
        let outcome: i64 = self
            .charge_script
            .key(self.balance_key(id))
            .arg(amount)
            .invoke_async(&mut conn)
            .await?;

        match outcome {
            1 => {
                info!(account_id = %id, amount, "Charged tokens");
                Ok(true)
            }
            0 => {
                debug!(account_id = %id, amount, "Charge declined");
                Ok(false)
            }
            _ => Err(LedgerError::AccountNotFound(id)),
        }
    }

    async fn refund(&self, id: AccountId, amount: u64) -> LedgerResult<()> {
        let mut conn = self.connection().await?;
        let balance_after: u64 = redis::cmd("INCRBY")
            .arg(self.balance_key(id))
            .arg(amount)
            .query_async(&mut conn)
            .await?;
        info!(account_id = %id, amount, balance_after, "Refunded tokens");
        Ok(())
    }

    async fn credit(&self, id: AccountId, amount: u64) -> LedgerResult<()> {
        let mut conn = self.connection().await?;
        let balance_after: u64 = redis::cmd("INCRBY")
            .arg(self.balance_key(id))
            .arg(amount)
            .query_async(&mut conn)
            .await?;
        info!(account_id = %id, amount, balance_after, "Credited tokens");
        Ok(())
    }

    async fn transfer(&self, from: AccountId, to: AccountId, amount: u64) -> LedgerResult<bool> {
        let mut conn = self.connection().await?;
        let outcome: i64 = self
            .transfer_script
            .key(self.balance_key(from))
            .key(self.balance_key(to))
            .arg(amount)
            .invoke_async(&mut conn)
            .await?;

        match outcome {
            1 => {
                info!(from = %from, to = %to, amount, "Transferred tokens");
                Ok(true)
            }
            0 => {
                debug!(from = %from, to = %to, amount, "Transfer declined");
                Ok(false)
            }
            _ => Err(LedgerError::AccountNotFound(from)),
        }
    }
}
