//! In-memory ledger for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use vidforge_models::AccountId;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::TokenLedger;

/// Ledger backed by a mutex-guarded map.
///
/// Every operation takes the lock once, so the conditional decrement and
/// the transfer are atomic with respect to concurrent callers.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<AccountId, u64>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger with pre-seeded balances (test convenience).
    pub fn with_balances(entries: impl IntoIterator<Item = (AccountId, u64)>) -> Self {
        Self {
            balances: Mutex::new(entries.into_iter().collect()),
        }
    }
}

#[async_trait]
impl TokenLedger for MemoryLedger {
    async fn ensure_account(&self, id: AccountId, starting_balance: u64) -> LedgerResult<u64> {
        let mut balances = self.balances.lock().await;
        let balance = *balances.entry(id).or_insert_with(|| {
            info!(account_id = %id, starting_balance, "Created account");
            starting_balance
        });
        Ok(balance)
    }

    async fn balance(&self, id: AccountId) -> LedgerResult<u64> {
        let balances = self.balances.lock().await;
        balances
            .get(&id)
            .copied()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn charge(&self, id: AccountId, amount: u64) -> LedgerResult<bool> {
        let mut balances = self.balances.lock().await;
        let balance = balances
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;

        if *balance < amount {
            debug!(account_id = %id, amount, balance = *balance, "Charge declined");
            return Ok(false);
        }

        *balance -= amount;
        info!(account_id = %id, amount, balance_after = *balance, "Charged tokens");
        Ok(true)
    }

    async fn refund(&self, id: AccountId, amount: u64) -> LedgerResult<()> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(id).or_insert(0);
        *balance += amount;
        info!(account_id = %id, amount, balance_after = *balance, "Refunded tokens");
        Ok(())
    }

    async fn credit(&self, id: AccountId, amount: u64) -> LedgerResult<()> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(id).or_insert(0);
        *balance += amount;
        info!(account_id = %id, amount, balance_after = *balance, "Credited tokens");
        Ok(())
    }

    async fn transfer(&self, from: AccountId, to: AccountId, amount: u64) -> LedgerResult<bool> {
        let mut balances = self.balances.lock().await;

        let sender = balances
            .get(&from)
            .copied()
            .ok_or(LedgerError::AccountNotFound(from))?;
        if sender < amount {
            debug!(from = %from, to = %to, amount, balance = sender, "Transfer declined");
            return Ok(false);
        }

        // Both mutations happen under the same lock acquisition.
        *balances.get_mut(&from).expect("sender checked above") -= amount;
        *balances.entry(to).or_insert(0) += amount;
        info!(from = %from, to = %to, amount, "Transferred tokens");
        Ok(true)
    }
}
