//! The ledger contract.

use async_trait::async_trait;

use vidforge_models::AccountId;

use crate::error::LedgerResult;

/// Per-account token balance operations.
///
/// Implementations own their transaction boundary per call; no lock is held
/// across calls, so concurrent callers on the same account are safe by
/// construction of the individual operations.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Create the account if it does not exist, seeding the starting
    /// balance exactly once. Returns the current balance either way.
    async fn ensure_account(&self, id: AccountId, starting_balance: u64) -> LedgerResult<u64>;

    /// Current balance.
    async fn balance(&self, id: AccountId) -> LedgerResult<u64>;

    /// Atomically decrement the balance iff it covers `amount`.
    ///
    /// Returns `false` without mutation when the balance is insufficient —
    /// that is a result, not an error, and callers use it to short-circuit
    /// before any external call is made.
    async fn charge(&self, id: AccountId, amount: u64) -> LedgerResult<bool>;

    /// Unconditionally increment the balance, returning tokens taken by a
    /// prior `charge`. The ledger does not detect duplicate refunds.
    async fn refund(&self, id: AccountId, amount: u64) -> LedgerResult<()>;

    /// Unconditionally increment the balance (grants, gifts from
    /// operators). Same mutation as `refund`, kept separate for logging.
    async fn credit(&self, id: AccountId, amount: u64) -> LedgerResult<()>;

    /// Move `amount` from one account to another in one atomic step.
    ///
    /// Returns `false` (and mutates neither account) when the sender's
    /// balance is insufficient. Never leaves tokens deducted without being
    /// credited.
    async fn transfer(&self, from: AccountId, to: AccountId, amount: u64) -> LedgerResult<bool>;
}
