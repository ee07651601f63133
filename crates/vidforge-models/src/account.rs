//! Account identity and token balance.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Unique identifier for a billing account.
///
/// Accounts are keyed by the numeric user id handed over by the chat layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A billing account snapshot: identity plus current token balance.
///
/// The balance is unsigned on purpose: no sequence of ledger operations may
/// take it below zero. All mutations go through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    /// Account ID
    pub id: AccountId,

    /// Current token balance
    pub balance: u64,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, balance: u64) -> Self {
        Self {
            id: id.into(),
            balance,
        }
    }
}
