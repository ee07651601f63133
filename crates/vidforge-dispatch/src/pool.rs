//! Round-robin credential pool with per-key cooldowns.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Credential pool is empty")]
    EmptyPool,
}

/// A credential handed out for one provider call.
///
/// The index travels with the credential so the caller can report a
/// rate-limit signal back against the right slot.
#[derive(Debug, Clone)]
pub struct LeasedKey {
    pub index: usize,
    pub credential: String,
}

#[derive(Debug)]
struct KeySlot {
    credential: String,
    cooldown_until: Option<Instant>,
}

impl KeySlot {
    fn is_available(&self, now: Instant) -> bool {
        match self.cooldown_until {
            Some(until) => until <= now,
            None => true,
        }
    }
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<KeySlot>,
    /// Index of the last slot handed out; scanning starts just past it.
    cursor: usize,
}

/// Shared credential pool.
///
/// All state sits behind one mutex; `pick` and `mark_rate_limited` are
/// O(N) over a handful of credentials and never await while holding the
/// lock. With a single configured credential the pool degenerates to a
/// pass-through — callers must not special-case that.
#[derive(Debug)]
pub struct KeyPool {
    state: Mutex<PoolState>,
    default_cooldown: Duration,
}

impl KeyPool {
    /// Create a pool over the given credentials.
    pub fn new(
        credentials: impl IntoIterator<Item = String>,
        default_cooldown: Duration,
    ) -> DispatchResult<Self> {
        let slots: Vec<KeySlot> = credentials
            .into_iter()
            .map(|credential| KeySlot {
                credential,
                cooldown_until: None,
            })
            .collect();

        if slots.is_empty() {
            return Err(DispatchError::EmptyPool);
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                cursor: slots.len() - 1,
                slots,
            }),
            default_cooldown,
        })
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.state.lock().expect("pool mutex poisoned").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 // never true; construction rejects empty pools
    }

    /// Lease the next usable credential.
    ///
    /// Scans round-robin from the slot after the last one handed out and
    /// returns the first whose cooldown has elapsed. When every key is
    /// cooling, the one closest to expiry is returned — the caller's own
    /// backoff absorbs the remaining wait; `pick` never blocks.
    pub fn pick(&self) -> LeasedKey {
        let now = Instant::now();
        let mut state = self.state.lock().expect("pool mutex poisoned");
        let n = state.slots.len();

        for offset in 1..=n {
            let idx = (state.cursor + offset) % n;
            if state.slots[idx].is_available(now) {
                state.cursor = idx;
                return LeasedKey {
                    index: idx,
                    credential: state.slots[idx].credential.clone(),
                };
            }
        }

        // Everyone is cooling; hand out the key that frees up first.
        let idx = (0..n)
            .min_by_key(|&i| state.slots[i].cooldown_until.unwrap_or(now))
            .expect("pool is never empty");
        debug!(index = idx, "All credentials cooling, returning closest to expiry");
        state.cursor = idx;
        LeasedKey {
            index: idx,
            credential: state.slots[idx].credential.clone(),
        }
    }

    /// Put a credential on cooldown after a provider rate-limit signal.
    ///
    /// The cooldown is `max(default_cooldown, retry_after)` from now and
    /// only ever extends: a hint shorter than an already-scheduled expiry
    /// is ignored.
    pub fn mark_rate_limited(&self, index: usize, retry_after: Option<Duration>) {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        let Some(slot) = state.slots.get_mut(index) else {
            warn!(index, "Rate-limit report for unknown credential slot");
            return;
        };

        let cooldown = retry_after
            .map(|hint| hint.max(self.default_cooldown))
            .unwrap_or(self.default_cooldown);
        let until = Instant::now() + cooldown;

        let extended = match slot.cooldown_until {
            Some(existing) if existing >= until => existing,
            _ => until,
        };
        slot.cooldown_until = Some(extended);

        warn!(
            index,
            cooldown_secs = cooldown.as_secs(),
            "Credential placed on cooldown"
        );
    }
}
