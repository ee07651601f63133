//! Credential dispatch for rate-limited providers.
//!
//! Two independent throttles live here:
//! - `KeyPool` rotates among provider credentials and withholds any key the
//!   provider recently rate-limited
//! - `Pacer` enforces a process-wide minimum gap between submissions,
//!   regardless of which key they use
//!
//! Cooldowns are in-memory only; a restart starts the pool cold.

mod pacer;
mod pool;

pub use pacer::Pacer;
pub use pool::{DispatchError, DispatchResult, KeyPool, LeasedKey};
