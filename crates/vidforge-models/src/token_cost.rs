//! Token cost table for generation jobs.
//!
//! Costs are flat per provider and render mode. The ledger works in whole
//! tokens; there is no fractional billing.

use crate::{ProviderId, RenderMode};

/// Tokens granted to a brand-new account.
pub const FREE_TOKENS_ON_JOIN: u64 = 2;

/// Cost of one Luma generation.
pub const LUMA_GENERATION_COST: u64 = 1;

/// Cost of one Veo generation in fast mode.
pub const VEO_FAST_GENERATION_COST: u64 = 1;

/// Cost of one Veo generation in quality mode.
pub const VEO_QUALITY_GENERATION_COST: u64 = 2;

/// Tokens charged for one generation on the given provider and mode.
pub fn generation_cost(provider: ProviderId, mode: RenderMode) -> u64 {
    match (provider, mode) {
        (ProviderId::Luma, _) => LUMA_GENERATION_COST,
        (ProviderId::Veo, RenderMode::Fast) => VEO_FAST_GENERATION_COST,
        (ProviderId::Veo, RenderMode::Quality) => VEO_QUALITY_GENERATION_COST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_costs_more_than_fast() {
        assert!(
            generation_cost(ProviderId::Veo, RenderMode::Quality)
                > generation_cost(ProviderId::Veo, RenderMode::Fast)
        );
    }

    #[test]
    fn test_luma_flat_cost() {
        assert_eq!(
            generation_cost(ProviderId::Luma, RenderMode::Fast),
            generation_cost(ProviderId::Luma, RenderMode::Quality)
        );
    }
}
