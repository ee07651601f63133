//! Engine metrics collection.
//!
//! Counters for the billing-critical paths: submissions, terminal
//! failures, refunds, throttle hits, and poll retries.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Jobs submitted, by provider.
    pub const JOBS_SUBMITTED: &str = "vidforge_jobs_submitted_total";

    /// Jobs that reached a terminal failure, by reason.
    pub const JOBS_FAILED: &str = "vidforge_jobs_failed_total";

    /// Refunds applied.
    pub const REFUNDS: &str = "vidforge_refunds_total";

    /// Rate-limit signals from providers, by provider.
    pub const THROTTLE_HITS: &str = "vidforge_throttle_hits_total";

    /// Retry attempts, by operation.
    pub const RETRIES: &str = "vidforge_retries_total";
}

pub fn record_submitted(provider: &str) {
    counter!(names::JOBS_SUBMITTED, "provider" => provider.to_string()).increment(1);
}

pub fn record_job_failed(reason: &'static str) {
    counter!(names::JOBS_FAILED, "reason" => reason).increment(1);
}

pub fn record_refund() {
    counter!(names::REFUNDS).increment(1);
}

pub fn record_throttle_hit(provider: &str) {
    counter!(names::THROTTLE_HITS, "provider" => provider.to_string()).increment(1);
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES, "operation" => operation.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_SUBMITTED.contains("submitted"));
        assert!(names::REFUNDS.contains("refunds"));
        assert!(names::THROTTLE_HITS.contains("throttle"));
    }
}
