//! Provider error taxonomy.
//!
//! Every adapter failure is classified here so the orchestrator can decide
//! retry behavior without knowing vendor specifics:
//! - `Rejected` — permanent 4xx, the request itself is bad
//! - `Throttled` — rate-limit/quota signal, retried via key rotation
//! - `Transient` — 5xx/network/timeout, retried with backoff
//! - `InvalidResponse` — the vendor answered something unparseable
//! - everything else is terminal

use std::time::Duration;

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Provider throttled the request")]
    Throttled { retry_after: Option<Duration> },

    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn throttled(retry_after: Option<Duration>) -> Self {
        Self::Throttled { retry_after }
    }

    /// Check if retrying (with backoff or another credential) can help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Throttled { .. } | ProviderError::Transient(_)
        )
    }

    /// Check if this is a rate-limit/quota signal.
    pub fn is_throttled(&self) -> bool {
        matches!(self, ProviderError::Throttled { .. })
    }

    /// Cooldown hint supplied by the vendor, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Classify an HTTP error response.
///
/// 429 is throttling; other 4xx bodies are scanned for quota wording since
/// some vendors report RESOURCE_EXHAUSTED as a plain 400/403 (the Gemini
/// API does). Remaining 4xx are permanent rejections, 5xx transient.
pub fn classify_http(status: u16, retry_after: Option<Duration>, body: &str) -> ProviderError {
    if status == 429 {
        return ProviderError::Throttled { retry_after };
    }

    if (400..500).contains(&status) {
        let lowered = body.to_lowercase();
        if lowered.contains("resource_exhausted")
            || lowered.contains("quota")
            || lowered.contains("rate limit")
        {
            return ProviderError::Throttled { retry_after };
        }
        return ProviderError::Rejected {
            status,
            message: truncate(body, 500),
        };
    }

    ProviderError::Transient(format!("HTTP {}: {}", status, truncate(body, 200)))
}

/// Classify a reqwest transport error.
pub fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProviderError::Transient(err.to_string())
    } else if err.is_decode() {
        ProviderError::InvalidResponse(err.to_string())
    } else {
        ProviderError::Transient(err.to_string())
    }
}

/// Parse a Retry-After header (delta-seconds form only; the HTTP-date form
/// is not worth supporting for these vendors).
pub fn retry_after_from_headers(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_429_is_throttled() {
        let err = classify_http(429, Some(Duration::from_secs(30)), "slow down");
        assert!(err.is_throttled());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_quota_body_is_throttled() {
        let err = classify_http(400, None, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#);
        assert!(err.is_throttled());
    }

    #[test]
    fn test_classify_4xx_is_rejected() {
        let err = classify_http(403, None, "forbidden");
        assert!(matches!(err, ProviderError::Rejected { status: 403, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_5xx_is_transient() {
        let err = classify_http(503, None, "unavailable");
        assert!(matches!(err, ProviderError::Transient(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "дождь".repeat(200);
        let err = classify_http(403, None, &s);
        if let ProviderError::Rejected { message, .. } = err {
            assert!(message.len() <= 504);
        } else {
            panic!("expected Rejected");
        }
    }
}
