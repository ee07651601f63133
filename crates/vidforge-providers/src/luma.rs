//! Luma Dream Machine adapter.
//!
//! REST surface: `POST /generations` to submit, `GET /generations/{id}` to
//! poll. The rendered asset lands under `assets.video` once the generation
//! completes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vidforge_models::{GenerationParams, JobPhase, ProviderId, ProviderJobStatus};

use crate::adapter::{ProviderCapabilities, VideoProvider};
use crate::download::{sanitize_job_id, stream_to_file};
use crate::error::{
    classify_http, classify_transport, retry_after_from_headers, ProviderError, ProviderResult,
};

const DEFAULT_BASE_URL: &str = "https://api.lumalabs.ai/dream-machine/v1";

/// Model identifiers the account is allowed to use.
const ALLOWED_MODELS: &[&str] = &["ray-2", "ray-flash-2", "dream-machine-1.5"];
const DEFAULT_MODEL: &str = "ray-2";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Luma Dream Machine adapter.
pub struct LumaAdapter {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    aspect_ratio: &'a str,
    resolution: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
    generation: Option<GenerationRef>,
}

#[derive(Debug, Deserialize)]
struct GenerationRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GenerationState {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    assets: Option<GenerationAssets>,
}

#[derive(Debug, Deserialize)]
struct GenerationAssets {
    #[serde(default)]
    video: Option<String>,
}

impl LumaAdapter {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn resolve_model(params: &GenerationParams) -> &str {
        match params.model.as_deref() {
            Some(m) if ALLOWED_MODELS.contains(&m) => m,
            Some(other) => {
                warn!(model = other, "Unknown Luma model, falling back to default");
                DEFAULT_MODEL
            }
            None => DEFAULT_MODEL,
        }
    }

    fn map_state(state: &str) -> JobPhase {
        match state.to_lowercase().as_str() {
            "pending" | "queued" | "starting" => JobPhase::Pending,
            "dreaming" | "processing" | "running" | "generating" => JobPhase::Running,
            "completed" | "succeeded" | "success" => JobPhase::Succeeded,
            "failed" | "error" | "cancelled" => JobPhase::Failed,
            other => {
                debug!(state = other, "Unknown Luma state, treating as pending");
                JobPhase::Pending
            }
        }
    }
}

impl Default for LumaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoProvider for LumaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Luma
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            reference_image: false,
            negative_prompt: false,
            seed: false,
        }
    }

    async fn submit(&self, params: &GenerationParams, credential: &str) -> ProviderResult<String> {
        let model = Self::resolve_model(params);
        let body = SubmitRequest {
            prompt: &params.prompt,
            model,
            aspect_ratio: params.aspect_ratio.as_str(),
            resolution: params.resolution.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/generations", self.base_url))
            .bearer_auth(credential)
            .timeout(SUBMIT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let retry_after = retry_after_from_headers(response.headers());
        let text = response.text().await.map_err(classify_transport)?;

        if status >= 400 {
            warn!(status, body = %text, "Luma submit failed");
            return Err(classify_http(status, retry_after, &text));
        }

        let parsed: SubmitResponse = serde_json::from_str(&text)
            .map_err(|_| ProviderError::invalid_response("Luma returned non-JSON body"))?;

        let job_id = parsed
            .id
            .or(parsed.generation.map(|g| g.id))
            .ok_or_else(|| {
                ProviderError::invalid_response("Luma submit succeeded but no job id returned")
            })?;

        info!(model, job_id = %job_id, "Luma generation submitted");
        Ok(job_id)
    }

    async fn poll(
        &self,
        provider_job_id: &str,
        credential: &str,
    ) -> ProviderResult<ProviderJobStatus> {
        let response = self
            .client
            .get(format!("{}/generations/{}", self.base_url, provider_job_id))
            .bearer_auth(credential)
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let retry_after = retry_after_from_headers(response.headers());
        let text = response.text().await.map_err(classify_transport)?;

        if status >= 400 {
            warn!(status, job_id = provider_job_id, "Luma poll failed");
            return Err(classify_http(status, retry_after, &text));
        }

        let parsed: GenerationState = serde_json::from_str(&text)
            .map_err(|_| ProviderError::invalid_response("Luma returned non-JSON body"))?;

        let state = parsed.state.as_deref().unwrap_or("pending");
        let video = parsed.assets.and_then(|a| a.video);

        let snapshot = match Self::map_state(state) {
            JobPhase::Succeeded => match video {
                Some(url) => ProviderJobStatus::succeeded(url),
                // Completed but the asset slot is still empty; keep polling
                // rather than reporting an undownloadable success.
                None => {
                    debug!(job_id = provider_job_id, "Luma completed without asset yet");
                    ProviderJobStatus::pending(0)
                }
            },
            JobPhase::Failed => ProviderJobStatus::failed(
                parsed
                    .failure_reason
                    .unwrap_or_else(|| "generation failed".to_string()),
            ),
            JobPhase::Running => ProviderJobStatus::running(0),
            JobPhase::Pending => ProviderJobStatus::pending(0),
        };
        Ok(snapshot)
    }

    async fn download(
        &self,
        provider_job_id: &str,
        credential: &str,
        dest_dir: &Path,
    ) -> ProviderResult<PathBuf> {
        let snapshot = self.poll(provider_job_id, credential).await?;
        let video_url = match (&snapshot.phase, snapshot.result_ref.as_deref()) {
            (JobPhase::Succeeded, Some(url)) => url.to_string(),
            _ => {
                return Err(ProviderError::download_failed(
                    "download requested before the video is ready",
                ))
            }
        };

        let response = self
            .client
            .get(&video_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::download_failed(e.to_string()))?;

        if response.status().as_u16() >= 400 {
            return Err(ProviderError::download_failed(format!(
                "asset fetch returned HTTP {}",
                response.status()
            )));
        }

        let filename = format!(
            "luma_{}_{}.mp4",
            chrono::Utc::now().timestamp(),
            sanitize_job_id(provider_job_id)
        );
        stream_to_file(response, &dest_dir.join(filename)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidforge_models::{AspectRatio, Resolution};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params() -> GenerationParams {
        GenerationParams::new("a koi pond in the rain")
            .with_aspect_ratio(AspectRatio::Tall9x16)
            .with_resolution(Resolution::P720)
    }

    #[tokio::test]
    async fn test_submit_returns_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .and(header("authorization", "Bearer key-1"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "a koi pond in the rain",
                "model": "ray-2",
                "aspect_ratio": "9:16",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "gen-123",
                "state": "queued",
            })))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let job_id = adapter.submit(&params(), "key-1").await.unwrap();
        assert_eq!(job_id, "gen-123");
    }

    #[tokio::test]
    async fn test_submit_nested_generation_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generation": { "id": "gen-nested" },
            })))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let job_id = adapter.submit(&params(), "key-1").await.unwrap();
        assert_eq!(job_id, "gen-nested");
    }

    #[tokio::test]
    async fn test_submit_missing_id_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let err = adapter.submit(&params(), "key-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_submit_429_is_throttled_with_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "45")
                    .set_body_string("too many requests"),
            )
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let err = adapter.submit(&params(), "key-1").await.unwrap_err();
        assert!(err.is_throttled());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(45)));
    }

    #[tokio::test]
    async fn test_submit_400_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad prompt"))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let err = adapter.submit(&params(), "key-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_poll_maps_vendor_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "dreaming",
            })))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("gen-1", "key-1").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Running);
    }

    #[tokio::test]
    async fn test_poll_unknown_state_is_pending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "daydreaming_v2",
            })))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("gen-1", "key-1").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Pending);
    }

    #[tokio::test]
    async fn test_poll_completed_with_asset_is_succeeded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "completed",
                "assets": { "video": "https://cdn.lumalabs.ai/v/gen-1.mp4" },
            })))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("gen-1", "key-1").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Succeeded);
        assert_eq!(
            snapshot.result_ref.as_deref(),
            Some("https://cdn.lumalabs.ai/v/gen-1.mp4")
        );
    }

    #[tokio::test]
    async fn test_poll_completed_without_asset_stays_pending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "completed",
            })))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("gen-1", "key-1").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Pending);
    }

    #[tokio::test]
    async fn test_poll_500_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let adapter = LumaAdapter::with_base_url(server.uri());
        let err = adapter.poll("gen-1", "key-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
    }

    #[tokio::test]
    async fn test_download_streams_asset() {
        let server = MockServer::start().await;
        let video_url = format!("{}/assets/gen-1.mp4", server.uri());
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "completed",
                "assets": { "video": video_url },
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/assets/gen-1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![3u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let adapter = LumaAdapter::with_base_url(server.uri());
        let path = adapter.download("gen-1", "key-1", dir.path()).await.unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("luma_"));
        assert_eq!(std::fs::read(&path).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_download_before_ready_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "dreaming",
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let adapter = LumaAdapter::with_base_url(server.uri());
        let err = adapter.download("gen-1", "key-1", dir.path()).await.unwrap_err();
        assert!(matches!(err, ProviderError::DownloadFailed(_)));
    }
}
