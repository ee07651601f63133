//! Google Veo adapter.
//!
//! Veo runs behind the Generative Language API as a long-running operation:
//! `POST /models/{model}:predictLongRunning` to submit, `GET /{operation}`
//! to poll. The operation name is the provider job id.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use vidforge_models::{
    AspectRatio, GenerationParams, JobPhase, ProviderId, ProviderJobStatus, RenderMode,
};

use crate::adapter::{ProviderCapabilities, VideoProvider};
use crate::download::{sanitize_job_id, stream_to_file};
use crate::error::{
    classify_http, classify_transport, retry_after_from_headers, ProviderError, ProviderResult,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODEL_QUALITY: &str = "veo-3.0-generate-001";
const MODEL_FAST: &str = "veo-3.0-fast-generate-001";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Prompt tail discouraging letterboxed output. Veo honors orientation far
/// more reliably when it is restated in the prompt itself.
const ANTI_BORDERS: &str = "no device frame, no smartphone frame, no UI mockup, no borders, \
     no black bars, no letterboxing, no pillarboxing, edge-to-edge content, fill the entire frame";

/// Google Veo adapter.
pub struct VeoAdapter {
    base_url: String,
    client: Client,
    quota_fallback_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: Option<String>,
}

impl VeoAdapter {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the adapter at a different endpoint (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            quota_fallback_delay: Duration::from_secs(3),
        }
    }

    /// Override the pause before the quota fallback attempt (tests).
    pub fn quota_fallback_delay(mut self, delay: Duration) -> Self {
        self.quota_fallback_delay = delay;
        self
    }

    /// Models to try, in order. An explicit override is used as-is; the
    /// quality default gets one fallback to the fast model when the vendor
    /// reports quota exhaustion.
    fn model_attempts(params: &GenerationParams) -> Vec<&str> {
        if let Some(model) = params.model.as_deref() {
            return vec![model];
        }
        match params.render_mode {
            RenderMode::Fast => vec![MODEL_FAST],
            RenderMode::Quality => vec![MODEL_QUALITY, MODEL_FAST],
        }
    }

    async fn submit_once(
        &self,
        model: &str,
        params: &GenerationParams,
        credential: &str,
    ) -> ProviderResult<String> {
        let mut config = json!({
            "aspectRatio": params.aspect_ratio.as_str(),
            "resolution": params.resolution.as_str(),
        });
        if let Some(negative) = &params.negative_prompt {
            config["negativePrompt"] = json!(negative);
        }
        if let Some(seed) = params.seed {
            config["seed"] = json!(seed);
        }

        let mut instance = json!({
            "prompt": reinforce_aspect(&params.prompt, params.aspect_ratio),
            "config": config,
        });
        if let Some(image) = &params.reference_image {
            instance["image"] = json!({
                "bytesBase64Encoded": BASE64.encode(&image.bytes),
                "mimeType": image.mime,
            });
        }

        let response = self
            .client
            .post(format!(
                "{}/models/{}:predictLongRunning",
                self.base_url, model
            ))
            .header("x-goog-api-key", credential)
            .timeout(SUBMIT_TIMEOUT)
            .json(&json!({ "instances": [instance] }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let retry_after = retry_after_from_headers(response.headers());
        let text = response.text().await.map_err(classify_transport)?;

        if status >= 400 {
            warn!(status, model, "Veo submit failed");
            return Err(classify_http(status, retry_after, &text));
        }

        let parsed: SubmitResponse = serde_json::from_str(&text)
            .map_err(|_| ProviderError::invalid_response("Veo returned non-JSON body"))?;

        parsed.name.ok_or_else(|| {
            ProviderError::invalid_response("Veo submission succeeded but no operation name returned")
        })
    }
}

impl Default for VeoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoProvider for VeoAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Veo
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            reference_image: true,
            negative_prompt: true,
            seed: true,
        }
    }

    async fn submit(&self, params: &GenerationParams, credential: &str) -> ProviderResult<String> {
        let attempts = Self::model_attempts(params);
        let mut last_err = None;

        for (i, model) in attempts.iter().enumerate() {
            if i > 0 {
                // Let a momentary quota spike settle before the cheaper model.
                tokio::time::sleep(self.quota_fallback_delay).await;
            }
            match self.submit_once(model, params, credential).await {
                Ok(name) => {
                    info!(model, operation = %name, "Veo operation started");
                    return Ok(name);
                }
                Err(e) if e.is_throttled() && i + 1 < attempts.len() => {
                    warn!(model, "Veo quota hit, falling back to fast model");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::transient("Veo submission failed")))
    }

    async fn poll(
        &self,
        provider_job_id: &str,
        credential: &str,
    ) -> ProviderResult<ProviderJobStatus> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, provider_job_id))
            .header("x-goog-api-key", credential)
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let retry_after = retry_after_from_headers(response.headers());
        let text = response.text().await.map_err(classify_transport)?;

        if status >= 400 {
            warn!(status, operation = provider_job_id, "Veo poll failed");
            return Err(classify_http(status, retry_after, &text));
        }

        let parsed: OperationResponse = serde_json::from_str(&text)
            .map_err(|_| ProviderError::invalid_response("Veo returned non-JSON body"))?;

        if !parsed.done {
            let progress = extract_progress(parsed.metadata.as_ref());
            return Ok(if progress > 0 {
                ProviderJobStatus::running(progress)
            } else {
                ProviderJobStatus::pending(0)
            });
        }

        if let Some(error) = parsed.error {
            return Ok(ProviderJobStatus::failed(
                error
                    .message
                    .unwrap_or_else(|| "provider reported an error".to_string()),
            ));
        }

        match extract_video_uri(parsed.response.as_ref()) {
            Some(uri) => Ok(ProviderJobStatus::succeeded(uri)),
            None => Ok(ProviderJobStatus::failed("no video URL returned")),
        }
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
                    "download requested before generation finished",
                ))
            }
        };

        let response = self
            .client
            .get(&video_url)
            .header("x-goog-api-key", credential)
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
            "veo_{}_{}.mp4",
            chrono::Utc::now().timestamp(),
            sanitize_job_id(provider_job_id)
        );
        stream_to_file(response, &dest_dir.join(filename)).await
    }
}

/// Restate orientation and full-frame intent inside the prompt.
fn reinforce_aspect(prompt: &str, aspect: AspectRatio) -> String {
    let mut base = prompt.trim().to_string();
    if !base.ends_with(['.', '!', '?']) {
        base.push('.');
    }
    let tail = match aspect {
        AspectRatio::Tall9x16 => format!(
            "(VERTICAL 9:16 FULL-FRAME, {}, not landscape, not 16:9).",
            ANTI_BORDERS
        ),
        AspectRatio::Wide16x9 => format!(
            "(WIDESCREEN 16:9 FULL-FRAME, {}, not vertical, not 9:16).",
            ANTI_BORDERS
        ),
    };
    format!("{} {}", base, tail)
}

/// Progress lives under different metadata keys depending on API vintage.
fn extract_progress(metadata: Option<&Value>) -> u8 {
    let Some(meta) = metadata else { return 0 };
    for key in [
        "progress",
        "progressPercent",
        "progress_percent",
        "progress_percentage",
    ] {
        if let Some(v) = meta.get(key).and_then(Value::as_f64) {
            return (v.clamp(0.0, 100.0)) as u8;
        }
    }
    0
}

/// Walk the LRO response layouts the vendor has shipped over time.
fn extract_video_uri(response: Option<&Value>) -> Option<String> {
    let resp = response?;

    // Current REST shape
    if let Some(uri) = resp
        .pointer("/generateVideoResponse/generatedSamples/0/video")
        .and_then(video_uri_field)
    {
        return Some(uri);
    }

    // SDK-era snake_case shape
    if let Some(uri) = resp
        .pointer("/generated_videos/0/video")
        .and_then(video_uri_field)
    {
        return Some(uri);
    }

    // Flattened variants
    if let Some(uri) = video_uri_field(resp) {
        return Some(uri);
    }
    if let Some(uri) = resp.get("video").and_then(video_uri_field) {
        return Some(uri);
    }

    debug!("No video URI found in operation response");
    None
}

fn video_uri_field(video: &Value) -> Option<String> {
    for key in ["uri", "downloadUri", "download_uri"] {
        if let Some(uri) = video.get(key).and_then(Value::as_str) {
            return Some(uri.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params() -> GenerationParams {
        GenerationParams::new("a clockwork hummingbird")
    }

    #[test]
    fn test_reinforce_aspect_appends_tail() {
        let out = reinforce_aspect("a red door", AspectRatio::Tall9x16);
        assert!(out.starts_with("a red door."));
        assert!(out.contains("VERTICAL 9:16"));
        assert!(out.contains("no letterboxing"));

        let out = reinforce_aspect("done already!", AspectRatio::Wide16x9);
        assert!(out.starts_with("done already!"));
        assert!(!out.contains("!."));
    }

    #[test]
    fn test_model_attempts() {
        let quality = params();
        assert_eq!(
            VeoAdapter::model_attempts(&quality),
            vec![MODEL_QUALITY, MODEL_FAST]
        );

        let fast = params().with_render_mode(RenderMode::Fast);
        assert_eq!(VeoAdapter::model_attempts(&fast), vec![MODEL_FAST]);

        let mut pinned = params();
        pinned.model = Some("veo-2.0-generate-001".to_string());
        assert_eq!(
            VeoAdapter::model_attempts(&pinned),
            vec!["veo-2.0-generate-001"]
        );
    }

    #[test]
    fn test_extract_video_uri_shapes() {
        let rest = serde_json::json!({
            "generateVideoResponse": {
                "generatedSamples": [ { "video": { "uri": "https://v/1.mp4" } } ],
            },
        });
        assert_eq!(extract_video_uri(Some(&rest)).as_deref(), Some("https://v/1.mp4"));

        let sdk = serde_json::json!({
            "generated_videos": [ { "video": { "download_uri": "https://v/2.mp4" } } ],
        });
        assert_eq!(extract_video_uri(Some(&sdk)).as_deref(), Some("https://v/2.mp4"));

        let flat = serde_json::json!({ "downloadUri": "https://v/3.mp4" });
        assert_eq!(extract_video_uri(Some(&flat)).as_deref(), Some("https://v/3.mp4"));

        assert_eq!(extract_video_uri(Some(&serde_json::json!({}))), None);
        assert_eq!(extract_video_uri(None), None);
    }

    #[tokio::test]
    async fn test_submit_returns_operation_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{}:predictLongRunning", MODEL_QUALITY)))
            .and(header("x-goog-api-key", "key-9"))
            .and(body_partial_json(serde_json::json!({
                "instances": [ { "config": { "aspectRatio": "16:9", "resolution": "1080p" } } ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "operations/op-17",
            })))
            .mount(&server)
            .await;

        let adapter = VeoAdapter::with_base_url(server.uri());
        let op = adapter.submit(&params(), "key-9").await.unwrap();
        assert_eq!(op, "operations/op-17");
    }

    #[tokio::test]
    async fn test_submit_quota_falls_back_to_fast_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{}:predictLongRunning", MODEL_QUALITY)))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({
                        "error": { "status": "RESOURCE_EXHAUSTED" },
                    })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{}:predictLongRunning", MODEL_FAST)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "operations/op-fast",
            })))
            .mount(&server)
            .await;

        let adapter =
            VeoAdapter::with_base_url(server.uri()).quota_fallback_delay(Duration::ZERO);
        let op = adapter.submit(&params(), "key-9").await.unwrap();
        assert_eq!(op, "operations/op-fast");
    }

    #[tokio::test]
    async fn test_submit_rejected_does_not_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid argument"))
            .mount(&server)
            .await;

        let adapter =
            VeoAdapter::with_base_url(server.uri()).quota_fallback_delay(Duration::ZERO);
        let err = adapter.submit(&params(), "key-9").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_poll_not_done_without_progress_is_pending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "operations/op-17",
                "done": false,
            })))
            .mount(&server)
            .await;

        let adapter = VeoAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("operations/op-17", "key-9").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Pending);
    }

    #[tokio::test]
    async fn test_poll_reports_progress_as_running() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": false,
                "metadata": { "progressPercent": 62 },
            })))
            .mount(&server)
            .await;

        let adapter = VeoAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("operations/op-17", "key-9").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Running);
        assert_eq!(snapshot.progress, 62);
    }

    #[tokio::test]
    async fn test_poll_done_with_error_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": true,
                "error": { "code": 13, "message": "internal rendering fault" },
            })))
            .mount(&server)
            .await;

        let adapter = VeoAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("operations/op-17", "key-9").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("internal rendering fault"));
    }

    #[tokio::test]
    async fn test_poll_done_without_uri_is_failed_not_succeeded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": true,
                "response": {},
            })))
            .mount(&server)
            .await;

        let adapter = VeoAdapter::with_base_url(server.uri());
        let snapshot = adapter.poll("operations/op-17", "key-9").await.unwrap();
        assert_eq!(snapshot.phase, JobPhase::Failed);
    }
}
