//! Generation requests as handed over by the chat layer.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{AccountId, ProviderId};

/// Target aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Landscape 16:9
    #[default]
    #[serde(rename = "16:9")]
    Wide16x9,
    /// Portrait 9:16
    #[serde(rename = "9:16")]
    Tall9x16,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Wide16x9 => "16:9",
            AspectRatio::Tall9x16 => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[serde(rename = "720p")]
    P720,
    #[default]
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Speed/quality tradeoff selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Cheaper, faster model variant
    Fast,
    /// Full-quality model variant
    #[default]
    Quality,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Fast => "fast",
            RenderMode::Quality => "quality",
        }
    }
}

/// Inline reference image for photo-to-video generation.
///
/// Not every provider accepts one; the adapter advertises support via its
/// capability flags and the orchestrator rejects the combination up front.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceImage {
    /// Raw image bytes, base64 on the wire
    #[serde(with = "serde_bytes_base64")]
    #[schemars(with = "String")]
    pub bytes: Vec<u8>,
    /// MIME type ("image/jpeg" | "image/png")
    pub mime: String,
}

/// Unified parameter set consumed by the provider adapters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationParams {
    /// Prompt text
    pub prompt: String,

    /// Target aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Output resolution
    #[serde(default)]
    pub resolution: Resolution,

    /// Speed/quality mode
    #[serde(default)]
    pub render_mode: RenderMode,

    /// Negative prompt, if the user enabled one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Seed for deterministic output, where supported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Explicit vendor model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Reference image for photo-to-video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<ReferenceImage>,
}

impl GenerationParams {
    /// Create params with just a prompt; everything else defaulted.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            render_mode: RenderMode::default(),
            negative_prompt: None,
            seed: None,
            model: None,
            reference_image: None,
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = render_mode;
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    /// Apply cross-field rules before the params reach an adapter.
    ///
    /// Portrait output is capped at 720p; the vendors reject or letterbox
    /// 9:16 at 1080p.
    pub fn normalized(mut self) -> Self {
        if self.aspect_ratio == AspectRatio::Tall9x16 {
            self.resolution = Resolution::P720;
        }
        self
    }
}

/// A generation request as received from the chat layer.
///
/// The chat layer owns retry-on-user-intent; the core performs no request
/// deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    /// Billing account
    pub account_id: AccountId,

    /// Selected provider
    pub provider: ProviderId,

    /// Normalized generation parameters
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(account_id: impl Into<AccountId>, provider: ProviderId, params: GenerationParams) -> Self {
        Self {
            account_id: account_id.into(),
            provider,
            params,
        }
    }
}

/// Base64 (de)serialization for raw image bytes.
mod serde_bytes_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
