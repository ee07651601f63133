//! The provider contract and the adapter registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use vidforge_models::{GenerationParams, ProviderId, ProviderJobStatus};

use crate::error::{ProviderError, ProviderResult};

/// What a provider can accept.
///
/// The orchestrator consults these before constructing a job, so an
/// unsupported request/provider combination fails fast instead of dying
/// deep inside a vendor call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderCapabilities {
    /// Accepts an inline reference image (photo-to-video)
    pub reference_image: bool,
    /// Accepts a negative prompt
    pub negative_prompt: bool,
    /// Accepts a deterministic seed
    pub seed: bool,
}

impl ProviderCapabilities {
    /// Check a parameter set against these capabilities.
    pub fn check(&self, params: &GenerationParams) -> ProviderResult<()> {
        if params.reference_image.is_some() && !self.reference_image {
            return Err(ProviderError::unsupported(
                "provider does not accept a reference image",
            ));
        }
        if params.negative_prompt.is_some() && !self.negative_prompt {
            return Err(ProviderError::unsupported(
                "provider does not accept a negative prompt",
            ));
        }
        if params.seed.is_some() && !self.seed {
            return Err(ProviderError::unsupported(
                "provider does not accept a seed",
            ));
        }
        Ok(())
    }
}

/// Common contract for rendering providers.
///
/// Each call receives the credential picked by the dispatcher for this
/// attempt; adapters hold no keys of their own.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Which backend this adapter talks to.
    fn id(&self) -> ProviderId;

    /// Advertised capability flags.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Submit a generation job, returning the provider-side job id.
    async fn submit(&self, params: &GenerationParams, credential: &str) -> ProviderResult<String>;

    /// Fetch the latest job snapshot, normalized onto the common model.
    async fn poll(
        &self,
        provider_job_id: &str,
        credential: &str,
    ) -> ProviderResult<ProviderJobStatus>;

    /// Stream the rendered asset into `dest_dir` and return its path.
    ///
    /// Valid only after `poll` reported `Succeeded` with a result.
    async fn download(
        &self,
        provider_job_id: &str,
        credential: &str,
        dest_dir: &Path,
    ) -> ProviderResult<PathBuf>;
}

/// Registry mapping provider ids to adapter singletons.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn VideoProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same id.
    pub fn register(&mut self, adapter: Arc<dyn VideoProvider>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    /// Look up the adapter for a provider.
    pub fn get(&self, id: ProviderId) -> ProviderResult<Arc<dyn VideoProvider>> {
        self.adapters
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::unsupported(format!("no adapter registered for {}", id)))
    }
}
