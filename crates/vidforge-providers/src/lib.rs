//! Provider adapters for the VidForge core.
//!
//! Each adapter implements the same three-call contract — submit, poll,
//! download — and normalizes its vendor's responses onto the shared
//! `ProviderJobStatus` model. Vendor-specific parsing stays in here;
//! orchestration code only ever sees the common taxonomy.

mod adapter;
mod download;
mod error;
mod luma;
mod veo;

pub use adapter::{ProviderCapabilities, ProviderRegistry, VideoProvider};
pub use download::{sanitize_job_id, stream_to_file};
pub use error::{
    classify_http, classify_transport, retry_after_from_headers, ProviderError, ProviderResult,
};
pub use luma::LumaAdapter;
pub use veo::VeoAdapter;

use std::sync::Arc;

/// Registry wired with every built-in adapter.
pub fn default_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(LumaAdapter::new()));
    registry.register(Arc::new(VeoAdapter::new()));
    registry
}
