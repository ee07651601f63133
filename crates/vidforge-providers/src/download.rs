//! Streamed asset download.
//!
//! Rendered videos run to hundreds of megabytes; the body is streamed
//! chunk-by-chunk to disk so peak memory stays flat.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Stream an HTTP response body into `path`.
pub async fn stream_to_file(response: reqwest::Response, path: &Path) -> ProviderResult<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProviderError::download_failed(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        // A zero-byte asset is a vendor bug, not a video.
        fs::remove_file(path).await.ok();
        return Err(ProviderError::download_failed("empty response body"));
    }

    info!(path = %path.display(), bytes = written, "Downloaded asset");
    Ok(path.to_path_buf())
}

/// Replace anything outside `[A-Za-z0-9._-]` so a provider job id is safe
/// inside a filename.
pub fn sanitize_job_id(job_id: &str) -> String {
    let mut out = String::with_capacity(job_id.len());
    let mut last_was_sub = false;
    for c in job_id.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
            last_was_sub = false;
        } else if !last_was_sub {
            out.push('_');
            last_was_sub = true;
        }
    }
    debug!(job_id, sanitized = %out, "Sanitized job id");
    out
}
