//! Turns paths on disk into [`FileSource`] values for the pipeline.
//!
//! The MIME type is sniffed from the content first, then guessed from the
//! extension, and finally falls back to `application/octet-stream`.

use std::path::Path;

use anyhow::{Context, Result};
use carbon_upload_core::contract::FileSource;
use tracing::{debug, info};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Read `path` fully into memory.
pub async fn load_file(path: &Path) -> Result<FileSource> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?
        .to_string();
    let mime_type = detect_mime_type(&name, &content);

    info!(file = %name, size = content.len(), mime_type = %mime_type, "Loaded local file");
    Ok(FileSource::new(name, mime_type, content))
}

pub async fn load_files(paths: &[impl AsRef<Path>]) -> Result<Vec<FileSource>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(load_file(path.as_ref()).await?);
    }
    Ok(files)
}

pub fn detect_mime_type(name: &str, content: &[u8]) -> String {
    if let Some(kind) = infer::get(content) {
        debug!(file = name, mime_type = kind.mime_type(), "MIME type sniffed from content");
        return kind.mime_type().to_string();
    }

    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string())
}
