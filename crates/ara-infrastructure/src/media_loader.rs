//! Reading media files from disk.

use ara_core::error::{AraError, Result};
use ara_core::upload::MediaItem;
use std::path::Path;

/// Reads a file into a [`MediaItem`], guessing its MIME type from the extension.
///
/// Unknown extensions become `application/octet-stream`, which upload
/// validation then rejects with a per-file reason.
pub async fn load_media(path: &Path) -> Result<MediaItem> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AraError::io(format!("{} is not a file", path.display())))?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    let data = tokio::fs::read(path)
        .await
        .map_err(|err| AraError::io(format!("Failed to read {}: {}", path.display(), err)))?;

    tracing::debug!(
        "[MediaLoader] Loaded {} ({}, {} bytes)",
        name,
        mime_type,
        data.len()
    );
    Ok(MediaItem::new(name, mime_type.essence_str(), data))
}
