//! Oversize fallback: re-encode an image so it fits under the endpoint's limit.
//!
//! When a webhook answers `413 Payload Too Large`, the upload task re-encodes
//! the source as a JPEG (quality 85 by default) into a temporary file and
//! retries once. The temporary file is owned by [`RecompressedImage`] and is
//! removed when that value is dropped, so it disappears on every exit path of
//! the task, including a failed retry.

use crate::imaging::{BackendError, ImageBackend, Quality, RecompressParams};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("could not create temporary file: {0}")]
    TempFile(#[from] std::io::Error),
    #[error("re-encode failed: {0}")]
    Encode(#[from] BackendError),
}

/// A re-encoded copy of an image living in a temporary file.
#[derive(Debug)]
pub struct RecompressedImage {
    temp: TempPath,
    upload_name: String,
}

impl RecompressedImage {
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Name to upload the copy under: the source stem with a `.jpg` extension.
    pub fn upload_name(&self) -> &str {
        &self.upload_name
    }

    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.temp)
    }
}

/// Re-encode `source` at `quality` into a fresh temporary JPEG.
pub fn recompress(
    backend: &dyn ImageBackend,
    source: &Path,
    quality: Quality,
) -> Result<RecompressedImage, CompressError> {
    let temp = tempfile::Builder::new()
        .prefix("photo-relay-")
        .suffix(".jpg")
        .tempfile()?
        .into_temp_path();

    backend.recompress(&RecompressParams {
        source: source.to_path_buf(),
        output: PathBuf::from(&*temp),
        quality,
    })?;

    debug!(
        source = %source.display(),
        temp = %temp.display(),
        quality = quality.value(),
        "recompressed oversize image"
    );
    Ok(RecompressedImage {
        temp,
        upload_name: jpeg_name(source),
    })
}

fn jpeg_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}.jpg")
}
