//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the uploader needs:
//! identify (pre-batch validation), read_description (embedded metadata) and
//! recompress (the oversize fallback).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! recording `MockBackend` below.

use super::params::RecompressParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Backends are shared by every upload task of a batch, so they must be
/// `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions. Fails for files that are not decodable images.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read the embedded `Description` text, if the image carries one.
    fn read_description(&self, path: &Path) -> Result<Option<String>, BackendError>;

    /// Decode `params.source` and re-encode it lossily into `params.output`.
    fn recompress(&self, params: &RecompressParams) -> Result<(), BackendError>;
}
