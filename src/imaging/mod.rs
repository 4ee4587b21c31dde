//! Image handling: pure Rust, zero system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Description metadata** | custom PNG text-chunk parser |
//! | **Recompress → JPEG** | `image` decode + `JpegEncoder` |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **PNG text**: chunk-level reader/writer for embedded text

pub mod backend;
mod params;
pub mod png_text;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use params::{Quality, RecompressParams};
pub use rust_backend::{DESCRIPTION_KEYWORD, RustBackend, has_supported_extension};
