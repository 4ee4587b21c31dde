//! Shared test utilities for the photo-relay test suite.
//!
//! Provides synthetic image fixtures and a [`ScriptedTransport`] that plays
//! back HTTP statuses per file without touching the network.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let shot = tmp.path().join("big.png");
//! write_test_png(&shot, 64, 64);
//!
//! let transport = ScriptedTransport::new().script("big", &[413, 200]);
//! // ... run an upload ...
//! assert_eq!(transport.sent_names(), vec!["big.png", "big.jpg"]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use crate::imaging::DESCRIPTION_KEYWORD;
use crate::imaging::png_text;
use crate::payload::PayloadFields;
use crate::transfer::{FilePart, TransferError, TransferResult, Transport};
use crate::types::WebhookTarget;

// =========================================================================
// Image fixtures
// =========================================================================

/// Write an RGB PNG with a deterministic, non-uniform pattern.
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(31) ^ y.wrapping_mul(17);
        image::Rgb([(v % 256) as u8, (x % 256) as u8, (y % 256) as u8])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write an RGBA PNG, for exercising alpha flattening.
pub fn write_test_rgba_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x + y) % 256) as u8])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write a small JPEG.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Write a 32x32 PNG carrying `text` under the `Description` keyword.
pub fn write_test_png_with_description(path: &Path, text: &str) {
    write_test_png(path, 32, 32);
    let data = std::fs::read(path).unwrap();
    let embedded = png_text::embed_text(&data, DESCRIPTION_KEYWORD, text).unwrap();
    std::fs::write(path, embedded).unwrap();
}

/// A complete metadata record as the authoring tool writes it.
pub const SAMPLE_METADATA: &str = r#"{
  "application": "VRCX",
  "version": 1,
  "author": { "displayName": "Alice", "id": "usr_alice" },
  "world": { "name": "Midnight Rooftop", "id": "wrld_1234", "instanceId": "wrld_1234:42" },
  "players": [
    { "displayName": "Alice", "id": "usr_alice" },
    { "displayName": "Bob", "id": "usr_bob" }
  ]
}"#;

// =========================================================================
// Scripted transport
// =========================================================================

/// One post as seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub url: String,
    pub payload: PayloadFields,
    pub file_name: String,
    pub size: usize,
}

/// What the transport answers for one send.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    Error(String),
}

/// Transport that answers from a per-file script and records every send.
///
/// Scripts are keyed by file stem, so a recompressed retry (`big.jpg`) draws
/// from the same script as the original (`big.png`). Unscripted sends and
/// exhausted scripts answer 200.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    sent: Mutex<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the sends for `stem` with `statuses`, in order.
    pub fn script(self, stem: &str, statuses: &[u16]) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(stem.to_string())
            .or_default()
            .extend(statuses.iter().map(|s| Reply::Status(*s)));
        self
    }

    /// Fail the next send for `stem` with a transport error.
    pub fn fail(self, stem: &str, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(stem.to_string())
            .or_default()
            .push_back(Reply::Error(message.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// File names of every send, in send order.
    pub fn sent_names(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.file_name).collect()
    }

    /// Number of sends whose file has `stem`.
    pub fn send_count(&self, stem: &str) -> usize {
        self.sent()
            .iter()
            .filter(|r| stem_of(&r.file_name) == stem)
            .count()
    }
}

fn stem_of(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        target: &WebhookTarget,
        payload: &PayloadFields,
        file: FilePart,
    ) -> Result<TransferResult, TransferError> {
        self.sent.lock().unwrap().push(SentRequest {
            url: target.url.clone(),
            payload: payload.clone(),
            file_name: file.file_name.clone(),
            size: file.bytes.len(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&stem_of(&file.file_name))
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Reply::Status(200));
        match reply {
            Reply::Status(status) => Ok(TransferResult {
                status,
                body: String::new(),
            }),
            Reply::Error(message) => Err(TransferError::Io(std::io::Error::other(message))),
        }
    }
}
