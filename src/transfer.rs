//! Webhook transfer: one multipart POST per attempt.
//!
//! The [`Transport`] trait is the seam between the upload tasks and the
//! network. [`HttpTransport`] is the production implementation; tests swap in
//! a scripted transport that never opens a socket.
//!
//! Status classification:
//!
//! | Status | [`Classification`] | Task reaction |
//! |---|---|---|
//! | 200 | `Delivered` | success outcome |
//! | 413 | `TooLarge` | recompress and retry once |
//! | anything else | `Rejected(status)` | failure outcome |

use crate::payload::PayloadFields;
use crate::types::WebhookTarget;
use reqwest::blocking::{Client, multipart};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const FILE_FIELD: &str = "file";
const PAYLOAD_TOO_LARGE: u16 = 413;
const OK: u16 = 200;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw answer of the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Delivered,
    TooLarge,
    Rejected(u16),
}

impl TransferResult {
    pub fn classify(&self) -> Classification {
        match self.status {
            OK => Classification::Delivered,
            PAYLOAD_TOO_LARGE => Classification::TooLarge,
            other => Classification::Rejected(other),
        }
    }
}

/// The file part of a post.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Sends one image with its form fields to a webhook.
///
/// Implementations must be shareable across upload threads.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        target: &WebhookTarget,
        payload: &PayloadFields,
        file: FilePart,
    ) -> Result<TransferResult, TransferError>;
}

/// `reqwest` blocking client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("photo-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        target: &WebhookTarget,
        payload: &PayloadFields,
        file: FilePart,
    ) -> Result<TransferResult, TransferError> {
        let mut form = multipart::Form::new();
        for (name, value) in payload.form_fields() {
            form = form.text(name, value.to_string());
        }
        let size = file.bytes.len();
        let part = multipart::Part::bytes(file.bytes).file_name(file.file_name.clone());
        form = form.part(FILE_FIELD, part);

        debug!(webhook = %target, file = %file.file_name, bytes = size, "posting image");
        let response = self.client.post(&target.url).multipart(form).send()?;
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok(TransferResult { status, body })
    }
}
