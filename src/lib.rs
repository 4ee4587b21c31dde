//! # photo-relay
//!
//! Uploads batches of world screenshots to a chat webhook, captioning each one
//! from the scene metadata embedded in the image: which world it was taken
//! in, who was there, and when.
//!
//! # Architecture: Fan-Out, Fan-In
//!
//! ```text
//! paths ─► scan ─► Uploader::start_batch ─┬─► task ─┐
//!                                         ├─► task ─┼─► mpsc ─► aggregate::collect ─► BatchReport
//!                                         └─► task ─┘
//! ```
//!
//! Every task is independent: it reads the image's metadata, builds the
//! message, posts the file, and on a `413 Payload Too Large` re-encodes the
//! image once and posts again. It then sends exactly one outcome on the
//! batch channel. A single collector drains the channel, keeps the running
//! progress and hands each update to the presentation layer.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`metadata`] | Embedded JSON scene record: extract, decode, encode, embed |
//! | [`payload`] | Record + timestamp → webhook form fields |
//! | [`transfer`] | One multipart POST through the [`transfer::Transport`] seam |
//! | [`compress`] | JPEG re-encode into a self-deleting temp file for the oversize retry |
//! | [`upload`] | Task pipeline, scheduling (pool or thread per file), batch handle |
//! | [`aggregate`] | Outcome fan-in, progress, summary, deadline handling |
//! | [`scan`] | Input expansion and validation before a batch starts |
//! | [`store`] | SQLite-backed named webhooks |
//! | [`naming`] | Capture time from `YYYY-MM-DD_HH-MM-SS` file names |
//! | [`imaging`] | Pure-Rust image backend and PNG text chunk codec |
//! | [`config`] | `config.toml` loading, validation, merging |
//! | [`app_dirs`] | Config and data directory resolution |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//! | [`types`] | Types shared between stages (`WebhookTarget`, `UploadOutcome`) |
//!
//! # Design Decisions
//!
//! ## Threads, Not Async
//!
//! A batch is a handful to a few hundred files, each one a single blocking
//! POST. Plain threads with `reqwest::blocking` keep the code linear and the
//! binary free of an async runtime. A rayon pool bounds the number of uploads
//! in flight by default; `--unbounded` starts one thread per file.
//!
//! ## One Outcome Per File
//!
//! Tasks never return errors to the caller. Failures (HTTP status, network
//! error, unreadable file, failed re-encode, even a panic) are converted into
//! a failure outcome inside the task, so the collector can always account for
//! every file and siblings are never affected.
//!
//! ## Backend and Transport Traits
//!
//! Image work goes through [`imaging::ImageBackend`] and network work through
//! [`transfer::Transport`]. Tests swap in a recording mock backend and a
//! scripted transport, so the whole task pipeline, retry included, is tested
//! without decoding pixels or opening sockets.

pub mod aggregate;
pub mod app_dirs;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod payload;
pub mod scan;
pub mod store;
pub mod transfer;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
