//! Upload orchestration: one independent task per image.
//!
//! [`Uploader::start_batch`] turns a list of paths into [`UploadTask`]s and
//! launches them without waiting. Each task runs the same pipeline:
//!
//! ```text
//! extract metadata → build payload → send
//!                                     ├── 200 → success
//!                                     ├── 413 → recompress (JPEG) → send once more
//!                                     └── other → failure
//! ```
//!
//! and sends exactly one [`UploadOutcome`] on the batch channel, whatever
//! happens inside it (errors and panics included). The returned
//! [`BatchHandle`] owns the receiving end and hands it to the
//! [aggregator](crate::aggregate).
//!
//! ## Oversize retry
//!
//! A `413` is retried exactly once. The retry carries the re-encoded JPEG
//! under the name `<stem>.jpg` (`shot.png` goes out as `shot.jpg`), so the
//! file name matches the bytes; the first attempt always uses the original
//! name. Outcome messages name the original file in both cases. A second
//! rejection of any kind is final.
//!
//! ## Scheduling
//!
//! - [`Scheduling::Bounded`]: a dedicated rayon pool with `n` workers drains
//!   the tasks. This is the default.
//! - [`Scheduling::Unbounded`]: one named OS thread per file.
//!
//! Either way the observable contract is the same: one outcome per file,
//! failures isolated to their own task.

use crate::aggregate::{self, BatchReport, ProgressSink};
use crate::compress::{self, CompressError};
use crate::config::UploadConfig;
use crate::imaging::{ImageBackend, Quality};
use crate::metadata;
use crate::naming;
use crate::payload::{self, PayloadFields};
use crate::transfer::{Classification, FilePart, TransferError, Transport};
use crate::types::{UploadOutcome, WebhookTarget, display_name};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Transfer(#[from] TransferError),
    #[error("{0}")]
    Compress(#[from] CompressError),
    #[error("{status}")]
    Rejected { status: u16 },
    #[error("could not start upload workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One image to upload. Owned by the task that uploads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
    pub file_name: String,
    /// Capture time in seconds since the Unix epoch.
    pub captured_at: Option<i64>,
}

impl UploadTask {
    /// Resolve name and capture timestamp for `path`.
    pub fn from_path(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file_name: display_name(path),
            captured_at: naming::capture_timestamp(path),
        }
    }

    fn failure(&self, cause: impl std::fmt::Display) -> UploadOutcome {
        UploadOutcome::failed(
            &self.path,
            format!("Image {} upload failed: {cause}", self.file_name),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// One OS thread per file.
    Unbounded,
    /// Shared pool with this many workers.
    Bounded(usize),
}

/// Per-batch settings. Immutable once the batch starts.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub thread_mode: bool,
    pub recompress_quality: Quality,
    pub scheduling: Scheduling,
    /// Stop waiting for outcomes after this long.
    pub deadline: Option<Duration>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            thread_mode: false,
            recompress_quality: Quality::default(),
            scheduling: Scheduling::Bounded(crate::config::available_parallelism()),
            deadline: None,
        }
    }
}

impl UploadOptions {
    pub fn from_config(config: &UploadConfig) -> Self {
        let scheduling = if config.unbounded {
            Scheduling::Unbounded
        } else {
            Scheduling::Bounded(crate::config::effective_workers(config))
        };
        Self {
            thread_mode: config.thread_mode,
            recompress_quality: config.quality(),
            scheduling,
            deadline: config.batch_deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Runs uploads against a backend (metadata, recompression) and a transport.
#[derive(Clone)]
pub struct Uploader {
    backend: Arc<dyn ImageBackend>,
    transport: Arc<dyn Transport>,
    options: Arc<UploadOptions>,
}

impl Uploader {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        transport: Arc<dyn Transport>,
        options: UploadOptions,
    ) -> Self {
        Self {
            backend,
            transport,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Payload for `task`, exactly as [`upload_one`](Self::upload_one) would send it.
    pub fn payload_for(&self, task: &UploadTask) -> PayloadFields {
        let record = metadata::extract(self.backend.as_ref(), &task.path);
        payload::build(&record, task.captured_at, self.options.thread_mode)
    }

    /// Upload one image synchronously. Never fails; errors become a failure outcome.
    pub fn upload_one(&self, task: &UploadTask, target: &WebhookTarget) -> UploadOutcome {
        match self.try_upload(task, target) {
            Ok(()) => UploadOutcome::succeeded(
                &task.path,
                format!("Image {} uploaded successfully", task.file_name),
            ),
            Err(e) => task.failure(e),
        }
    }

    fn try_upload(&self, task: &UploadTask, target: &WebhookTarget) -> Result<(), UploadError> {
        let payload = self.payload_for(task);
        let bytes = std::fs::read(&task.path)?;
        debug!(file = %task.file_name, bytes = bytes.len(), "uploading");

        let first = self
            .transport
            .send(target, &payload, FilePart::new(task.file_name.clone(), bytes))?;
        match first.classify() {
            Classification::Delivered => Ok(()),
            Classification::Rejected(status) => Err(UploadError::Rejected { status }),
            Classification::TooLarge => {
                warn!(file = %task.file_name, "payload too large, recompressing and retrying once");
                // Dropping `smaller` at the end of this arm removes the temp file.
                let smaller = compress::recompress(
                    self.backend.as_ref(),
                    &task.path,
                    self.options.recompress_quality,
                )?;
                let retry = self.transport.send(
                    target,
                    &payload,
                    FilePart::new(smaller.upload_name(), smaller.read()?),
                )?;
                match retry.classify() {
                    Classification::Delivered => Ok(()),
                    Classification::TooLarge => Err(UploadError::Rejected { status: 413 }),
                    Classification::Rejected(status) => Err(UploadError::Rejected { status }),
                }
            }
        }
    }

    fn run_guarded(&self, task: &UploadTask, target: &WebhookTarget) -> UploadOutcome {
        panic::catch_unwind(AssertUnwindSafe(|| self.upload_one(task, target)))
            .unwrap_or_else(|_| task.failure("upload task panicked"))
    }

    /// Launch one task per path and return immediately.
    pub fn start_batch(
        &self,
        paths: &[PathBuf],
        target: WebhookTarget,
    ) -> Result<BatchHandle, UploadError> {
        let target = Arc::new(target);
        let (tx, rx) = mpsc::channel();
        let tasks: Vec<UploadTask> = paths.iter().map(|p| UploadTask::from_path(p)).collect();
        info!(
            files = tasks.len(),
            webhook = %target,
            scheduling = ?self.options.scheduling,
            "starting batch"
        );

        let pool = match self.options.scheduling {
            Scheduling::Bounded(workers) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(workers.max(1))
                    .thread_name(|i| format!("upload-worker-{i}"))
                    .build()?;
                for task in tasks {
                    let uploader = self.clone();
                    let target = Arc::clone(&target);
                    let tx = tx.clone();
                    pool.spawn(move || {
                        let _ = tx.send(uploader.run_guarded(&task, &target));
                    });
                }
                Some(pool)
            }
            Scheduling::Unbounded => {
                for (i, task) in tasks.into_iter().enumerate() {
                    self.spawn_thread(i, task, Arc::clone(&target), &tx);
                }
                None
            }
        };

        Ok(BatchHandle {
            paths: paths.to_vec(),
            outcomes: rx,
            deadline: self.options.deadline,
            _pool: pool,
        })
    }

    fn spawn_thread(
        &self,
        index: usize,
        task: UploadTask,
        target: Arc<WebhookTarget>,
        tx: &Sender<UploadOutcome>,
    ) {
        let uploader = self.clone();
        let task_tx = tx.clone();
        let fallback = task.failure("could not start upload thread");
        let spawned = thread::Builder::new()
            .name(format!("upload-{index}"))
            .spawn(move || {
                let _ = task_tx.send(uploader.run_guarded(&task, &target));
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn upload thread");
            let _ = tx.send(fallback);
        }
    }
}

/// A running batch. Consume it with [`wait`](Self::wait) or
/// [`spawn_collector`](Self::spawn_collector).
pub struct BatchHandle {
    paths: Vec<PathBuf>,
    outcomes: Receiver<UploadOutcome>,
    deadline: Option<Duration>,
    _pool: Option<ThreadPool>,
}

impl BatchHandle {
    pub fn total(&self) -> usize {
        self.paths.len()
    }

    /// Collect outcomes on the calling thread until the batch is done.
    pub fn wait<S>(self, sink: &mut S) -> BatchReport
    where
        S: ProgressSink + ?Sized,
    {
        aggregate::collect(&self.outcomes, &self.paths, self.deadline, sink)
    }

    /// Collect outcomes on a dedicated thread.
    pub fn spawn_collector<S>(self, mut sink: S) -> JoinHandle<BatchReport>
    where
        S: ProgressSink + Send + 'static,
    {
        thread::spawn(move || self.wait(&mut sink))
    }
}
