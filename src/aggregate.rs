//! Fan-in of upload outcomes into batch progress and a final report.
//!
//! Every upload task sends exactly one [`UploadOutcome`] on the batch channel.
//! [`collect`] drains that channel on a single thread, which owns the
//! [`BatchProgress`] and is the only place that talks to the presentation
//! layer (through a [`ProgressSink`]). Upload threads never touch it.
//!
//! Collection ends when:
//!
//! - every expected outcome has arrived ([`StopReason::Complete`]),
//! - the optional deadline elapses ([`StopReason::DeadlineElapsed`]), or
//! - all senders are gone with outcomes still missing ([`StopReason::Disconnected`]).
//!
//! In the last two cases each missing file is recorded as a failure, so the
//! summary never reports success for an image whose result is unknown.

use crate::types::{UploadOutcome, display_name};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Running totals for one batch. `completed` only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    /// Failure messages in arrival order.
    pub failures: Vec<String>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            failures: Vec::new(),
        }
    }

    /// Completion percentage; an empty batch counts as done.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    fn record(&mut self, outcome: &UploadOutcome) {
        self.completed += 1;
        if !outcome.success {
            self.failures.push(outcome.message.clone());
        }
    }
}

/// Receives progress after every outcome. Runs on the collecting thread.
pub trait ProgressSink {
    fn on_outcome(&mut self, outcome: &UploadOutcome, progress: &BatchProgress);
}

impl<F> ProgressSink for F
where
    F: FnMut(&UploadOutcome, &BatchProgress),
{
    fn on_outcome(&mut self, outcome: &UploadOutcome, progress: &BatchProgress) {
        self(outcome, progress)
    }
}

/// Sink that ignores progress, for callers that only want the report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_outcome(&mut self, _outcome: &UploadOutcome, _progress: &BatchProgress) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Complete,
    DeadlineElapsed { outstanding: usize },
    Disconnected { outstanding: usize },
}

/// End-of-batch status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSummary {
    AllSucceeded,
    Failed(usize),
}

impl BatchSummary {
    pub fn from_progress(progress: &BatchProgress) -> Self {
        match progress.failures.len() {
            0 => BatchSummary::AllSucceeded,
            n => BatchSummary::Failed(n),
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSummary::AllSucceeded => write!(f, "All images uploaded successfully"),
            BatchSummary::Failed(n) => write!(f, "{n} images failed to upload."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub progress: BatchProgress,
    pub summary: BatchSummary,
    pub stop: StopReason,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.summary == BatchSummary::AllSucceeded
    }
}

/// Drain `outcomes` until one has arrived for every path in `expected`.
///
/// `expected` may contain the same path more than once; each occurrence
/// expects its own outcome.
pub fn collect<S>(
    outcomes: &Receiver<UploadOutcome>,
    expected: &[PathBuf],
    deadline: Option<Duration>,
    sink: &mut S,
) -> BatchReport
where
    S: ProgressSink + ?Sized,
{
    let mut progress = BatchProgress::new(expected.len());
    let mut pending: HashMap<&PathBuf, usize> = HashMap::new();
    for path in expected {
        *pending.entry(path).or_default() += 1;
    }
    let give_up_at = deadline.map(|d| Instant::now() + d);

    let stop = loop {
        if progress.is_complete() {
            break StopReason::Complete;
        }
        let outstanding = progress.total - progress.completed;
        let received = match give_up_at {
            None => outcomes
                .recv()
                .map_err(|_| StopReason::Disconnected { outstanding }),
            Some(at) => outcomes
                .recv_timeout(at.saturating_duration_since(Instant::now()))
                .map_err(|e| match e {
                    RecvTimeoutError::Timeout => StopReason::DeadlineElapsed { outstanding },
                    RecvTimeoutError::Disconnected => StopReason::Disconnected { outstanding },
                }),
        };
        let outcome = match received {
            Ok(outcome) => outcome,
            Err(stop) => break stop,
        };

        if let Some(count) = pending.get_mut(&outcome.path) {
            *count = count.saturating_sub(1);
        }
        progress.record(&outcome);
        if outcome.success {
            info!("{}", outcome.message);
        } else {
            error!("{}", outcome.message);
        }
        sink.on_outcome(&outcome, &progress);
    };

    if stop != StopReason::Complete {
        let cause = match stop {
            StopReason::DeadlineElapsed { .. } => "no result before the batch deadline",
            _ => "upload task ended without reporting",
        };
        warn!(?stop, "batch stopped with outcomes missing");
        for path in expected {
            if let Some(count) = pending.get_mut(path).filter(|c| **c > 0) {
                *count -= 1;
                progress.failures.push(format!(
                    "Image {} upload failed: {cause}",
                    display_name(path)
                ));
            }
        }
    }

    let summary = BatchSummary::from_progress(&progress);
    info!(
        completed = progress.completed,
        total = progress.total,
        failed = progress.failures.len(),
        "{summary}"
    );
    BatchReport {
        progress,
        summary,
        stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::mpsc;

    fn ok(name: &str) -> UploadOutcome {
        UploadOutcome::succeeded(
            Path::new(name),
            format!("Image {name} uploaded successfully"),
        )
    }

    fn failed(name: &str, cause: &str) -> UploadOutcome {
        UploadOutcome::failed(Path::new(name), format!("Image {name} upload failed: {cause}"))
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    // =========================================================================
    // Progress and summary
    // =========================================================================

    #[test]
    fn percent_tracks_completion() {
        let mut progress = BatchProgress::new(4);
        assert_eq!(progress.percent(), 0.0);
        progress.record(&ok("a.png"));
        assert_eq!(progress.percent(), 25.0);
        assert_eq!(BatchProgress::new(0).percent(), 100.0);
    }

    #[test]
    fn summary_text() {
        assert_eq!(
            BatchSummary::AllSucceeded.to_string(),
            "All images uploaded successfully"
        );
        assert_eq!(
            BatchSummary::Failed(2).to_string(),
            "2 images failed to upload."
        );
    }

    // =========================================================================
    // Collection
    // =========================================================================

    #[test]
    fn collects_every_outcome_in_arrival_order() {
        let (tx, rx) = mpsc::channel();
        tx.send(failed("b.png", "500")).unwrap();
        tx.send(ok("a.png")).unwrap();
        tx.send(failed("c.png", "403")).unwrap();

        let mut seen = Vec::new();
        let mut sink = |_: &UploadOutcome, p: &BatchProgress| seen.push(p.completed);
        let report = collect(&rx, &paths(&["a.png", "b.png", "c.png"]), None, &mut sink);

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(report.stop, StopReason::Complete);
        assert_eq!(report.progress.completed, 3);
        assert_eq!(
            report.progress.failures,
            vec![
                "Image b.png upload failed: 500".to_string(),
                "Image c.png upload failed: 403".to_string(),
            ]
        );
        assert_eq!(report.summary, BatchSummary::Failed(2));
        assert!(!report.is_success());
    }

    #[test]
    fn all_successful_batch() {
        let (tx, rx) = mpsc::channel();
        tx.send(ok("a.png")).unwrap();
        tx.send(ok("b.png")).unwrap();
        let report = collect(&rx, &paths(&["a.png", "b.png"]), None, &mut NoProgress);
        assert!(report.is_success());
        assert_eq!(report.summary.to_string(), "All images uploaded successfully");
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let (_tx, rx) = mpsc::channel::<UploadOutcome>();
        let report = collect(&rx, &[], None, &mut NoProgress);
        assert_eq!(report.stop, StopReason::Complete);
        assert!(report.is_success());
    }

    #[test]
    fn stops_after_total_even_if_channel_stays_open() {
        let (tx, rx) = mpsc::channel();
        tx.send(ok("a.png")).unwrap();
        let report = collect(&rx, &paths(&["a.png"]), None, &mut NoProgress);
        assert_eq!(report.stop, StopReason::Complete);
        drop(tx);
    }

    #[test]
    fn disconnect_counts_missing_as_failures() {
        let (tx, rx) = mpsc::channel();
        tx.send(ok("a.png")).unwrap();
        drop(tx);

        let report = collect(&rx, &paths(&["a.png", "b.png", "c.png"]), None, &mut NoProgress);
        assert_eq!(report.stop, StopReason::Disconnected { outstanding: 2 });
        assert_eq!(report.progress.completed, 1);
        assert_eq!(report.summary, BatchSummary::Failed(2));
        assert_eq!(
            report.progress.failures[0],
            "Image b.png upload failed: upload task ended without reporting"
        );
    }

    #[test]
    fn deadline_counts_missing_as_failures() {
        let (tx, rx) = mpsc::channel();
        tx.send(ok("a.png")).unwrap();

        let started = Instant::now();
        let report = collect(
            &rx,
            &paths(&["a.png", "slow.png"]),
            Some(Duration::from_millis(50)),
            &mut NoProgress,
        );
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(report.stop, StopReason::DeadlineElapsed { outstanding: 1 });
        assert_eq!(
            report.progress.failures,
            vec!["Image slow.png upload failed: no result before the batch deadline".to_string()]
        );
        drop(tx);
    }

    #[test]
    fn duplicate_paths_each_expect_an_outcome() {
        let (tx, rx) = mpsc::channel();
        tx.send(ok("a.png")).unwrap();
        drop(tx);

        let report = collect(&rx, &paths(&["a.png", "a.png"]), None, &mut NoProgress);
        assert_eq!(report.stop, StopReason::Disconnected { outstanding: 1 });
        assert_eq!(report.progress.failures.len(), 1);
    }
}
