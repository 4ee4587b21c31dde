//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! Skipped
//!     notes.txt: not a readable image: ...
//!
//! Uploading 3 images to friends
//! [1/3  33%] Image a.png uploaded successfully
//! [2/3  67%] Image b.png upload failed: 403
//! [3/3 100%] Image c.png uploaded successfully
//!
//! 1 images failed to upload.
//!     Image b.png upload failed: 403
//! ```
//!
//! ## Webhooks
//!
//! ```text
//! Webhooks
//!     friends  https://discord.com/api/webhooks/1234/***
//! ```
//!
//! Webhook tokens are never printed.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::aggregate::{BatchProgress, BatchReport, StopReason};
use crate::metadata::MetadataRecord;
use crate::payload::PayloadFields;
use crate::scan::ScanResult;
use crate::store::Webhook;
use crate::types::{UploadOutcome, WebhookTarget, display_name};

const INDENT: &str = "    ";

// ============================================================================
// Upload
// ============================================================================

/// Inputs dropped before the batch, one line each under a `Skipped` header.
pub fn format_rejections(scan: &ScanResult) -> Vec<String> {
    if scan.rejected.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Skipped".to_string()];
    for rejection in &scan.rejected {
        lines.push(format!(
            "{INDENT}{}: {}",
            rejection.path.display(),
            rejection.error
        ));
    }
    lines
}

pub fn format_batch_header(count: usize, target: &WebhookTarget) -> String {
    let noun = if count == 1 { "image" } else { "images" };
    format!("Uploading {count} {noun} to {target}")
}

/// One line per outcome, prefixed with running progress.
pub fn format_progress_line(outcome: &UploadOutcome, progress: &BatchProgress) -> String {
    let width = progress.total.to_string().len();
    format!(
        "[{:>width$}/{} {:>3.0}%] {}",
        progress.completed,
        progress.total,
        progress.percent(),
        outcome.message
    )
}

/// Summary line, then each failure indented below it.
pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![report.summary.to_string()];
    for failure in &report.progress.failures {
        lines.push(format!("{INDENT}{failure}"));
    }
    match report.stop {
        StopReason::Complete => {}
        StopReason::DeadlineElapsed { outstanding } => lines.push(format!(
            "Stopped waiting after the batch deadline with {outstanding} still in flight"
        )),
        StopReason::Disconnected { outstanding } => lines.push(format!(
            "{outstanding} uploads ended without reporting a result"
        )),
    }
    lines
}

pub fn print_rejections(scan: &ScanResult) {
    for line in format_rejections(scan) {
        println!("{line}");
    }
}

pub fn print_batch_report(report: &BatchReport) {
    for line in format_batch_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Webhooks
// ============================================================================

/// Keep the webhook id, hide the token.
pub fn mask_webhook_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((head, _token)) => format!("{head}/***"),
        None => "***".to_string(),
    }
}

pub fn format_webhook_list(webhooks: &[Webhook]) -> Vec<String> {
    if webhooks.is_empty() {
        return vec!["No webhooks saved. Add one with `photo-relay webhooks add NAME URL`.".into()];
    }
    let width = webhooks
        .iter()
        .map(|w| w.name.chars().count())
        .max()
        .unwrap_or(0);
    let mut lines = vec!["Webhooks".to_string()];
    for webhook in webhooks {
        lines.push(format!(
            "{INDENT}{:<width$}  {}",
            webhook.name,
            mask_webhook_url(&webhook.url)
        ));
    }
    lines
}

pub fn print_webhook_list(webhooks: &[Webhook]) {
    for line in format_webhook_list(webhooks) {
        println!("{line}");
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Extracted record and the payload it produces, both as pretty JSON.
pub fn format_inspect(
    image: &std::path::Path,
    record: &MetadataRecord,
    payload: &PayloadFields,
    captured_at: Option<i64>,
) -> Vec<String> {
    let mut lines = vec![display_name(image)];
    if record.is_empty() {
        lines.push(format!("{INDENT}Metadata: none"));
    } else {
        lines.push(format!("{INDENT}Metadata:"));
        push_json(&mut lines, record);
    }
    match captured_at {
        Some(ts) => lines.push(format!("{INDENT}Captured: {ts}")),
        None => lines.push(format!("{INDENT}Captured: unknown")),
    }
    lines.push(format!("{INDENT}Payload:"));
    push_json(&mut lines, payload);
    lines
}

fn push_json<T: serde::Serialize>(lines: &mut Vec<String>, value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<{e}>"));
    lines.extend(json.lines().map(|l| format!("{INDENT}{INDENT}{l}")));
}

pub fn print_inspect(
    image: &std::path::Path,
    record: &MetadataRecord,
    payload: &PayloadFields,
    captured_at: Option<i64>,
) {
    for line in format_inspect(image, record, payload, captured_at) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::BatchSummary;
    use crate::scan::{Rejection, ScanError};
    use std::path::{Path, PathBuf};

    fn report(failures: &[&str], stop: StopReason) -> BatchReport {
        let progress = BatchProgress {
            completed: 3,
            total: 3,
            failures: failures.iter().map(|f| f.to_string()).collect(),
        };
        BatchReport {
            summary: BatchSummary::from_progress(&progress),
            progress,
            stop,
        }
    }

    // =========================================================================
    // Upload
    // =========================================================================

    #[test]
    fn progress_line_shows_count_percent_and_message() {
        let outcome = UploadOutcome::succeeded(Path::new("a.png"), "Image a.png uploaded successfully");
        let progress = BatchProgress {
            completed: 1,
            total: 3,
            failures: vec![],
        };
        assert_eq!(
            format_progress_line(&outcome, &progress),
            "[1/3  33%] Image a.png uploaded successfully"
        );
    }

    #[test]
    fn progress_line_pads_to_total_width() {
        let outcome = UploadOutcome::failed(Path::new("b.png"), "Image b.png upload failed: 403");
        let progress = BatchProgress {
            completed: 7,
            total: 12,
            failures: vec![],
        };
        assert_eq!(
            format_progress_line(&outcome, &progress),
            "[ 7/12  58%] Image b.png upload failed: 403"
        );
    }

    #[test]
    fn batch_header_pluralizes() {
        let target = WebhookTarget::named("friends", "https://x/1/t");
        assert_eq!(format_batch_header(1, &target), "Uploading 1 image to friends");
        assert_eq!(format_batch_header(3, &target), "Uploading 3 images to friends");
    }

    #[test]
    fn successful_report_is_one_line() {
        let lines = format_batch_report(&report(&[], StopReason::Complete));
        assert_eq!(lines, vec!["All images uploaded successfully"]);
    }

    #[test]
    fn failed_report_lists_failures() {
        let lines = format_batch_report(&report(
            &["Image b.png upload failed: 403"],
            StopReason::Complete,
        ));
        assert_eq!(
            lines,
            vec![
                "1 images failed to upload.",
                "    Image b.png upload failed: 403",
            ]
        );
    }

    #[test]
    fn deadline_report_explains_stop() {
        let lines = format_batch_report(&report(
            &["Image c.png upload failed: no result before the batch deadline"],
            StopReason::DeadlineElapsed { outstanding: 1 },
        ));
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("1 still in flight"));
    }

    #[test]
    fn rejections_listed_under_header() {
        let scan = ScanResult {
            accepted: vec![],
            rejected: vec![Rejection {
                path: PathBuf::from("gone.png"),
                error: ScanError::NotFound,
            }],
        };
        assert_eq!(
            format_rejections(&scan),
            vec!["Skipped", "    gone.png: file not found"]
        );
        assert!(format_rejections(&ScanResult::default()).is_empty());
    }

    // =========================================================================
    // Webhooks
    // =========================================================================

    #[test]
    fn mask_hides_token() {
        assert_eq!(
            mask_webhook_url("https://discord.com/api/webhooks/123/secret"),
            "https://discord.com/api/webhooks/123/***"
        );
        assert_eq!(mask_webhook_url("token"), "***");
    }

    #[test]
    fn webhook_list_aligns_names() {
        let webhooks = vec![
            Webhook {
                name: "a".into(),
                url: "https://discord.com/api/webhooks/1/s1".into(),
            },
            Webhook {
                name: "friends".into(),
                url: "https://discord.com/api/webhooks/2/s2".into(),
            },
        ];
        let lines = format_webhook_list(&webhooks);
        assert_eq!(lines[0], "Webhooks");
        assert_eq!(lines[1], "    a        https://discord.com/api/webhooks/1/***");
        assert_eq!(lines[2], "    friends  https://discord.com/api/webhooks/2/***");
        assert!(lines.iter().all(|l| !l.contains("s1") && !l.contains("s2")));
    }

    #[test]
    fn empty_webhook_list_hints_at_add() {
        let lines = format_webhook_list(&[]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("webhooks add"));
    }

    // =========================================================================
    // Inspect
    // =========================================================================

    #[test]
    fn inspect_without_metadata() {
        let lines = format_inspect(
            Path::new("/shots/plain.png"),
            &MetadataRecord::default(),
            &PayloadFields::default(),
            None,
        );
        assert_eq!(
            lines,
            vec![
                "plain.png",
                "    Metadata: none",
                "    Captured: unknown",
                "    Payload:",
                "        {}",
            ]
        );
    }
}
