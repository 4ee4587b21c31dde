//! Pre-batch input validation.
//!
//! Turns the paths given on the command line into the list of images a batch
//! will upload. Runs before any upload starts, so a bad input is reported
//! up front instead of turning into a failed upload.
//!
//! ## Rules
//!
//! - A directory is walked recursively in sorted order. Only files with a
//!   supported image extension are picked up; anything else is skipped silently.
//! - A file, named directly or found in a directory, must exist and have a
//!   decodable image header. Otherwise it is rejected with a reason.
//! - A file named twice is uploaded once.

use crate::imaging::{ImageBackend, has_supported_extension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const NO_IMAGES_MESSAGE: &str = "No valid images to upload.";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("file not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
}

/// An input that will not be uploaded, and why.
#[derive(Debug)]
pub struct Rejection {
    pub path: PathBuf,
    pub error: ScanError,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// Images to upload, in input order.
    pub accepted: Vec<PathBuf>,
    pub rejected: Vec<Rejection>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    fn reject(&mut self, path: &Path, error: ScanError) {
        warn!(path = %path.display(), %error, "skipping input");
        self.rejected.push(Rejection {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// Expand and validate `inputs`.
pub fn collect_images(backend: &dyn ImageBackend, inputs: &[PathBuf]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut seen = HashSet::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        if has_supported_extension(entry.path()) {
                            check_file(backend, entry.path(), &mut seen, &mut result);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let path = e.path().unwrap_or(input).to_path_buf();
                        result.reject(&path, ScanError::Invalid(e.to_string()));
                    }
                }
            }
        } else {
            check_file(backend, input, &mut seen, &mut result);
        }
    }

    debug!(
        accepted = result.accepted.len(),
        rejected = result.rejected.len(),
        "inputs scanned"
    );
    result
}

fn check_file(
    backend: &dyn ImageBackend,
    path: &Path,
    seen: &mut HashSet<PathBuf>,
    result: &mut ScanResult,
) {
    if !path.exists() {
        result.reject(path, ScanError::NotFound);
        return;
    }
    if !path.is_file() {
        result.reject(path, ScanError::Invalid("not a regular file".into()));
        return;
    }
    if !seen.insert(path.to_path_buf()) {
        return;
    }
    match backend.identify(path) {
        Ok(_) => result.accepted.push(path.to_path_buf()),
        Err(e) => result.reject(path, ScanError::Invalid(format!("not a readable image: {e}"))),
    }
}
