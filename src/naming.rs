//! Capture-time resolution from screenshot file names.
//!
//! Screenshot tools name their files after the capture moment, e.g.
//! `VRChat_2024-03-09_21-45-07.123_2560x1440.png`. The embedded pattern is
//! `YYYY-MM-DD_HH-MM-SS` with an optional fractional second, in local time.
//!
//! Precedence for an upload's timestamp:
//!
//! 1. date-time pattern in the file name
//! 2. the file's creation time (not every platform/filesystem records one)
//! 3. absent
//!
//! A name that matches the pattern but is not a real date (month 13, hour 25)
//! falls through to step 2.

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

static CAPTURE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})(?:\.(\d+))?")
        .expect("capture pattern is valid")
});

/// Parse the capture date-time embedded in a file name, if any.
pub fn parse_capture_time(file_name: &str) -> Option<NaiveDateTime> {
    let caps = CAPTURE_PATTERN.captures(file_name)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?;
    let nanos = caps.get(7).map_or(0, |m| fraction_to_nanos(m.as_str()));
    date.and_hms_nano_opt(num(4)?, num(5)?, num(6)?, nanos)
}

/// `"5"` → 500_000_000, `"123"` → 123_000_000; digits past nanoseconds are dropped.
fn fraction_to_nanos(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

/// Seconds since the Unix epoch for a local wall-clock time.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times in a
/// DST gap don't exist and yield `None`.
pub fn local_timestamp(naive: &NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// Resolve the capture timestamp for an upload. See the module docs for precedence.
pub fn capture_timestamp(path: &Path) -> Option<i64> {
    let from_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_capture_time)
        .and_then(|naive| local_timestamp(&naive));
    from_name.or_else(|| creation_timestamp(path))
}

fn creation_timestamp(path: &Path) -> Option<i64> {
    let created = std::fs::metadata(path).ok()?.created().ok()?;
    let secs = created.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}
