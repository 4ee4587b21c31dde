//! Application configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! <config dir>/photo-relay/config.toml   # default
//! $PHOTO_RELAY_HOME/config.toml          # when PHOTO_RELAY_HOME is set
//! --config <PATH>                        # explicit, wins over both
//! ```
//!
//! A missing file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! [upload]
//! thread_mode = false         # add thread_name to every payload
//! # max_workers = 4           # bounded pool size (default: available parallelism)
//! unbounded = false           # one thread per file instead of a pool
//! recompress_quality = 85     # JPEG quality for the oversize fallback (1-100)
//! request_timeout_secs = 120
//! # batch_deadline_secs = 600 # stop waiting for outcomes after this long
//!
//! [logging]
//! level = "info"
//! # file = "photo-relay.log"  # relative paths resolve inside the data dir
//!
//! [store]
//! # path = "webhooks.db"      # relative paths resolve inside the data dir
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::app_dirs::{self, AppDirError};
use crate::imaging::Quality;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_STORE_FILE: &str = "webhooks.db";
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Dirs(#[from] AppDirError),
}

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(0) = self.upload.max_workers {
            return Err(ConfigError::Validation(
                "upload.max_workers must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.upload.recompress_quality) {
            return Err(ConfigError::Validation(
                "upload.recompress_quality must be 1-100".into(),
            ));
        }
        if self.upload.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upload.request_timeout_secs must be non-zero".into(),
            ));
        }
        if let Some(0) = self.upload.batch_deadline_secs {
            return Err(ConfigError::Validation(
                "upload.batch_deadline_secs must be non-zero".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Batch upload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Ask the webhook to open a named thread per image.
    pub thread_mode: bool,
    /// Size of the bounded worker pool. When absent, the available parallelism.
    pub max_workers: Option<usize>,
    /// One thread per file instead of a pool.
    pub unbounded: bool,
    /// JPEG quality used when an image is rejected as too large. Kept raw so
    /// [`AppConfig::validate`] can reject values outside 1-100.
    pub recompress_quality: u32,
    pub request_timeout_secs: u64,
    /// Stop waiting for outstanding uploads after this many seconds.
    pub batch_deadline_secs: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            thread_mode: false,
            max_workers: None,
            unbounded: false,
            recompress_quality: Quality::default().value(),
            request_timeout_secs: 120,
            batch_deadline_secs: None,
        }
    }
}

impl UploadConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.recompress_quality)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Number of threads the platform suggests, at least 1.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve the bounded pool size from config.
///
/// - `None` → available parallelism
/// - `Some(n)` → `n` as given; uploads wait on the network, so more workers
///   than cores is reasonable
pub fn effective_workers(config: &UploadConfig) -> usize {
    config
        .max_workers
        .unwrap_or_else(available_parallelism)
        .max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
    /// Optional plain-text log file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Webhook database location. Defaults to `webhooks.db` in the data dir.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE));
        Ok(app_dirs::resolve_data_path(&path)?)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or from the default location when `None`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => app_dirs::default_config_path()?,
    };
    let overlay = load_raw_config(&path)?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photo-relay Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Default location: <config dir>/photo-relay/config.toml
# ($PHOTO_RELAY_HOME/config.toml when PHOTO_RELAY_HOME is set).
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Uploading
# ---------------------------------------------------------------------------
[upload]
# Ask the webhook to create a named thread for every image
# (forum and media channels). The title comes from the world name.
thread_mode = false

# Number of uploads in flight at once.
# Omit or comment out to auto-detect (= available parallelism).
# max_workers = 4

# Start one thread per image instead of using a worker pool.
unbounded = false

# JPEG quality (1-100) used to re-encode an image that the webhook rejects
# as too large. The smaller copy is sent once; a second rejection is final.
recompress_quality = 85

# Per-request timeout in seconds.
request_timeout_secs = 120

# Stop waiting for results after this many seconds. Images still in flight
# are reported as failed. Omit to wait for every image.
# batch_deadline_secs = 600

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# trace, debug, info, warn or error. RUST_LOG takes precedence when set.
level = "info"

# Also write logs to this file. Relative paths resolve inside the data dir.
# file = "photo-relay.log"

# ---------------------------------------------------------------------------
# Webhook store
# ---------------------------------------------------------------------------
[store]
# SQLite database holding named webhooks.
# Relative paths resolve inside the data dir.
# path = "webhooks.db"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert!(!config.upload.thread_mode);
        assert!(!config.upload.unbounded);
        assert_eq!(config.upload.max_workers, None);
        assert_eq!(config.upload.recompress_quality, 85);
        assert_eq!(config.upload.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.upload.batch_deadline_secs, None);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.path, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[upload]
thread_mode = true
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        // Overridden value
        assert!(config.upload.thread_mode);
        // Default values preserved
        assert_eq!(config.upload.request_timeout_secs, 120);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn effective_workers_defaults_to_parallelism() {
        let config = UploadConfig::default();
        assert_eq!(effective_workers(&config), available_parallelism());
    }

    #[test]
    fn effective_workers_not_clamped_to_cores() {
        let config = UploadConfig {
            max_workers: Some(64),
            ..UploadConfig::default()
        };
        assert_eq!(effective_workers(&config), 64);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(Some(&tmp.path().join("config.toml"))).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[upload]
max_workers = 3
recompress_quality = 70
batch_deadline_secs = 600

[logging]
level = "debug"
file = "relay.log"
"#,
        )
        .unwrap();

        let config = load_config(Some(&config_path)).unwrap();
        assert_eq!(config.upload.max_workers, Some(3));
        assert_eq!(config.upload.recompress_quality, 70);
        assert_eq!(config.upload.batch_deadline_secs, Some(600));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("relay.log")));
        // Unspecified values should be defaults
        assert!(!config.upload.unbounded);
    }

    #[test]
    fn load_config_uses_home_override() {
        let tmp = TempDir::new().unwrap();
        let _guard = app_dirs::HomeGuard::set(tmp.path());
        fs::write(tmp.path().join("config.toml"), "[upload]\nunbounded = true\n").unwrap();

        let config = load_config(None).unwrap();
        assert!(config.upload.unbounded);
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[upload]\nthreadmode = true\n").unwrap();

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_unknown_section() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[uploads]\nthread_mode = true\n").unwrap();

        assert!(load_config(Some(&config_path)).is_err());
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[upload\nbroken").unwrap();

        assert!(matches!(
            load_config(Some(&config_path)),
            Err(ConfigError::Toml(_))
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = AppConfig::default();
        config.upload.max_workers = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("max_workers")
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.upload.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
        config.logging.level = "WARN".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_quality() {
        for quality in [0, 101, 250] {
            let config: AppConfig =
                toml::from_str(&format!("[upload]\nrecompress_quality = {quality}\n")).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("recompress_quality"), "{quality}: {err}");
        }
    }

    #[test]
    fn load_config_rejects_out_of_range_quality() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[upload]\nrecompress_quality = 250\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn quality_bounds_are_accepted() {
        for quality in [1, 100] {
            let config: AppConfig =
                toml::from_str(&format!("[upload]\nrecompress_quality = {quality}\n")).unwrap();
            assert!(config.validate().is_ok());
            assert_eq!(config.upload.quality().value(), quality);
        }
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_overlay_replaces_scalars_and_keeps_rest() {
        let base: toml::Value = toml::from_str("[upload]\nthread_mode = false\nunbounded = false\n").unwrap();
        let overlay: toml::Value = toml::from_str("[upload]\nthread_mode = true\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["upload"]["thread_mode"].as_bool(), Some(true));
        assert_eq!(merged["upload"]["unbounded"].as_bool(), Some(false));
    }

    #[test]
    fn stock_defaults_value_round_trips() {
        let config: AppConfig = stock_defaults_value().try_into().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_and_matches_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn stock_config_mentions_every_upload_key() {
        let text = stock_config_toml();
        for key in [
            "thread_mode",
            "max_workers",
            "unbounded",
            "recompress_quality",
            "request_timeout_secs",
            "batch_deadline_secs",
        ] {
            assert!(text.contains(key), "missing {key}");
        }
    }
}
