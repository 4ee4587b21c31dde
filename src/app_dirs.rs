//! Where photo-relay keeps its files.
//!
//! Config lives under the OS config directory and the webhook database and
//! log file under the OS data directory, both in a `photo-relay` folder.
//! Setting `PHOTO_RELAY_HOME` puts everything in that one directory instead,
//! which is what tests and portable installs use.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use directories::BaseDirs;
use thiserror::Error;

pub const APP_DIR_NAME: &str = "photo-relay";
pub const HOME_ENV: &str = "PHOTO_RELAY_HOME";
pub const CONFIG_FILE_NAME: &str = "config.toml";

static HOME_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No home directory found; set PHOTO_RELAY_HOME to choose where photo-relay keeps its files")]
    NoBaseDir,
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Directory holding `config.toml`. Not created.
pub fn config_dir() -> Result<PathBuf, AppDirError> {
    if let Some(home) = home_override() {
        return Ok(home);
    }
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join(APP_DIR_NAME))
        .ok_or(AppDirError::NoBaseDir)
}

/// Directory holding the database and logs, created if needed.
pub fn data_dir() -> Result<PathBuf, AppDirError> {
    let path = match home_override() {
        Some(home) => home,
        None => BaseDirs::new()
            .map(|dirs| dirs.data_dir().join(APP_DIR_NAME))
            .ok_or(AppDirError::NoBaseDir)?,
    };
    ensure_dir(&path)?;
    Ok(path)
}

pub fn default_config_path() -> Result<PathBuf, AppDirError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Absolute paths are returned as-is; relative ones land in [`data_dir`].
pub fn resolve_data_path(path: &Path) -> Result<PathBuf, AppDirError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(data_dir()?.join(path))
}

pub fn ensure_dir(path: &Path) -> Result<(), AppDirError> {
    std::fs::create_dir_all(path).map_err(|source| AppDirError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn home_override() -> Option<PathBuf> {
    if let Some(path) = HOME_OVERRIDE.lock().ok().and_then(|guard| guard.clone()) {
        return Some(path);
    }
    std::env::var_os(HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
pub(crate) fn set_home_override(path: Option<PathBuf>) {
    *HOME_OVERRIDE.lock().unwrap() = path;
}

/// Points every app directory at a temp dir for the guard's lifetime.
///
/// Holds a global lock so tests that change the override never overlap.
#[cfg(test)]
pub(crate) struct HomeGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
static HOME_TEST_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
impl HomeGuard {
    pub(crate) fn set(path: &Path) -> Self {
        let lock = HOME_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_home_override(Some(path.to_path_buf()));
        Self { _lock: lock }
    }
}

#[cfg(test)]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        set_home_override(None);
    }
}
