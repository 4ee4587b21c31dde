//! Embedded scene metadata.
//!
//! Screenshot loggers write a JSON document describing the scene into the
//! PNG text chunk keyed `Description`:
//!
//! ```json
//! {
//!   "application": "VRCX",
//!   "version": 1,
//!   "author": { "displayName": "...", "id": "usr_..." },
//!   "world": { "name": "...", "id": "wrld_...", "instanceId": "..." },
//!   "players": [ { "displayName": "...", "id": "usr_..." } ]
//! }
//! ```
//!
//! ## Degrading, not failing
//!
//! Reading metadata never fails an upload. A missing chunk, an unreadable
//! file, or malformed JSON all yield the empty [`MetadataRecord`]; the payload
//! builder treats that as "no scene information" and still posts the image.
//!
//! ## Defaults
//!
//! When the document is present and parses, missing pieces are filled in:
//!
//! - `world` / `world.name` → `"Unknown World"`
//! - `world.id` → `"Unknown ID"`
//! - `players[].displayName` → `"Unknown"`
//!
//! A `null` or wrongly typed value counts as missing. Fields the caption
//! never uses (`application`, `version`, `author`, ids) cannot sink the
//! record; only a `world` that is not an object or a `players` that is not
//! an array of objects makes the document malformed.
//!
//! ## Writing
//!
//! [`encode`] renders a record with a stable key order, and
//! [`embed_into_png`] stores it in a copy of a PNG (the `<stem>_Modified.png`
//! convention), carrying over the source file's access and modification times.

use crate::imaging::{DESCRIPTION_KEYWORD, ImageBackend, png_text};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs::{self, FileTimes};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const UNKNOWN_WORLD: &str = "Unknown World";
pub const UNKNOWN_WORLD_ID: &str = "Unknown ID";
pub const UNKNOWN_PLAYER: &str = "Unknown";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot embed metadata: {0}")]
    Png(#[from] png_text::PngTextError),
}

/// Structured scene record. `MetadataRecord::default()` is the empty record.
///
/// Only the shape of `world` and `players` is enforced. A scalar field with
/// the wrong type or a `null` reads as absent instead of failing the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<World>,
    #[serde(default)]
    pub players: Vec<Person>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    #[serde(default = "unknown_world", deserialize_with = "world_name")]
    pub name: String,
    #[serde(default = "unknown_world_id", deserialize_with = "world_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            name: unknown_world(),
            id: unknown_world_id(),
            instance_id: None,
        }
    }
}

/// A player or the photo's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default = "unknown_player", deserialize_with = "player_name")]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
}

fn unknown_world() -> String {
    UNKNOWN_WORLD.to_string()
}

fn unknown_world_id() -> String {
    UNKNOWN_WORLD_ID.to_string()
}

fn unknown_player() -> String {
    UNKNOWN_PLAYER.to_string()
}

/// Any JSON value; falls back to `T::default()` when it does not fit `T`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn string_or<'de, D: Deserializer<'de>>(
    deserializer: D,
    fallback: fn() -> String,
) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => fallback(),
    })
}

fn world_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, unknown_world)
}

fn world_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, unknown_world_id)
}

fn player_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    string_or(deserializer, unknown_player)
}

impl MetadataRecord {
    /// True for the record produced when no usable metadata was found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Display names of all players, in document order.
    pub fn player_names(&self) -> Vec<&str> {
        self.players
            .iter()
            .map(|p| p.display_name.as_str())
            .collect()
    }
}

/// Parse an embedded description document, applying the defaults above.
pub fn decode(text: &str) -> Result<MetadataRecord, MetadataError> {
    let mut record: MetadataRecord = serde_json::from_str(text)?;
    if record.world.is_none() {
        record.world = Some(World::default());
    }
    Ok(record)
}

/// Render a record as pretty JSON with a fixed key order.
pub fn encode(record: &MetadataRecord) -> Result<String, MetadataError> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Read the metadata record embedded in an image.
///
/// Never fails: see the [module docs](self) for how problems degrade.
pub fn extract(backend: &dyn ImageBackend, path: &Path) -> MetadataRecord {
    let text = match backend.read_description(path) {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!(path = %path.display(), "no embedded description");
            return MetadataRecord::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read embedded metadata");
            return MetadataRecord::default();
        }
    };
    match decode(&text) {
        Ok(record) => record,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed embedded metadata");
            MetadataRecord::default()
        }
    }
}

/// Default destination for [`embed_into_png`]: `shot.png` → `shot_Modified.png`.
pub fn modified_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{stem}_Modified.{}", ext.to_string_lossy()),
        None => format!("{stem}_Modified"),
    };
    source.with_file_name(file_name)
}

/// Write a copy of `source` with `record` embedded under `Description`.
///
/// The copy gets the source's access and modification times so photo
/// libraries keep sorting it where the original was.
pub fn embed_into_png(
    record: &MetadataRecord,
    source: &Path,
    output: &Path,
) -> Result<(), MetadataError> {
    let bytes = fs::read(source)?;
    let json = encode(record)?;
    let embedded = png_text::embed_text(&bytes, DESCRIPTION_KEYWORD, &json)?;
    fs::write(output, embedded)?;

    let meta = fs::metadata(source)?;
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    fs::File::options().write(true).open(output)?.set_times(times)?;
    Ok(())
}
