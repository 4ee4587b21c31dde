//! Named webhooks persisted in SQLite.
//!
//! Users register a webhook once under a short name and refer to it by that
//! name afterwards. The table is created on open:
//!
//! ```sql
//! CREATE TABLE webhooks (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, url TEXT NOT NULL)
//! ```

use regex::Regex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::WebhookTarget;

static WEBHOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(ptb\.|canary\.)?discord(app)?\.com/api/webhooks/\d+/\S+$")
        .expect("webhook url pattern is valid")
});

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("webhook name must not be empty")]
    EmptyName,
    #[error("'{0}' is not a Discord webhook URL")]
    InvalidUrl(String),
    #[error("a webhook named '{0}' already exists")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webhook {
    pub name: String,
    pub url: String,
}

impl Webhook {
    pub fn target(&self) -> WebhookTarget {
        WebhookTarget::named(&self.name, &self.url)
    }
}

/// Whether `url` looks like a Discord webhook endpoint.
pub fn is_valid_webhook_url(url: &str) -> bool {
    WEBHOOK_URL.is_match(url)
}

pub struct WebhookStore {
    conn: Connection,
}

impl WebhookStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        debug!(path = %path.display(), "opening webhook store");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS webhooks (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL
             );",
        )?;
        Ok(Self { conn })
    }

    /// All webhooks ordered by name.
    pub fn list(&self) -> Result<Vec<Webhook>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, url FROM webhooks ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Webhook {
                name: row.get(0)?,
                url: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn find(&self, name: &str) -> Result<Option<Webhook>, StoreError> {
        let webhook = self
            .conn
            .query_row(
                "SELECT name, url FROM webhooks WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Webhook {
                        name: row.get(0)?,
                        url: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(webhook)
    }

    /// Add a webhook. The name is trimmed; the URL must be a Discord webhook.
    pub fn insert(&self, name: &str, url: &str) -> Result<Webhook, StoreError> {
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if !is_valid_webhook_url(url) {
            return Err(StoreError::InvalidUrl(url.to_string()));
        }

        match self.conn.execute(
            "INSERT INTO webhooks (name, url) VALUES (?1, ?2)",
            params![name, url],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::Duplicate(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        info!(name, "webhook added");
        Ok(Webhook {
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    /// Remove a webhook by name. Returns whether one was removed.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM webhooks WHERE name = ?1", params![name.trim()])?;
        if removed > 0 {
            info!(name, "webhook removed");
        }
        Ok(removed > 0)
    }
}
