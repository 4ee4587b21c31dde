//! Webhook message construction.
//!
//! Turns a [`MetadataRecord`] plus a capture timestamp into the form fields
//! posted alongside the image:
//!
//! | Metadata | Thread mode | Fields |
//! |---|---|---|
//! | complete | off | `content` |
//! | complete | on | `content`, `thread_name = "Photo taken at {world}"` |
//! | incomplete | off | *(none)* |
//! | incomplete | on | `thread_name = "Image Upload"` |
//!
//! "Complete" means a non-empty world name, a non-empty world id and at least
//! one player. Timestamps render as Discord `<t:…:f>` tags so every reader
//! sees the capture time in their own timezone.

use crate::metadata::MetadataRecord;
use serde::Serialize;

/// Forum/media channels cap thread titles at this many characters.
pub const MAX_THREAD_NAME_CHARS: usize = 100;
const ELLIPSIS: &str = "...";
pub const FALLBACK_THREAD_NAME: &str = "Image Upload";

/// Form fields of one webhook post. Absent fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayloadFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
}

impl PayloadFields {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.thread_name.is_none()
    }

    /// `(name, value)` pairs in the order they are written to the form.
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::with_capacity(2);
        if let Some(content) = &self.content {
            fields.push(("content", content.as_str()));
        }
        if let Some(thread_name) = &self.thread_name {
            fields.push(("thread_name", thread_name.as_str()));
        }
        fields
    }
}

/// Build the payload for one image.
pub fn build(record: &MetadataRecord, timestamp: Option<i64>, thread_mode: bool) -> PayloadFields {
    let Some((world_name, world_id)) = complete_world(record) else {
        return PayloadFields {
            content: None,
            thread_name: thread_mode.then(|| FALLBACK_THREAD_NAME.to_string()),
        };
    };

    let vrchat_link = format!("[**VRChat**](<https://vrchat.com/home/launch?worldId={world_id}>)");
    let vrcx_link = format!("[**VRCX**](<https://vrcx.azurewebsites.net/world/{world_id}>)");
    let mut content = format!(
        "Photo taken at **{world_name}** (*{vrchat_link}*, *{vrcx_link}*) with **{}**",
        record.player_names().join(", ")
    );
    if let Some(ts) = timestamp {
        content.push_str(&format!(" at <t:{ts}:f>"));
    }

    PayloadFields {
        content: Some(content),
        thread_name: thread_mode.then(|| thread_title(world_name)),
    }
}

fn complete_world(record: &MetadataRecord) -> Option<(&str, &str)> {
    let world = record.world.as_ref()?;
    if world.name.is_empty() || world.id.is_empty() || record.players.is_empty() {
        return None;
    }
    Some((world.name.as_str(), world.id.as_str()))
}

/// `"Photo taken at {world}"`, cut to [`MAX_THREAD_NAME_CHARS`] characters.
pub fn thread_title(world_name: &str) -> String {
    let title = format!("Photo taken at {world_name}");
    if title.chars().count() <= MAX_THREAD_NAME_CHARS {
        return title;
    }
    let keep = MAX_THREAD_NAME_CHARS - ELLIPSIS.len();
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
