use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::Label;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub id_list: Option<String>,
    #[serde(default)]
    pub id_members: Vec<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_complete: bool,
    #[serde(default)]
    pub closed: bool,
}

/// A card comment, flattened from the source's action representation.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub text: String,
    /// Source user identifier of the author (username, lowercased by the
    /// identity mapper on lookup).
    pub author: String,
    /// Author's display name, used verbatim when no mapping exists.
    pub author_name: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// True when the file lives in the source system (and must be
    /// downloaded with credentials), false for plain link attachments.
    #[serde(default)]
    pub is_upload: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub check_items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: ItemState,
    #[serde(default)]
    pub pos: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Incomplete,
    Complete,
}

impl ChecklistItem {
    pub fn is_complete(&self) -> bool {
        self.state == ItemState::Complete
    }
}
