//! Note entity, metadata and list projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NoteId;

/// Title given to freshly created notes
pub const DEFAULT_TITLE: &str = "Untitled Meeting";

/// Number of content characters kept in a summary preview
pub const PREVIEW_CHARS: usize = 120;

/// Note metadata persisted next to the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMeta {
    pub title: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteMeta {
    /// Metadata for a note created at `now`
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            participants: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fallback metadata for a note whose metadata is missing or unreadable
    pub fn fallback(id: &NoteId, now: DateTime<Utc>) -> Self {
        Self::new(id.as_str(), now)
    }

    /// Add a participant, keeping insertion order and ignoring duplicates.
    /// Returns whether the participant was added.
    pub fn add_participant(&mut self, name: impl Into<String>) -> bool {
        push_unique(&mut self.participants, name.into())
    }

    /// Add a tag, keeping insertion order and ignoring duplicates.
    /// Returns whether the tag was added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        push_unique(&mut self.tags, tag.into())
    }

    /// Copy of this metadata with `updated_at` stamped for a new persisted
    /// version. The stamp never goes below `floor`, so successive versions of
    /// the same note keep a non-decreasing `updated_at`.
    pub fn stamped(&self, now: DateTime<Utc>, floor: Option<DateTime<Utc>>) -> Self {
        let mut updated_at = now.max(self.updated_at);
        if let Some(floor) = floor {
            updated_at = updated_at.max(floor);
        }
        Self {
            updated_at,
            ..self.clone()
        }
    }
}

fn push_unique(items: &mut Vec<String>, item: String) -> bool {
    let item = item.trim().to_string();
    if item.is_empty() || items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

/// A single note: identifier, markdown content and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub content: String,
    pub meta: NoteMeta,
}

impl Note {
    /// A new, empty note with default metadata
    pub fn create(id: NoteId, title: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content: String::new(),
            meta: NoteMeta::new(title.unwrap_or(DEFAULT_TITLE), now),
        }
    }

    /// Read-only list projection of this note
    pub fn summary(&self) -> NoteSummary {
        NoteSummary::from_parts(self.id.clone(), &self.content, &self.meta)
    }
}

/// Read-only projection used for listing notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: NoteId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub preview: String,
}

impl NoteSummary {
    /// Build a summary from stored parts
    pub fn from_parts(id: NoteId, content: &str, meta: &NoteMeta) -> Self {
        Self {
            id,
            title: meta.title.clone(),
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            tags: meta.tags.clone(),
            preview: content.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}
