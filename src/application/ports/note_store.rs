//! Note persistence port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::note::{Note, NoteId, NoteMeta, NoteSummary};

/// Persistence errors
#[derive(Debug, Clone, Error)]
pub enum NoteStoreError {
    #[error("Note not found: {0}")]
    NotFound(NoteId),

    #[error("Failed to list notes: {0}")]
    ListFailed(String),

    #[error("Failed to read note {id}: {message}")]
    ReadFailed { id: NoteId, message: String },

    #[error("Failed to write note {id}: {message}")]
    WriteFailed { id: NoteId, message: String },

    #[error("Failed to delete note {id}: {message}")]
    DeleteFailed { id: NoteId, message: String },
}

/// Port for note storage.
///
/// Implementations perform their own atomic writes; callers only guarantee
/// that writes for one note are never issued concurrently.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// List summaries of every stored note, most recently updated first.
    async fn list(&self) -> Result<Vec<NoteSummary>, NoteStoreError>;

    /// Read one note.
    async fn read(&self, id: &NoteId) -> Result<Note, NoteStoreError>;

    /// Create or replace a note's content and metadata.
    async fn write(&self, id: &NoteId, content: &str, meta: &NoteMeta)
        -> Result<(), NoteStoreError>;

    /// Remove a note. Removing a missing note is not an error.
    async fn delete(&self, id: &NoteId) -> Result<(), NoteStoreError>;
}
