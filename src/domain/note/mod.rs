//! Note domain module

mod id;
mod note;

pub use id::NoteId;
pub use note::{Note, NoteMeta, NoteSummary, DEFAULT_TITLE, PREVIEW_CHARS};
