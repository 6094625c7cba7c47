//! Note storage adapters

mod markdown;

pub use markdown::MarkdownNoteStore;
