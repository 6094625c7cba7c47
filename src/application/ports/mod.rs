//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod audio;
pub mod config;
pub mod enhancer;
pub mod note_store;

// Re-export common types
pub use audio::{AudioBackend, AudioError, PROGRESS_CHANNEL_CAPACITY};
pub use config::ConfigStore;
pub use enhancer::{EnhanceError, EnhanceRequest, Enhancer};
pub use note_store::{NoteStore, NoteStoreError};
