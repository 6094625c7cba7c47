//! Domain layer - Core business logic
//!
//! Contains value objects, entities, state machines and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod duration;
pub mod enhance;
pub mod error;
pub mod model;
pub mod note;
pub mod recording;

// Re-export common types
pub use config::AppConfig;
pub use duration::Duration;
pub use enhance::{AiProvider, Credentials, EnhanceMode, EnhanceSettings};
pub use error::*;
pub use model::{DownloadProgress, ModelInfo, ModelStatus};
pub use note::{Note, NoteId, NoteMeta, NoteSummary};
pub use recording::{RecordingSession, RecordingState};
