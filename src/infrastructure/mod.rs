//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like the filesystem, HTTP model
//! APIs, FFmpeg and whisper.cpp.

pub mod audio;
pub mod config;
pub mod enhance;
pub mod notes;

// Re-export adapters
pub use audio::{CaptureSettings, FfmpegCapture, WhisperCliAudio};
pub use config::XdgConfigStore;
pub use enhance::{Endpoints, HttpEnhancer};
pub use notes::MarkdownNoteStore;
