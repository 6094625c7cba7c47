//! Brief - meeting notes with AI enhancement and local transcription
//!
//! This crate provides the editing-session core of a note-taking client:
//! debounced autosave, AI enhancement of the open note, microphone recording
//! with local whisper.cpp transcription, and acquisition of the speech model.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Notes, value objects, state machines, and errors
//! - **Application**: The coordination core (action registry, autosave,
//!   model acquisition, note sessions, workspace) and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (markdown files, HTTP model
//!   APIs, FFmpeg and whisper-cli, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
