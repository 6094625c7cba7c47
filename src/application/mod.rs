//! Application layer - Coordination core and port interfaces
//!
//! Contains the editing-session coordination (action routing, autosave,
//! recording and model acquisition) and the trait definitions for external
//! system interactions.

pub mod autosave;
pub mod model;
pub mod ports;
pub mod registry;
pub mod session;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the coordination core
pub use autosave::{AutosaveScheduler, SaveEvent, SaveListener};
pub use model::{ModelAcquisition, ModelError, ProgressCallback};
pub use registry::{
    ActionHandler, ActionKind, ActionPayload, ActionRegistry, Dispatch, RecordAction, Registration,
};
pub use session::{EnhanceOutcome, NoteSession, SessionContext, SessionError};
pub use workspace::{Workspace, WorkspaceError, WorkspaceSettings};
