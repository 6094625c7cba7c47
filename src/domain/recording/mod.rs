//! Recording domain module

mod session;

pub use session::{InvalidStateTransition, RecordingSession, RecordingState};
