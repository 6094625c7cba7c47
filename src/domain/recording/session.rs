//! Recording session state machine

use std::fmt;
use thiserror::Error;

/// Recording states of one open note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Transcribing,
}

impl RecordingState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: RecordingState,
    pub action: String,
}

/// Recording session entity.
/// Manages state transitions for the record/transcribe lifecycle.
///
/// State machine:
///   IDLE -> RECORDING (start)
///   RECORDING -> TRANSCRIBING (stop)
///   TRANSCRIBING -> IDLE (complete)
///   RECORDING | TRANSCRIBING -> IDLE (abort)
#[derive(Debug, Default)]
pub struct RecordingSession {
    state: RecordingState,
}

impl RecordingSession {
    /// Create a new recording session in idle state
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RecordingState::Idle
    }

    /// Transition from IDLE to RECORDING
    pub fn start(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecordingState::Idle, RecordingState::Recording, "start recording")
    }

    /// Transition from RECORDING to TRANSCRIBING
    pub fn stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            RecordingState::Recording,
            RecordingState::Transcribing,
            "stop recording",
        )
    }

    /// Transition from TRANSCRIBING to IDLE
    pub fn complete(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            RecordingState::Transcribing,
            RecordingState::Idle,
            "complete transcription",
        )
    }

    /// Return to IDLE after a failed start or transcription
    pub fn abort(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state == RecordingState::Idle {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: "abort recording".to_string(),
            });
        }
        self.state = RecordingState::Idle;
        Ok(())
    }

    fn transition(
        &mut self,
        from: RecordingState,
        to: RecordingState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}
