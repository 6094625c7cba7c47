//! Audio backend port interface

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::model::{DownloadProgress, ModelInfo};

/// Audio backend errors
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("Failed to check speech model: {0}")]
    ModelCheckFailed(String),

    #[error("Model download failed: {0}")]
    DownloadFailed(String),

    #[error("Failed to start recording: {0}")]
    StartFailed(String),

    #[error("No recording in progress")]
    NotRecording,

    #[error("Recording failed: {0}")]
    RecordingFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("{0} not found. Please install it or set its path in the config")]
    ToolNotFound(String),
}

/// Capacity of the download progress channel
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Port for the speech model, microphone capture and transcription.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Report whether the speech model is present.
    async fn check_model(&self) -> Result<ModelInfo, AudioError>;

    /// Subscribe to the download progress channel.
    ///
    /// Subscribers only see events sent after subscribing, so subscribe
    /// before calling `download_model`.
    fn subscribe_progress(&self) -> broadcast::Receiver<DownloadProgress>;

    /// Download the speech model, publishing progress on the channel.
    async fn download_model(&self) -> Result<(), AudioError>;

    /// Begin capturing microphone audio.
    async fn start_recording(&self) -> Result<(), AudioError>;

    /// Stop capturing and return the transcript of what was recorded.
    async fn stop_and_transcribe(&self) -> Result<String, AudioError>;

    /// Stop capturing and throw the recording away. Succeeds when nothing
    /// is being captured.
    async fn cancel_recording(&self) -> Result<(), AudioError>;
}
