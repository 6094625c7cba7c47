//! Audio adapters: microphone capture, speech model and transcription

mod capture;
mod whisper_cli;

pub use capture::{CaptureSettings, FfmpegCapture};
pub use whisper_cli::{WhisperCliAudio, MODEL_FILE_NAME, MODEL_URL};
