//! whisper.cpp audio backend
//!
//! The speech model is a GGML file under `<data_dir>/models`, downloaded on
//! request. Recordings are captured with FFmpeg and transcribed by running
//! the `whisper-cli` binary on the finished WAV file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::broadcast;

use crate::application::ports::{AudioBackend, AudioError, PROGRESS_CHANNEL_CAPACITY};
use crate::domain::model::{DownloadProgress, ModelInfo};

use super::capture::{CaptureSettings, FfmpegCapture};

/// Model file used for transcription
pub const MODEL_FILE_NAME: &str = "ggml-base.en.bin";

/// Where the model is downloaded from
pub const MODEL_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin";

/// Local transcription with whisper.cpp
pub struct WhisperCliAudio {
    models_dir: PathBuf,
    model_url: String,
    whisper_bin: String,
    capture: FfmpegCapture,
    client: reqwest::Client,
    progress: broadcast::Sender<DownloadProgress>,
}

impl WhisperCliAudio {
    /// Backend keeping models and recordings under `data_dir`
    pub fn new(
        data_dir: impl AsRef<Path>,
        whisper_bin: impl Into<String>,
        capture: CaptureSettings,
    ) -> Self {
        let data_dir = data_dir.as_ref();
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            models_dir: data_dir.join("models"),
            model_url: MODEL_URL.to_string(),
            whisper_bin: whisper_bin.into(),
            capture: FfmpegCapture::new(capture, data_dir.join("recordings")),
            client: reqwest::Client::new(),
            progress,
        }
    }

    /// Download the model from a different URL
    pub fn with_model_url(mut self, url: impl Into<String>) -> Self {
        self.model_url = url.into();
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(MODEL_FILE_NAME)
    }

    fn publish(&self, downloaded: u64, total: u64) {
        // Nobody listening is fine
        let _ = self.progress.send(DownloadProgress::new(downloaded, total));
    }

    async fn fetch_to(&self, tmp_path: &Path) -> Result<(), AudioError> {
        let response = self
            .client
            .get(&self.model_url)
            .send()
            .await
            .map_err(|e| AudioError::DownloadFailed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AudioError::DownloadFailed(format!("HTTP {}", response.status())));
        }

        let total = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;
        let mut file = fs::File::create(tmp_path)
            .await
            .map_err(|e| AudioError::DownloadFailed(format!("cannot create {}: {}", tmp_path.display(), e)))?;

        self.publish(0, total);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AudioError::DownloadFailed(format!("stream error: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AudioError::DownloadFailed(format!("write failed: {}", e)))?;
            downloaded += chunk.len() as u64;
            self.publish(downloaded, total);
        }

        file.flush()
            .await
            .map_err(|e| AudioError::DownloadFailed(format!("flush failed: {}", e)))?;
        Ok(())
    }

    /// Run whisper-cli on a WAV file and return the plain-text transcript
    async fn transcribe(&self, wav: &Path) -> Result<String, AudioError> {
        let output = Command::new(&self.whisper_bin)
            .args(Self::whisper_args(&self.model_path(), wav))
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AudioError::ToolNotFound(self.whisper_bin.clone())
                } else {
                    AudioError::TranscriptionFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::TranscriptionFailed(format!(
                "{} exited with {}: {}",
                self.whisper_bin,
                output.status,
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        Ok(Self::clean_transcript(&String::from_utf8_lossy(&output.stdout)))
    }

    fn whisper_args(model: &Path, wav: &Path) -> Vec<String> {
        vec![
            "-m".to_string(),
            model.to_string_lossy().to_string(),
            "-f".to_string(),
            wav.to_string_lossy().to_string(),
            "-nt".to_string(), // no timestamps
            "-np".to_string(), // no progress output
        ]
    }

    /// Join whisper's output lines into one paragraph
    fn clean_transcript(stdout: &str) -> String {
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl AudioBackend for WhisperCliAudio {
    async fn check_model(&self) -> Result<ModelInfo, AudioError> {
        let path = self.model_path();
        let exists = match fs::metadata(&path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(AudioError::ModelCheckFailed(e.to_string())),
        };
        Ok(ModelInfo { exists, path })
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    async fn download_model(&self) -> Result<(), AudioError> {
        fs::create_dir_all(&self.models_dir)
            .await
            .map_err(|e| AudioError::DownloadFailed(e.to_string()))?;

        let dest = self.model_path();
        let tmp_path = dest.with_extension("bin.downloading");
        log::info!("Downloading {} to {}", self.model_url, dest.display());

        if let Err(e) = self.fetch_to(&tmp_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        fs::rename(&tmp_path, &dest)
            .await
            .map_err(|e| AudioError::DownloadFailed(format!("rename failed: {}", e)))
    }

    async fn start_recording(&self) -> Result<(), AudioError> {
        self.capture.start().await.map(|_| ())
    }

    async fn stop_and_transcribe(&self) -> Result<String, AudioError> {
        let wav = self.capture.stop().await?;
        self.transcribe(&wav).await
    }

    async fn cancel_recording(&self) -> Result<(), AudioError> {
        self.capture.cancel().await
    }
}
