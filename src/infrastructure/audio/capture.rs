//! FFmpeg microphone capture

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::application::ports::AudioError;

/// Input and tool settings for capture
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub ffmpeg_bin: String,
    /// FFmpeg input format (`pulse`, `avfoundation`, ...)
    pub input_format: String,
    pub input_device: String,
}

struct ActiveCapture {
    child: Child,
    path: PathBuf,
}

/// Records the microphone to 16 kHz mono WAV files until stopped
pub struct FfmpegCapture {
    settings: CaptureSettings,
    recordings_dir: PathBuf,
    active: Mutex<Option<ActiveCapture>>,
}

impl FfmpegCapture {
    pub fn new(settings: CaptureSettings, recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            recordings_dir: recordings_dir.into(),
            active: Mutex::new(None),
        }
    }

    /// Build FFmpeg args for an open-ended recording.
    /// Stderr is only read when the capture ends, so FFmpeg stays quiet
    /// until then and cannot fill the pipe.
    fn build_ffmpeg_args(&self, output_path: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.settings.input_format.clone(),
            "-i".to_string(),
            self.settings.input_device.clone(),
            "-ar".to_string(),
            "16000".to_string(), // whisper expects 16kHz
            "-ac".to_string(),
            "1".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            "-y".to_string(),
            output_path.to_string_lossy().to_string(),
        ]
    }

    fn output_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d-%H%M%S");
        self.recordings_dir.join(format!("recording-{}.wav", stamp))
    }

    pub async fn is_recording(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Spawn FFmpeg writing to a new file in the recordings directory
    pub async fn start(&self) -> Result<PathBuf, AudioError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(AudioError::StartFailed(
                "Recording already in progress".to_string(),
            ));
        }

        fs::create_dir_all(&self.recordings_dir)
            .await
            .map_err(|e| AudioError::StartFailed(e.to_string()))?;

        let path = self.output_path();
        let mut child = Command::new(&self.settings.ffmpeg_bin)
            .args(self.build_ffmpeg_args(&path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AudioError::ToolNotFound(self.settings.ffmpeg_bin.clone())
                } else {
                    AudioError::StartFailed(e.to_string())
                }
            })?;

        // A bad input device makes ffmpeg exit right away
        if let Ok(Some(status)) = child.try_wait() {
            let reason = Self::stderr_tail(&mut child).await;
            return Err(AudioError::StartFailed(format!("ffmpeg exited ({}): {}", status, reason)));
        }

        log::debug!("Capturing audio to {}", path.display());
        *active = Some(ActiveCapture {
            child,
            path: path.clone(),
        });
        Ok(path)
    }

    /// Stop FFmpeg gracefully and return the finished recording's path
    pub async fn stop(&self) -> Result<PathBuf, AudioError> {
        let ActiveCapture { mut child, path } =
            self.active.lock().await.take().ok_or(AudioError::NotRecording)?;

        // SIGINT lets ffmpeg finalize the WAV header
        Self::interrupt(&mut child)?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AudioError::RecordingFailed(e.to_string()))?;

        let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::RecordingFailed(format!(
                "no audio captured: {}",
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        log::debug!("Captured {} bytes to {}", size, path.display());
        Ok(path)
    }

    /// Kill FFmpeg and delete the partial recording. A no-op when idle.
    pub async fn cancel(&self) -> Result<(), AudioError> {
        let Some(ActiveCapture { mut child, path }) = self.active.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = child.kill().await {
            log::warn!("Failed to kill ffmpeg: {}", e);
        }
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
        log::info!("Cancelled recording {}", path.display());
        Ok(())
    }

    async fn stderr_tail(child: &mut Child) -> String {
        let mut buf = Vec::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf)
            .lines()
            .last()
            .unwrap_or("unknown error")
            .to_string()
    }

    #[cfg(unix)]
    fn interrupt(child: &mut Child) -> Result<(), AudioError> {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Some(id) = child.id() {
            // A terminal Ctrl+C may have reached ffmpeg already
            match signal::kill(Pid::from_raw(id as i32), Signal::SIGINT) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    return Err(AudioError::RecordingFailed(format!("Signal failed: {}", e)))
                }
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn interrupt(child: &mut Child) -> Result<(), AudioError> {
        child
            .start_kill()
            .map_err(|e| AudioError::RecordingFailed(e.to_string()))
    }
}
