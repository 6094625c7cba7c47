//! Speech model acquisition state machine

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Availability of the local speech-recognition model.
///
/// The download percentage only exists while downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelStatus {
    #[default]
    Checking,
    Missing,
    Downloading { percent: u8 },
    Ready,
}

impl ModelStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Missing => "missing",
            Self::Downloading { .. } => "downloading",
            Self::Ready => "ready",
        }
    }

    /// Download percentage, only while downloading
    pub const fn download_percent(&self) -> Option<u8> {
        match self {
            Self::Downloading { percent } => Some(*percent),
            _ => None,
        }
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloading { percent } => write!(f, "downloading ({}%)", percent),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Result of asking the audio backend whether the model is present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub exists: bool,
    pub path: PathBuf,
}

/// One progress event of the model download stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: u64,
    pub percent: u8,
}

impl DownloadProgress {
    /// Build an event, deriving the percentage. An unknown total (0) reports 0%.
    pub fn new(downloaded: u64, total: u64) -> Self {
        let percent = if total == 0 {
            0
        } else {
            (downloaded.saturating_mul(100) / total).min(100) as u8
        };
        Self {
            downloaded,
            total,
            percent,
        }
    }
}

/// Error when an invalid model transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid model transition: cannot {action} while {current}")]
pub struct InvalidModelTransition {
    pub current: ModelStatus,
    pub action: String,
}

/// Model acquisition lifecycle.
///
/// State machine:
///   CHECKING -> MISSING | READY (check finished)
///   MISSING -> DOWNLOADING (download started)
///   DOWNLOADING -> READY (download succeeded)
///   DOWNLOADING -> MISSING (download failed)
///   any -> CHECKING (re-check)
#[derive(Debug, Default)]
pub struct ModelLifecycle {
    status: ModelStatus,
}

impl ModelLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    /// Enter CHECKING. Not allowed while a download is running.
    pub fn begin_check(&mut self) -> Result<(), InvalidModelTransition> {
        if let ModelStatus::Downloading { .. } = self.status {
            return Err(self.invalid("check the model"));
        }
        self.status = ModelStatus::Checking;
        Ok(())
    }

    /// Leave CHECKING. `None` means the backend gave no definitive answer.
    pub fn finish_check(&mut self, exists: Option<bool>) -> Result<(), InvalidModelTransition> {
        if self.status != ModelStatus::Checking {
            return Err(self.invalid("finish the model check"));
        }
        self.status = if exists == Some(true) {
            ModelStatus::Ready
        } else {
            ModelStatus::Missing
        };
        Ok(())
    }

    /// MISSING -> DOWNLOADING at 0%
    pub fn begin_download(&mut self) -> Result<(), InvalidModelTransition> {
        if self.status != ModelStatus::Missing {
            return Err(self.invalid("start the download"));
        }
        self.status = ModelStatus::Downloading { percent: 0 };
        Ok(())
    }

    /// Record a progress event. The percentage never decreases and is capped
    /// at 100. Returns the percentage now in effect, or `None` if no download
    /// is running.
    pub fn record_progress(&mut self, percent: u8) -> Option<u8> {
        match self.status {
            ModelStatus::Downloading { percent: current } => {
                let next = current.max(percent.min(100));
                self.status = ModelStatus::Downloading { percent: next };
                Some(next)
            }
            _ => None,
        }
    }

    /// DOWNLOADING -> READY on success, MISSING on failure
    pub fn finish_download(&mut self, succeeded: bool) -> Result<(), InvalidModelTransition> {
        if self.status.download_percent().is_none() {
            return Err(self.invalid("finish the download"));
        }
        self.status = if succeeded {
            ModelStatus::Ready
        } else {
            ModelStatus::Missing
        };
        Ok(())
    }

    fn invalid(&self, action: &str) -> InvalidModelTransition {
        InvalidModelTransition {
            current: self.status,
            action: action.to_string(),
        }
    }
}
