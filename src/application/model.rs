//! Speech model acquisition
//!
//! Drives `ModelLifecycle` against the audio backend and publishes every
//! status change on a watch channel, which is what recording start is gated
//! on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};

use crate::domain::duration::Duration;
use crate::domain::model::{DownloadProgress, InvalidModelTransition, ModelLifecycle, ModelStatus};

use super::ports::{AudioBackend, AudioError};

/// Progress callback for `download`
pub type ProgressCallback = Box<dyn FnMut(DownloadProgress) + Send>;

/// Model acquisition errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidModelTransition),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Model download timed out after {0}")]
    Timeout(Duration),
}

/// Tracks and drives availability of the local speech model.
pub struct ModelAcquisition {
    audio: Arc<dyn AudioBackend>,
    lifecycle: Mutex<ModelLifecycle>,
    status_tx: watch::Sender<ModelStatus>,
    download_timeout: Duration,
}

impl ModelAcquisition {
    /// Create a tracker in the CHECKING state. Call `check` to resolve it.
    pub fn new(audio: Arc<dyn AudioBackend>, download_timeout: Duration) -> Self {
        let (status_tx, _) = watch::channel(ModelStatus::Checking);
        Self {
            audio,
            lifecycle: Mutex::new(ModelLifecycle::new()),
            status_tx,
            download_timeout,
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, ModelLifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ModelStatus {
        self.lifecycle().status()
    }

    pub fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ModelStatus> {
        self.status_tx.subscribe()
    }

    /// Apply a transition and publish the resulting status
    fn transition<F>(&self, apply: F) -> Result<ModelStatus, InvalidModelTransition>
    where
        F: FnOnce(&mut ModelLifecycle) -> Result<(), InvalidModelTransition>,
    {
        let mut lifecycle = self.lifecycle();
        apply(&mut lifecycle)?;
        let status = lifecycle.status();
        self.status_tx.send_replace(status);
        Ok(status)
    }

    /// Ask the backend whether the model is present.
    ///
    /// A backend error counts as missing. While a download is running the
    /// check is skipped and the current status returned.
    pub async fn check(&self) -> ModelStatus {
        if let Err(e) = self.transition(ModelLifecycle::begin_check) {
            log::debug!("Skipping model check: {}", e);
            return self.status();
        }

        let exists = match self.audio.check_model().await {
            Ok(info) => {
                log::debug!("Model at {} exists: {}", info.path.display(), info.exists);
                Some(info.exists)
            }
            Err(e) => {
                log::warn!("Model check failed, treating as missing: {}", e);
                None
            }
        };

        match self.transition(|lifecycle| lifecycle.finish_check(exists)) {
            Ok(status) => {
                log::info!("Speech model is {}", status);
                status
            }
            // A concurrent check already resolved it
            Err(_) => self.status(),
        }
    }

    /// Download the model. Only allowed while the model is missing.
    ///
    /// The progress subscription is opened before the download starts and
    /// dropped once it settles, after forwarding anything still queued.
    /// Percentages passed to `on_progress` never decrease.
    pub async fn download(
        &self,
        mut on_progress: Option<ProgressCallback>,
    ) -> Result<(), ModelError> {
        let mut events = self.audio.subscribe_progress();
        self.transition(ModelLifecycle::begin_download)?;
        log::info!("Downloading speech model");

        let outcome = tokio::time::timeout(
            self.download_timeout.as_std(),
            self.drive_download(&mut events, &mut on_progress),
        )
        .await;
        drop(events);

        let result = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ModelError::Audio(e)),
            Err(_) => Err(ModelError::Timeout(self.download_timeout)),
        };

        let succeeded = result.is_ok();
        self.transition(|lifecycle| lifecycle.finish_download(succeeded))?;
        match &result {
            Ok(()) => log::info!("Speech model downloaded"),
            Err(e) => log::warn!("Speech model download failed: {}", e),
        }
        result
    }

    async fn drive_download(
        &self,
        events: &mut broadcast::Receiver<DownloadProgress>,
        on_progress: &mut Option<ProgressCallback>,
    ) -> Result<(), AudioError> {
        let download = self.audio.download_model();
        tokio::pin!(download);

        let result = loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(progress) => self.forward(progress, on_progress),
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("Progress subscriber lagged by {} events", skipped);
                    }
                    Err(RecvError::Closed) => break download.await,
                },
                result = &mut download => break result,
            }
        };

        // Events sent just before the call settled
        loop {
            match events.try_recv() {
                Ok(progress) => self.forward(progress, on_progress),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        result
    }

    fn forward(&self, progress: DownloadProgress, on_progress: &mut Option<ProgressCallback>) {
        let percent = {
            let mut lifecycle = self.lifecycle();
            let Some(percent) = lifecycle.record_progress(progress.percent) else {
                return;
            };
            self.status_tx.send_replace(lifecycle.status());
            percent
        };
        if let Some(callback) = on_progress.as_mut() {
            callback(DownloadProgress { percent, ..progress });
        }
    }
}
