//! Hand-written port doubles shared by the application tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::model::{DownloadProgress, ModelInfo};
use crate::domain::note::{Note, NoteId, NoteMeta, NoteSummary};

use super::ports::{
    AudioBackend, AudioError, EnhanceError, EnhanceRequest, Enhancer, NoteStore, NoteStoreError,
    PROGRESS_CHANNEL_CAPACITY,
};

#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub id: NoteId,
    pub content: String,
    pub meta: NoteMeta,
}

/// In-memory store that records every write
#[derive(Default)]
pub struct MockNoteStore {
    notes: Mutex<HashMap<NoteId, (String, NoteMeta)>>,
    writes: Mutex<Vec<WriteRecord>>,
    fail_writes: Mutex<bool>,
    write_delay: Mutex<Duration>,
}

impl MockNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a note without recording a write
    pub fn insert(&self, note: Note) {
        self.notes
            .lock()
            .unwrap()
            .insert(note.id, (note.content, note.meta));
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Make every write take `delay` before it lands
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_for(&self, id: &str) -> Vec<WriteRecord> {
        self.writes()
            .into_iter()
            .filter(|w| w.id.as_str() == id)
            .collect()
    }

    pub fn stored(&self, id: &str) -> Option<(String, NoteMeta)> {
        let id: NoteId = id.parse().ok()?;
        self.notes.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl NoteStore for MockNoteStore {
    async fn list(&self) -> Result<Vec<NoteSummary>, NoteStoreError> {
        let mut list: Vec<_> = self
            .notes
            .lock()
            .unwrap()
            .iter()
            .map(|(id, (content, meta))| NoteSummary::from_parts(id.clone(), content, meta))
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn read(&self, id: &NoteId) -> Result<Note, NoteStoreError> {
        let notes = self.notes.lock().unwrap();
        let (content, meta) = notes
            .get(id)
            .cloned()
            .ok_or_else(|| NoteStoreError::NotFound(id.clone()))?;
        Ok(Note {
            id: id.clone(),
            content,
            meta,
        })
    }

    async fn write(
        &self,
        id: &NoteId,
        content: &str,
        meta: &NoteMeta,
    ) -> Result<(), NoteStoreError> {
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_writes.lock().unwrap() {
            return Err(NoteStoreError::WriteFailed {
                id: id.clone(),
                message: "disk full".into(),
            });
        }
        self.notes
            .lock()
            .unwrap()
            .insert(id.clone(), (content.to_string(), meta.clone()));
        self.writes.lock().unwrap().push(WriteRecord {
            id: id.clone(),
            content: content.to_string(),
            meta: meta.clone(),
        });
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> Result<(), NoteStoreError> {
        self.notes.lock().unwrap().remove(id);
        Ok(())
    }
}

/// Enhancer returning a canned response after an optional delay
pub struct MockEnhancer {
    response: Mutex<Result<String, EnhanceError>>,
    delay: Mutex<Duration>,
    requests: Mutex<Vec<EnhanceRequest>>,
}

impl MockEnhancer {
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Ok("enhanced".into())),
            delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_with(&self, text: &str) {
        *self.response.lock().unwrap() = Ok(text.to_string());
    }

    pub fn fail_with(&self, error: EnhanceError) {
        *self.response.lock().unwrap() = Err(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<EnhanceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Enhancer for MockEnhancer {
    async fn enhance(&self, request: &EnhanceRequest) -> Result<String, EnhanceError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().unwrap().clone()
    }
}

/// Scriptable audio backend
pub struct MockAudio {
    model_present: Mutex<bool>,
    fail_check: Mutex<bool>,
    progress: broadcast::Sender<DownloadProgress>,
    download_events: Mutex<Vec<u8>>,
    fail_download: Mutex<bool>,
    hang_download: Mutex<bool>,
    fail_start: Mutex<bool>,
    start_delay: Mutex<Duration>,
    stop_delay: Mutex<Duration>,
    transcript: Mutex<Result<String, AudioError>>,
    capturing: AtomicBool,
    downloads: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    cancels: AtomicUsize,
}

impl MockAudio {
    pub fn new() -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            model_present: Mutex::new(false),
            fail_check: Mutex::new(false),
            progress,
            download_events: Mutex::new(Vec::new()),
            fail_download: Mutex::new(false),
            hang_download: Mutex::new(false),
            fail_start: Mutex::new(false),
            start_delay: Mutex::new(Duration::ZERO),
            stop_delay: Mutex::new(Duration::ZERO),
            transcript: Mutex::new(Ok(String::new())),
            capturing: AtomicBool::new(false),
            downloads: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn set_model_present(&self, present: bool) {
        *self.model_present.lock().unwrap() = present;
    }

    pub fn fail_check(&self, fail: bool) {
        *self.fail_check.lock().unwrap() = fail;
    }

    /// Percentages published, in order, by the next download
    pub fn set_download_events(&self, percents: Vec<u8>) {
        *self.download_events.lock().unwrap() = percents;
    }

    pub fn fail_download(&self, fail: bool) {
        *self.fail_download.lock().unwrap() = fail;
    }

    pub fn hang_download(&self, hang: bool) {
        *self.hang_download.lock().unwrap() = hang;
    }

    pub fn fail_start(&self, fail: bool) {
        *self.fail_start.lock().unwrap() = fail;
    }

    pub fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = delay;
    }

    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = delay;
    }

    pub fn set_transcript(&self, transcript: Result<String, AudioError>) {
        *self.transcript.lock().unwrap() = transcript;
    }

    pub fn progress_subscribers(&self) -> usize {
        self.progress.receiver_count()
    }

    pub fn download_calls(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Whether a capture is running, as a real device would see it
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioBackend for MockAudio {
    async fn check_model(&self) -> Result<ModelInfo, AudioError> {
        if *self.fail_check.lock().unwrap() {
            return Err(AudioError::ModelCheckFailed("backend unavailable".into()));
        }
        Ok(ModelInfo {
            exists: *self.model_present.lock().unwrap(),
            path: PathBuf::from("/models/ggml-base.en.bin"),
        })
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    async fn download_model(&self) -> Result<(), AudioError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let events = self.download_events.lock().unwrap().clone();
        for percent in events {
            let _ = self.progress.send(DownloadProgress {
                downloaded: u64::from(percent),
                total: 100,
                percent,
            });
        }
        if *self.hang_download.lock().unwrap() {
            std::future::pending::<()>().await;
        }
        if *self.fail_download.lock().unwrap() {
            return Err(AudioError::DownloadFailed("connection reset".into()));
        }
        self.set_model_present(true);
        Ok(())
    }

    async fn start_recording(&self) -> Result<(), AudioError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.start_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_start.lock().unwrap() {
            return Err(AudioError::StartFailed("no input device".into()));
        }
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(AudioError::StartFailed("Recording already in progress".into()));
        }
        Ok(())
    }

    async fn stop_and_transcribe(&self) -> Result<String, AudioError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Err(AudioError::NotRecording);
        }
        let delay = *self.stop_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.transcript.lock().unwrap().clone()
    }

    async fn cancel_recording(&self) -> Result<(), AudioError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }
}
