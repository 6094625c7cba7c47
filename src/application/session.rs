//! Session coordinator for the open note
//!
//! Owns the canonical in-memory snapshot of one note. Edits schedule a
//! debounced save; enhancement and transcription results are applied to the
//! snapshot as it is when they complete, then written immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::domain::duration::Duration;
use crate::domain::enhance::{EnhanceMode, EnhanceSettings};
use crate::domain::model::ModelStatus;
use crate::domain::note::{Note, NoteId};
use crate::domain::recording::{InvalidStateTransition, RecordingSession, RecordingState};

use super::autosave::{AutosaveScheduler, SaveListener};
use super::model::ModelAcquisition;
use super::ports::{
    AudioBackend, AudioError, EnhanceError, EnhanceRequest, Enhancer, NoteStore, NoteStoreError,
};
use super::registry::{
    ActionHandler, ActionKind, ActionPayload, ActionRegistry, RecordAction, Registration,
};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("An enhancement is already running for this note")]
    EnhanceInFlight,

    #[error("Speech model is not ready ({0})")]
    ModelNotReady(ModelStatus),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),

    #[error(transparent)]
    Enhance(#[from] EnhanceError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Store(#[from] NoteStoreError),

    #[error("{operation} timed out after {budget}")]
    Timeout {
        operation: &'static str,
        budget: Duration,
    },

    #[error("Note session is closed")]
    Closed,
}

/// Collaborators and settings shared by every session of a workspace
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn NoteStore>,
    pub enhancer: Arc<dyn Enhancer>,
    pub audio: Arc<dyn AudioBackend>,
    pub model: Arc<ModelAcquisition>,
    pub settings: EnhanceSettings,
    pub autosave_delay: Duration,
    pub backend_timeout: Duration,
    pub listener: Option<SaveListener>,
}

/// Result of `enhance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhanceOutcome {
    /// Content was empty; nothing was sent
    Skipped,
    /// Content was replaced and written
    Applied,
}

/// Separator between existing content and an appended transcript
const TRANSCRIPT_SEPARATOR: &str = "\n\n";

/// Clears the enhancement flag when the enhancement ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    ctx: SessionContext,
    note: Mutex<Note>,
    recording: Mutex<RecordingSession>,
    start_task: Mutex<Option<JoinHandle<Result<(), AudioError>>>>,
    enhancing: AtomicBool,
    closed: AtomicBool,
    last_error: Mutex<Option<String>>,
    autosave: AutosaveScheduler,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn record_error(&self, error: &SessionError) {
        log::warn!("Note {}: {}", self.id(), error);
        *lock(&self.last_error) = Some(error.to_string());
    }

    fn id(&self) -> NoteId {
        lock(&self.note).id.clone()
    }

    /// Mutate the snapshot and schedule a debounced save of the result
    fn edit<F: FnOnce(&mut Note)>(&self, apply: F) -> Result<(), SessionError> {
        self.ensure_open()?;
        let (content, meta) = {
            let mut note = lock(&self.note);
            apply(&mut note);
            (note.content.clone(), note.meta.clone())
        };
        self.autosave.schedule(content, meta);
        Ok(())
    }

    /// Mutate the snapshot and write the result immediately
    async fn commit<F: FnOnce(&mut Note)>(&self, apply: F) -> Result<(), SessionError> {
        let (content, meta) = {
            let mut note = lock(&self.note);
            apply(&mut note);
            (note.content.clone(), note.meta.clone())
        };
        if let Err(e) = self.autosave.write_now(content, meta).await {
            let error = SessionError::Store(e);
            self.record_error(&error);
            return Err(error);
        }
        Ok(())
    }

    async fn enhance(&self, mode: EnhanceMode) -> Result<EnhanceOutcome, SessionError> {
        self.ensure_open()?;
        if self.enhancing.swap(true, Ordering::AcqRel) {
            return Err(SessionError::EnhanceInFlight);
        }
        let _in_flight = InFlight(&self.enhancing);

        let content = lock(&self.note).content.clone();
        if content.trim().is_empty() {
            return Ok(EnhanceOutcome::Skipped);
        }

        let settings = &self.ctx.settings;
        let request = EnhanceRequest {
            content,
            mode,
            provider: settings.provider,
            credentials: settings.credentials.clone(),
            model: settings.model.clone(),
        };
        log::info!("Enhancing note {} ({})", self.id(), mode.label());

        let budget = self.ctx.backend_timeout;
        let text = match tokio::time::timeout(budget.as_std(), self.ctx.enhancer.enhance(&request))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                let error = SessionError::Enhance(e);
                self.record_error(&error);
                return Err(error);
            }
            Err(_) => {
                let error = SessionError::Timeout {
                    operation: "Enhancement",
                    budget,
                };
                self.record_error(&error);
                return Err(error);
            }
        };

        if self.closed.load(Ordering::Acquire) {
            log::info!("Note {} closed during enhancement; result dropped", self.id());
            return Err(SessionError::Closed);
        }
        self.commit(|note| note.content = text).await?;
        Ok(EnhanceOutcome::Applied)
    }

    fn start_recording(self: &Arc<Self>) -> Result<(), SessionError> {
        self.ensure_open()?;
        let status = self.ctx.model.status();
        if !status.is_ready() {
            return Err(SessionError::ModelNotReady(status));
        }
        lock(&self.recording).start()?;
        log::info!("Recording note {}", self.id());

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = inner.ctx.audio.start_recording().await;
            if result.is_ok() && inner.closed.load(Ordering::Acquire) {
                // Closed before the start was tracked
                inner.cancel_capture().await;
            }
            if let Err(e) = &result {
                let mut recording = lock(&inner.recording);
                // After a stop, the stop reports the failure itself
                if recording.state() == RecordingState::Recording {
                    recording.abort().ok();
                    drop(recording);
                    inner.record_error(&SessionError::Audio(e.clone()));
                }
            }
            result
        });
        *lock(&self.start_task) = Some(task);
        Ok(())
    }

    async fn stop_recording(&self) -> Result<Option<String>, SessionError> {
        self.ensure_open()?;
        lock(&self.recording).stop()?;

        let start = lock(&self.start_task).take();
        if let Some(start) = start {
            let started = match start.await {
                Ok(result) => result,
                Err(e) => Err(AudioError::StartFailed(e.to_string())),
            };
            if let Err(e) = started {
                return Err(self.fail_recording(SessionError::Audio(e)));
            }
        }

        let budget = self.ctx.backend_timeout;
        let transcript =
            match tokio::time::timeout(budget.as_std(), self.ctx.audio.stop_and_transcribe()).await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => return Err(self.fail_recording(SessionError::Audio(e))),
                Err(_) => {
                    return Err(self.fail_recording(SessionError::Timeout {
                        operation: "Transcription",
                        budget,
                    }))
                }
            };
        lock(&self.recording).complete()?;

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            log::info!("Empty transcript for note {}", self.id());
            return Ok(None);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }

        let appended = transcript.clone();
        self.commit(move |note| append_block(&mut note.content, &appended))
            .await?;
        Ok(Some(transcript))
    }

    async fn cancel_capture(&self) {
        if let Err(e) = self.ctx.audio.cancel_recording().await {
            log::warn!("Failed to cancel recording of note {}: {}", self.id(), e);
        }
    }

    fn fail_recording(&self, error: SessionError) -> SessionError {
        lock(&self.recording).abort().ok();
        self.record_error(&error);
        error
    }
}

/// Append `text` to `content`, separated by a blank line when needed
fn append_block(content: &mut String, text: &str) {
    if !content.is_empty() {
        content.push_str(TRANSCRIPT_SEPARATOR);
    }
    content.push_str(text);
}

/// Routes enhance actions to the session
struct EnhanceHandler(Weak<Inner>);

#[async_trait]
impl ActionHandler for EnhanceHandler {
    async fn handle(&self, payload: ActionPayload) -> Result<(), SessionError> {
        let inner = self.0.upgrade().ok_or(SessionError::Closed)?;
        match payload {
            ActionPayload::Enhance(mode) => inner.enhance(mode).await.map(|_| ()),
            ActionPayload::Record(_) => Ok(()),
        }
    }
}

/// Routes record start/stop actions to the session
struct RecordHandler(Weak<Inner>);

#[async_trait]
impl ActionHandler for RecordHandler {
    async fn handle(&self, payload: ActionPayload) -> Result<(), SessionError> {
        let inner = self.0.upgrade().ok_or(SessionError::Closed)?;
        match payload {
            ActionPayload::Record(RecordAction::Start) => inner.start_recording(),
            ActionPayload::Record(RecordAction::Stop) => inner.stop_recording().await.map(|_| ()),
            ActionPayload::Enhance(_) => Ok(()),
        }
    }
}

/// The open note and everything that mutates it.
pub struct NoteSession {
    inner: Arc<Inner>,
    registry: Arc<ActionRegistry>,
    registrations: Mutex<Vec<Registration>>,
}

impl NoteSession {
    /// Read a note from the store and open it
    pub async fn open(
        id: &NoteId,
        ctx: SessionContext,
        registry: Arc<ActionRegistry>,
    ) -> Result<Self, SessionError> {
        let note = ctx.store.read(id).await?;
        Ok(Self::from_note(note, ctx, registry))
    }

    /// Open a note already in memory and register its action handlers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_note(note: Note, ctx: SessionContext, registry: Arc<ActionRegistry>) -> Self {
        let autosave = AutosaveScheduler::new(
            note.id.clone(),
            Arc::clone(&ctx.store),
            ctx.autosave_delay,
            note.meta.updated_at,
            ctx.listener.clone(),
        );
        let id = note.id.clone();
        let inner = Arc::new(Inner {
            ctx,
            note: Mutex::new(note),
            recording: Mutex::new(RecordingSession::new()),
            start_task: Mutex::new(None),
            enhancing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_error: Mutex::new(None),
            autosave,
        });

        let registrations = vec![
            registry.register(
                &id,
                ActionKind::Enhance,
                Arc::new(EnhanceHandler(Arc::downgrade(&inner))),
            ),
            registry.register(
                &id,
                ActionKind::Record,
                Arc::new(RecordHandler(Arc::downgrade(&inner))),
            ),
        ];
        log::debug!("Opened note {}", id);

        Self {
            inner,
            registry,
            registrations: Mutex::new(registrations),
        }
    }

    pub fn id(&self) -> NoteId {
        self.inner.id()
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Note {
        lock(&self.inner.note).clone()
    }

    pub fn set_content(&self, content: impl Into<String>) -> Result<(), SessionError> {
        let content = content.into();
        self.inner.edit(|note| note.content = content)
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), SessionError> {
        let title = title.into();
        self.inner.edit(|note| note.meta.title = title)
    }

    /// Append a block of text after the current content
    pub fn append(&self, text: &str) -> Result<(), SessionError> {
        self.inner.edit(|note| append_block(&mut note.content, text))
    }

    pub fn add_participant(&self, name: &str) -> Result<(), SessionError> {
        self.inner.edit(|note| {
            note.meta.add_participant(name);
        })
    }

    pub fn add_tag(&self, tag: &str) -> Result<(), SessionError> {
        self.inner.edit(|note| {
            note.meta.add_tag(tag);
        })
    }

    /// Rewrite the content with the enhancer.
    ///
    /// Empty content is skipped without calling the backend. On success the
    /// result replaces whatever the content is at completion time and is
    /// written immediately.
    pub async fn enhance(&self, mode: EnhanceMode) -> Result<EnhanceOutcome, SessionError> {
        self.inner.enhance(mode).await
    }

    pub fn is_enhancing(&self) -> bool {
        self.inner.enhancing.load(Ordering::Acquire)
    }

    /// Start capturing audio. Returns once the state is RECORDING; the
    /// backend start runs as a tracked task.
    pub fn start_recording(&self) -> Result<(), SessionError> {
        self.inner.start_recording()
    }

    /// Stop capturing and append the transcript. Returns the transcript, or
    /// `None` if nothing was said.
    pub async fn stop_recording(&self) -> Result<Option<String>, SessionError> {
        self.inner.stop_recording().await
    }

    pub fn recording_state(&self) -> RecordingState {
        lock(&self.inner.recording).state()
    }

    /// Message of the most recent failure, if not cleared
    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.last_error).clone()
    }

    pub fn clear_error(&self) {
        lock(&self.inner.last_error).take();
    }

    /// Whether an edit is waiting to be saved
    pub fn has_unsaved_edits(&self) -> bool {
        self.inner.autosave.has_pending()
    }

    /// Write any pending edit now
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.inner.autosave.flush().await?;
        Ok(())
    }

    /// Mark the session closed and deregister its handlers. A capture still
    /// running is cancelled by the returned task.
    fn shut_down(&self) -> Option<JoinHandle<()>> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        log::debug!("Closing note {}", self.inner.id());
        for registration in lock(&self.registrations).drain(..) {
            self.registry.deregister(registration);
        }

        let mut recording = lock(&self.inner.recording);
        let capturing = recording.state() == RecordingState::Recording;
        if !recording.is_idle() {
            log::warn!("Closing note {} while {}", self.inner.id(), recording.state());
            recording.abort().ok();
        }
        drop(recording);
        // A stop already in flight owns the capture
        if !capturing {
            return None;
        }

        let start = lock(&self.inner.start_task).take();
        let inner = Arc::clone(&self.inner);
        let cancel = async move {
            if let Some(start) = start {
                if !matches!(start.await, Ok(Ok(()))) {
                    return;
                }
            }
            inner.cancel_capture().await;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(cancel)),
            Err(_) => {
                log::warn!("No runtime to cancel the recording of note {}", self.inner.id());
                None
            }
        }
    }

    async fn finish_shut_down(&self) {
        if let Some(cancel) = self.shut_down() {
            if let Err(e) = cancel.await {
                log::warn!("Recording cancellation task failed: {}", e);
            }
        }
    }

    /// Deregister handlers, cancel a running capture and write any pending
    /// edit
    pub async fn close(&self) -> Result<(), SessionError> {
        self.finish_shut_down().await;
        self.flush().await
    }

    /// Deregister handlers, cancel a running capture and discard any pending
    /// edit. Returns once no write of this note can reach the store anymore.
    pub async fn discard(&self) {
        self.finish_shut_down().await;
        self.inner.autosave.retire().await;
    }
}

impl Drop for NoteSession {
    fn drop(&mut self) {
        self.shut_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{MockAudio, MockEnhancer, MockNoteStore};
    use crate::domain::enhance::AiProvider;
    use std::time::Duration as StdDuration;

    struct Fixture {
        store: Arc<MockNoteStore>,
        enhancer: Arc<MockEnhancer>,
        audio: Arc<MockAudio>,
        registry: Arc<ActionRegistry>,
        ctx: SessionContext,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MockNoteStore::new());
        let enhancer = Arc::new(MockEnhancer::new());
        let audio = Arc::new(MockAudio::new());
        audio.set_model_present(true);
        let model = Arc::new(ModelAcquisition::new(
            Arc::clone(&audio) as Arc<dyn AudioBackend>,
            Duration::from_secs(60),
        ));
        model.check().await;

        let ctx = SessionContext {
            store: Arc::clone(&store) as Arc<dyn NoteStore>,
            enhancer: Arc::clone(&enhancer) as Arc<dyn Enhancer>,
            audio: Arc::clone(&audio) as Arc<dyn AudioBackend>,
            model,
            settings: EnhanceSettings {
                provider: AiProvider::Local,
                credentials: None,
                model: None,
            },
            autosave_delay: Duration::from_millis(800),
            backend_timeout: Duration::from_secs(10),
            listener: None,
        };
        Fixture {
            store,
            enhancer,
            audio,
            registry: Arc::new(ActionRegistry::new()),
            ctx,
        }
    }

    fn open(f: &Fixture, content: &str) -> NoteSession {
        let mut note = Note::create("n1".parse().unwrap(), Some("Sync"), Utc::now());
        note.content = content.to_string();
        NoteSession::from_note(note, f.ctx.clone(), Arc::clone(&f.registry))
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(StdDuration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn edits_are_debounced_into_one_write() {
        let f = fixture().await;
        let session = open(&f, "");

        session.set_content("a").unwrap();
        session.set_content("ab").unwrap();
        session.set_title("Weekly").unwrap();
        advance(1000).await;

        let writes = f.store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].content, "ab");
        assert_eq!(writes[0].meta.title, "Weekly");
    }

    #[tokio::test(start_paused = true)]
    async fn enhance_on_blank_content_is_a_noop() {
        let f = fixture().await;
        let session = open(&f, "  \n ");

        let outcome = session.enhance(EnhanceMode::Polish).await.unwrap();
        assert_eq!(outcome, EnhanceOutcome::Skipped);
        assert_eq!(f.enhancer.calls(), 0);
        assert_eq!(session.snapshot().content, "  \n ");
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn enhance_replaces_content_and_writes_once() {
        let f = fixture().await;
        f.enhancer.respond_with("T");
        let session = open(&f, "raw notes");

        let outcome = session.enhance(EnhanceMode::Summarize).await.unwrap();
        assert_eq!(outcome, EnhanceOutcome::Applied);
        assert_eq!(session.snapshot().content, "T");

        let writes = f.store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].content, "T");
        assert_eq!(f.enhancer.requests()[0].mode, EnhanceMode::Summarize);
    }

    #[tokio::test(start_paused = true)]
    async fn enhance_failure_leaves_content_and_surfaces_error() {
        let f = fixture().await;
        f.enhancer.fail_with(EnhanceError::RateLimited);
        let session = open(&f, "raw notes");

        let err = session.enhance(EnhanceMode::Polish).await.unwrap_err();
        assert!(matches!(err, SessionError::Enhance(EnhanceError::RateLimited)));
        assert_eq!(session.snapshot().content, "raw notes");
        assert!(session.last_error().unwrap().contains("Rate limit"));
        assert!(f.store.writes().is_empty());

        session.clear_error();
        assert!(session.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn enhance_sends_content_current_at_call_time() {
        let f = fixture().await;
        f.enhancer.respond_with("done");
        let session = open(&f, "old");
        session.set_content("new").unwrap();

        session.enhance(EnhanceMode::Polish).await.unwrap();
        assert_eq!(f.enhancer.requests()[0].content, "new");
    }

    #[tokio::test(start_paused = true)]
    async fn edit_during_enhance_is_not_resurrected_by_autosave() {
        let f = fixture().await;
        f.enhancer.respond_with("enhanced");
        f.enhancer.set_delay(StdDuration::from_millis(500));
        let session = Arc::new(open(&f, "draft"));

        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.enhance(EnhanceMode::Polish).await })
        };
        advance(100).await;
        session.set_title("Edited mid-flight").unwrap();
        running.await.unwrap().unwrap();
        advance(2000).await;

        // The immediate write carries the mid-flight title; the superseded
        // debounced snapshot is never written
        let writes = f.store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].content, "enhanced");
        assert_eq!(writes[0].meta.title, "Edited mid-flight");
    }

    #[tokio::test(start_paused = true)]
    async fn second_enhance_while_in_flight_is_rejected() {
        let f = fixture().await;
        f.enhancer.respond_with("x");
        f.enhancer.set_delay(StdDuration::from_millis(500));
        let session = Arc::new(open(&f, "draft"));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.enhance(EnhanceMode::Polish).await })
        };
        advance(10).await;
        assert!(session.is_enhancing());
        assert!(matches!(
            session.enhance(EnhanceMode::Polish).await,
            Err(SessionError::EnhanceInFlight)
        ));

        first.await.unwrap().unwrap();
        assert!(!session.is_enhancing());
        assert_eq!(f.enhancer.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_enhancer_times_out() {
        let f = fixture().await;
        f.enhancer.respond_with("never");
        f.enhancer.set_delay(StdDuration::from_secs(3600));
        let session = open(&f, "draft");

        let err = session.enhance(EnhanceMode::Polish).await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
        assert!(!session.is_enhancing());
        assert_eq!(session.snapshot().content, "draft");
    }

    #[tokio::test(start_paused = true)]
    async fn record_appends_transcript_with_blank_line() {
        let f = fixture().await;
        f.audio.set_transcript(Ok("Hello".into()));
        let session = open(&f, "Notes:");

        session.start_recording().unwrap();
        assert_eq!(session.recording_state(), RecordingState::Recording);
        let transcript = session.stop_recording().await.unwrap();

        assert_eq!(transcript.as_deref(), Some("Hello"));
        assert_eq!(session.snapshot().content, "Notes:\n\nHello");
        assert_eq!(session.recording_state(), RecordingState::Idle);
        let writes = f.store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].content, "Notes:\n\nHello");
    }

    #[tokio::test(start_paused = true)]
    async fn record_into_empty_note_has_no_separator() {
        let f = fixture().await;
        f.audio.set_transcript(Ok("  Hello  ".into()));
        let session = open(&f, "");

        session.start_recording().unwrap();
        session.stop_recording().await.unwrap();
        assert_eq!(session.snapshot().content, "Hello");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failure_leaves_content_and_returns_to_idle() {
        let f = fixture().await;
        f.audio
            .set_transcript(Err(AudioError::TranscriptionFailed("boom".into())));
        let session = open(&f, "Notes:");

        session.start_recording().unwrap();
        let err = session.stop_recording().await.unwrap_err();

        assert!(matches!(err, SessionError::Audio(_)));
        assert_eq!(session.snapshot().content, "Notes:");
        assert_eq!(session.recording_state(), RecordingState::Idle);
        assert!(session.last_error().unwrap().contains("boom"));
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_transcript_changes_nothing() {
        let f = fixture().await;
        f.audio.set_transcript(Ok(" \n".into()));
        let session = open(&f, "Notes:");

        session.start_recording().unwrap();
        assert_eq!(session.stop_recording().await.unwrap(), None);
        assert_eq!(session.snapshot().content, "Notes:");
        assert!(f.store.writes().is_empty());
        assert_eq!(session.recording_state(), RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn recording_is_gated_on_model_ready() {
        let f = fixture().await;
        f.audio.set_model_present(false);
        f.ctx.model.check().await;
        let session = open(&f, "");

        assert!(matches!(
            session.start_recording(),
            Err(SessionError::ModelNotReady(ModelStatus::Missing))
        ));
        assert_eq!(session.recording_state(), RecordingState::Idle);
        assert_eq!(f.audio.start_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_is_surfaced_and_state_reverts() {
        let f = fixture().await;
        f.audio.fail_start(true);
        let session = open(&f, "");

        session.start_recording().unwrap();
        assert_eq!(session.recording_state(), RecordingState::Recording);
        advance(10).await;

        assert_eq!(session.recording_state(), RecordingState::Idle);
        assert!(session.last_error().unwrap().contains("Failed to start recording"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_slow_start_and_reports_its_failure() {
        let f = fixture().await;
        f.audio.fail_start(true);
        f.audio.set_start_delay(StdDuration::from_millis(300));
        let session = open(&f, "Notes:");

        session.start_recording().unwrap();
        let err = session.stop_recording().await.unwrap_err();

        assert!(matches!(err, SessionError::Audio(AudioError::StartFailed(_))));
        assert_eq!(session.recording_state(), RecordingState::Idle);
        assert_eq!(f.audio.stop_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_transcription_times_out_to_idle() {
        let f = fixture().await;
        f.audio.set_transcript(Ok("late".into()));
        f.audio.set_stop_delay(StdDuration::from_secs(3600));
        let session = open(&f, "Notes:");

        session.start_recording().unwrap();
        let err = session.stop_recording().await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
        assert_eq!(session.recording_state(), RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn enhance_and_transcript_overlap_keep_both_effects() {
        let f = fixture().await;
        f.enhancer.respond_with("Polished");
        f.enhancer.set_delay(StdDuration::from_millis(500));
        f.audio.set_transcript(Ok("Hello".into()));
        f.audio.set_stop_delay(StdDuration::from_millis(1000));
        let session = Arc::new(open(&f, "rough"));

        session.start_recording().unwrap();
        let stopping = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.stop_recording().await })
        };
        advance(10).await;
        session.enhance(EnhanceMode::Polish).await.unwrap();
        stopping.await.unwrap().unwrap();

        let writes = f.store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].content, "Polished");
        assert_eq!(writes[1].content, "Polished\n\nHello");
        assert_eq!(session.snapshot().content, "Polished\n\nHello");
    }

    #[tokio::test(start_paused = true)]
    async fn actions_route_through_the_registry() {
        let f = fixture().await;
        f.enhancer.respond_with("Routed");
        f.audio.set_transcript(Ok("Spoken".into()));
        let session = open(&f, "text");
        let id = session.id();

        f.registry
            .invoke(&id, ActionPayload::Enhance(EnhanceMode::Decisions))
            .await
            .into_result()
            .unwrap();
        f.registry
            .invoke(&id, ActionPayload::Record(RecordAction::Start))
            .await
            .into_result()
            .unwrap();
        f.registry
            .invoke(&id, ActionPayload::Record(RecordAction::Stop))
            .await
            .into_result()
            .unwrap();

        assert_eq!(session.snapshot().content, "Routed\n\nSpoken");
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_and_deregisters() {
        let f = fixture().await;
        let session = open(&f, "");
        let id = session.id();
        session.set_content("last words").unwrap();

        session.close().await.unwrap();
        assert_eq!(f.store.writes().len(), 1);
        assert_eq!(f.store.writes()[0].content, "last words");
        assert!(!f.registry.is_registered(&id, ActionKind::Enhance));
        assert!(!f.registry.is_registered(&id, ActionKind::Record));
        assert!(matches!(session.set_content("x"), Err(SessionError::Closed)));

        advance(2000).await;
        assert_eq!(f.store.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_session_does_not_remove_newer_handlers() {
        let f = fixture().await;
        let old = open(&f, "");
        let new = open(&f, "");
        let id = new.id();

        old.close().await.unwrap();
        assert!(f.registry.is_registered(&id, ActionKind::Enhance));
        drop(new);
        assert!(!f.registry.is_registered(&id, ActionKind::Enhance));
    }

    #[tokio::test(start_paused = true)]
    async fn discard_drops_pending_edit() {
        let f = fixture().await;
        let session = open(&f, "");
        session.set_content("unsaved").unwrap();

        session.discard().await;
        advance(2000).await;
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn discard_refuses_enhancement_result_arriving_later() {
        let f = fixture().await;
        f.enhancer.respond_with("enhanced");
        f.enhancer.set_delay(StdDuration::from_millis(500));
        let session = Arc::new(open(&f, "draft"));

        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.enhance(EnhanceMode::Polish).await })
        };
        advance(100).await;
        session.discard().await;

        assert!(matches!(running.await.unwrap(), Err(SessionError::Closed)));
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_while_recording_releases_the_microphone() {
        let f = fixture().await;
        let first = open(&f, "");
        first.start_recording().unwrap();
        advance(10).await;
        assert!(f.audio.is_capturing());

        first.close().await.unwrap();
        assert!(!f.audio.is_capturing());
        assert_eq!(f.audio.cancel_calls(), 1);

        let second = open(&f, "");
        second.start_recording().unwrap();
        advance(10).await;
        assert_eq!(second.recording_state(), RecordingState::Recording);
        assert!(second.last_error().is_none());
        assert!(f.audio.is_capturing());
    }

    #[tokio::test(start_paused = true)]
    async fn discard_during_slow_start_cancels_once_started() {
        let f = fixture().await;
        f.audio.set_start_delay(StdDuration::from_millis(300));
        let session = open(&f, "");

        session.start_recording().unwrap();
        session.discard().await;

        assert!(!f.audio.is_capturing());
        assert_eq!(f.audio.stop_calls(), 0);
        assert_eq!(session.recording_state(), RecordingState::Idle);
    }
}
