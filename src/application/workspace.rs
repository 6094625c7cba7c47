//! Workspace: the top-level coordinator
//!
//! Owns the action registry, the cached note list, the speech model tracker
//! and the single active note session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::duration::Duration;
use crate::domain::enhance::EnhanceSettings;
use crate::domain::note::{Note, NoteId, NoteSummary};

use super::autosave::{SaveEvent, SaveListener};
use super::model::ModelAcquisition;
use super::ports::{AudioBackend, Enhancer, NoteStore, NoteStoreError};
use super::registry::ActionRegistry;
use super::session::{NoteSession, SessionContext, SessionError};

const SAVE_EVENT_CAPACITY: usize = 32;

/// Workspace errors
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Store(#[from] NoteStoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Tunables for a workspace
#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    pub enhance: EnhanceSettings,
    pub autosave_delay: Duration,
    pub backend_timeout: Duration,
    pub download_timeout: Duration,
}

type NoteList = Mutex<Vec<NoteSummary>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn reload(store: &dyn NoteStore, notes: &NoteList) -> Result<Vec<NoteSummary>, NoteStoreError> {
    let mut listed = store.list().await?;
    listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    *lock(notes) = listed.clone();
    Ok(listed)
}

/// Top-level coordinator for one notes directory.
pub struct Workspace {
    ctx: SessionContext,
    registry: Arc<ActionRegistry>,
    notes: Arc<NoteList>,
    saves: broadcast::Sender<SaveEvent>,
    active: tokio::sync::Mutex<Option<Arc<NoteSession>>>,
}

impl Workspace {
    pub fn new(
        store: Arc<dyn NoteStore>,
        enhancer: Arc<dyn Enhancer>,
        audio: Arc<dyn AudioBackend>,
        settings: WorkspaceSettings,
    ) -> Self {
        let notes: Arc<NoteList> = Arc::new(Mutex::new(Vec::new()));
        let (saves, _) = broadcast::channel(SAVE_EVENT_CAPACITY);
        let listener = Self::save_listener(Arc::clone(&store), Arc::downgrade(&notes), saves.clone());
        let model = Arc::new(ModelAcquisition::new(
            Arc::clone(&audio),
            settings.download_timeout,
        ));

        Self {
            ctx: SessionContext {
                store,
                enhancer,
                audio,
                model,
                settings: settings.enhance,
                autosave_delay: settings.autosave_delay,
                backend_timeout: settings.backend_timeout,
                listener: Some(listener),
            },
            registry: Arc::new(ActionRegistry::new()),
            notes,
            saves,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Republish save events and refresh the list after each successful save
    fn save_listener(
        store: Arc<dyn NoteStore>,
        notes: Weak<NoteList>,
        saves: broadcast::Sender<SaveEvent>,
    ) -> SaveListener {
        Arc::new(move |event: SaveEvent| {
            if matches!(event, SaveEvent::Saved { .. }) {
                let store = Arc::clone(&store);
                let notes = notes.clone();
                tokio::spawn(async move {
                    let Some(notes) = notes.upgrade() else {
                        return;
                    };
                    if let Err(e) = reload(store.as_ref(), &notes).await {
                        log::warn!("Failed to refresh note list: {}", e);
                    }
                });
            }
            // No subscribers is fine
            let _ = saves.send(event);
        })
    }

    pub fn registry(&self) -> Arc<ActionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn model(&self) -> Arc<ModelAcquisition> {
        Arc::clone(&self.ctx.model)
    }

    /// Receive the outcome of every note write
    pub fn subscribe_saves(&self) -> broadcast::Receiver<SaveEvent> {
        self.saves.subscribe()
    }

    /// Cached note list, most recently updated first
    pub fn notes(&self) -> Vec<NoteSummary> {
        lock(&self.notes).clone()
    }

    /// Re-list notes from the store
    pub async fn refresh(&self) -> Result<Vec<NoteSummary>, WorkspaceError> {
        Ok(reload(self.ctx.store.as_ref(), &self.notes).await?)
    }

    /// Create an empty note, persist it and make it the active note
    pub async fn create_note(&self, title: Option<&str>) -> Result<Arc<NoteSession>, WorkspaceError> {
        let now = Utc::now();
        let note = Note::create(NoteId::generate(now), title, now);
        self.ctx.store.write(&note.id, &note.content, &note.meta).await?;
        log::info!("Created note {}", note.id);
        self.refresh().await?;

        let mut active = self.active.lock().await;
        Self::close_active(active.take()).await;
        let session = Arc::new(NoteSession::from_note(
            note,
            self.ctx.clone(),
            Arc::clone(&self.registry),
        ));
        *active = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Make `id` the active note. The previously active note is closed and
    /// its pending edit written first.
    pub async fn select(&self, id: &NoteId) -> Result<Arc<NoteSession>, WorkspaceError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_ref() {
            if &session.id() == id {
                return Ok(Arc::clone(session));
            }
        }

        Self::close_active(active.take()).await;
        let session = Arc::new(
            NoteSession::open(id, self.ctx.clone(), Arc::clone(&self.registry)).await?,
        );
        *active = Some(Arc::clone(&session));
        Ok(session)
    }

    /// The active note session, if any
    pub async fn active(&self) -> Option<Arc<NoteSession>> {
        self.active.lock().await.clone()
    }

    /// Delete a note. A pending edit of that note is discarded, not written,
    /// and a write already in flight lands before the files are removed.
    pub async fn delete(&self, id: &NoteId) -> Result<(), WorkspaceError> {
        {
            let mut active = self.active.lock().await;
            if active.as_ref().is_some_and(|session| &session.id() == id) {
                if let Some(session) = active.take() {
                    session.discard().await;
                }
            }
        }

        self.ctx.store.delete(id).await?;
        log::info!("Deleted note {}", id);
        self.refresh().await?;
        Ok(())
    }

    /// Close the active note, writing any pending edit
    pub async fn close(&self) -> Result<(), WorkspaceError> {
        let session = self.active.lock().await.take();
        if let Some(session) = session {
            session.close().await?;
        }
        Ok(())
    }

    async fn close_active(session: Option<Arc<NoteSession>>) {
        if let Some(session) = session {
            // Failures already reached the save listener
            if let Err(e) = session.close().await {
                log::warn!("Closing note {} lost its last edit: {}", session.id(), e);
            }
        }
    }
}
