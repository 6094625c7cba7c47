//! Action registry
//!
//! Routes control-surface actions (enhance, record start/stop) to the handler
//! the currently open note registered for them. The registry is owned by the
//! workspace and handed to sessions and control surfaces as an `Arc`, so its
//! lifetime is the lifetime of the workspace rather than the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::enhance::EnhanceMode;
use crate::domain::note::NoteId;

use super::session::SessionError;

/// Kinds of action a note can register a handler for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Enhance,
    Record,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enhance => write!(f, "enhance"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// Record toggle direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Start,
    Stop,
}

/// Payload delivered to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPayload {
    Enhance(EnhanceMode),
    Record(RecordAction),
}

impl ActionPayload {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Enhance(_) => ActionKind::Enhance,
            Self::Record(_) => ActionKind::Record,
        }
    }
}

/// A registered action handler
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, payload: ActionPayload) -> Result<(), SessionError>;
}

/// Token returned by `register`, needed to deregister.
///
/// Deregistering only removes the entry if it still belongs to this token,
/// so a late deregistration from a closed session cannot remove the handler
/// a newer session registered for the same note.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the token leaves the handler registered"]
pub struct Registration {
    note: NoteId,
    kind: ActionKind,
    handler_id: u64,
}

impl Registration {
    pub fn note(&self) -> &NoteId {
        &self.note
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }
}

/// Outcome of `invoke`
#[derive(Debug)]
pub enum Dispatch {
    /// A handler ran and returned this result
    Handled(Result<(), SessionError>),
    /// Nothing was registered for the key
    NoHandler,
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    /// The handler's result; an unhandled dispatch counts as success
    pub fn into_result(self) -> Result<(), SessionError> {
        match self {
            Self::Handled(result) => result,
            Self::NoHandler => Ok(()),
        }
    }
}

struct Entry {
    id: u64,
    handler: Arc<dyn ActionHandler>,
}

/// Keyed table of at most one handler per (note, action kind)
pub struct ActionRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<(NoteId, ActionKind), Entry>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<(NoteId, ActionKind), Entry>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `(note, kind)`, silently replacing any previous
    /// handler for that key.
    pub fn register(
        &self,
        note: &NoteId,
        kind: ActionKind,
        handler: Arc<dyn ActionHandler>,
    ) -> Registration {
        let handler_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .table()
            .insert((note.clone(), kind), Entry { id: handler_id, handler })
            .is_some();
        if replaced {
            log::debug!("Replaced {} handler for note {}", kind, note);
        }
        Registration {
            note: note.clone(),
            kind,
            handler_id,
        }
    }

    /// Remove the entry the token registered, if it is still current.
    /// Returns whether an entry was removed.
    pub fn deregister(&self, registration: Registration) -> bool {
        let mut table = self.table();
        let key = (registration.note, registration.kind);
        match table.get(&key) {
            Some(entry) if entry.id == registration.handler_id => {
                table.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Whether a handler is registered for `(note, kind)`
    pub fn is_registered(&self, note: &NoteId, kind: ActionKind) -> bool {
        self.table().contains_key(&(note.clone(), kind))
    }

    /// Forward `payload` to the handler registered for `note`.
    pub async fn invoke(&self, note: &NoteId, payload: ActionPayload) -> Dispatch {
        // Clone out so the table is not locked across the await
        let handler = self
            .table()
            .get(&(note.clone(), payload.kind()))
            .map(|entry| Arc::clone(&entry.handler));

        match handler {
            Some(handler) => Dispatch::Handled(handler.handle(payload).await),
            None => {
                log::debug!("No {} handler for note {}", payload.kind(), note);
                Dispatch::NoHandler
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records every payload it receives under a label
    struct Recorder {
        label: &'static str,
        calls: Arc<StdMutex<Vec<(&'static str, ActionPayload)>>>,
    }

    #[async_trait]
    impl ActionHandler for Recorder {
        async fn handle(&self, payload: ActionPayload) -> Result<(), SessionError> {
            self.calls.lock().unwrap().push((self.label, payload));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl ActionHandler for Failing {
        async fn handle(&self, _payload: ActionPayload) -> Result<(), SessionError> {
            Err(SessionError::EnhanceInFlight)
        }
    }

    fn note(id: &str) -> NoteId {
        id.parse().unwrap()
    }

    fn recorder(
        label: &'static str,
        calls: &Arc<StdMutex<Vec<(&'static str, ActionPayload)>>>,
    ) -> Arc<dyn ActionHandler> {
        Arc::new(Recorder {
            label,
            calls: Arc::clone(calls),
        })
    }

    #[tokio::test]
    async fn invoke_without_handler_is_noop() {
        let registry = ActionRegistry::new();
        let dispatch = registry
            .invoke(&note("a"), ActionPayload::Enhance(EnhanceMode::Polish))
            .await;
        assert!(!dispatch.is_handled());
        assert!(dispatch.into_result().is_ok());
    }

    #[tokio::test]
    async fn invoke_routes_by_note_and_kind() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let registry = ActionRegistry::new();
        let _enhance = registry.register(&note("a"), ActionKind::Enhance, recorder("enhance-a", &calls));
        let _record = registry.register(&note("a"), ActionKind::Record, recorder("record-a", &calls));
        let _other = registry.register(&note("b"), ActionKind::Enhance, recorder("enhance-b", &calls));

        registry
            .invoke(&note("a"), ActionPayload::Record(RecordAction::Start))
            .await;
        registry
            .invoke(&note("b"), ActionPayload::Enhance(EnhanceMode::Summarize))
            .await;

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("record-a", ActionPayload::Record(RecordAction::Start)),
                ("enhance-b", ActionPayload::Enhance(EnhanceMode::Summarize)),
            ]
        );
    }

    #[tokio::test]
    async fn second_registration_replaces_first() {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let registry = ActionRegistry::new();
        let first = registry.register(&note("a"), ActionKind::Enhance, recorder("first", &calls));
        let second = registry.register(&note("a"), ActionKind::Enhance, recorder("second", &calls));

        registry
            .invoke(&note("a"), ActionPayload::Enhance(EnhanceMode::Polish))
            .await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(calls.lock().unwrap()[0].0, "second");

        // Stale token does not remove the newer handler
        assert!(!registry.deregister(first));
        assert!(registry.is_registered(&note("a"), ActionKind::Enhance));

        registry
            .invoke(&note("a"), ActionPayload::Enhance(EnhanceMode::Polish))
            .await;
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(calls.lock().unwrap()[1].0, "second");

        assert!(registry.deregister(second));
        assert!(!registry.is_registered(&note("a"), ActionKind::Enhance));
    }

    #[tokio::test]
    async fn handler_errors_are_returned() {
        let registry = ActionRegistry::new();
        let _token = registry.register(&note("a"), ActionKind::Enhance, Arc::new(Failing));

        let dispatch = registry
            .invoke(&note("a"), ActionPayload::Enhance(EnhanceMode::Polish))
            .await;
        assert!(dispatch.is_handled());
        assert!(matches!(
            dispatch.into_result(),
            Err(SessionError::EnhanceInFlight)
        ));
    }

    #[test]
    fn payload_kinds() {
        assert_eq!(
            ActionPayload::Enhance(EnhanceMode::Decisions).kind(),
            ActionKind::Enhance
        );
        assert_eq!(
            ActionPayload::Record(RecordAction::Stop).kind(),
            ActionKind::Record
        );
    }
}
