//! Debounced autosave scheduler
//!
//! Coalesces rapid edits of one open note into a single write per quiescence
//! window. Every write for the note (debounced, flushed or immediate) goes
//! through one async gate and carries a sequence number taken when the write
//! was decided; a write that reaches the gate after a later-decided one was
//! persisted is skipped, so an older snapshot never overwrites a newer one.
//! A timer only takes its snapshot while holding the gate, so waiting on the
//! gate is enough to wait out every write that has left the queue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::domain::duration::Duration;
use crate::domain::note::{NoteId, NoteMeta};

use super::ports::{NoteStore, NoteStoreError};

/// Outcome of a persistence write, delivered to the save listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    Saved {
        id: NoteId,
        updated_at: DateTime<Utc>,
    },
    Failed {
        id: NoteId,
        message: String,
    },
}

/// Callback invoked after every write attempt
pub type SaveListener = Arc<dyn Fn(SaveEvent) + Send + Sync>;

/// Why a write happened (for logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveTrigger {
    Debounced,
    Flush,
    Immediate,
}

struct Snapshot {
    seq: u64,
    content: String,
    meta: NoteMeta,
}

#[derive(Default)]
struct Pending {
    snapshot: Option<Snapshot>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    next_seq: u64,
}

impl Pending {
    /// Disarm the timer so it can no longer fire
    fn disarm(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

struct WriteState {
    last_seq: u64,
    last_updated_at: Option<DateTime<Utc>>,
    /// Set once the note is deleted; no further write may reach the store
    retired: bool,
}

struct Shared {
    id: NoteId,
    store: Arc<dyn NoteStore>,
    delay: std::time::Duration,
    pending: Mutex<Pending>,
    gate: tokio::sync::Mutex<WriteState>,
    listener: Option<SaveListener>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist a snapshot. Returns the `updated_at` written, or `None` if a
    /// later-decided write already reached the store.
    async fn write(
        &self,
        snapshot: Snapshot,
        trigger: SaveTrigger,
    ) -> Result<Option<DateTime<Utc>>, NoteStoreError> {
        let mut state = self.gate.lock().await;
        self.persist(&mut state, snapshot, trigger).await
    }

    /// Persist a snapshot while holding the gate
    async fn persist(
        &self,
        state: &mut WriteState,
        snapshot: Snapshot,
        trigger: SaveTrigger,
    ) -> Result<Option<DateTime<Utc>>, NoteStoreError> {
        if state.retired {
            log::debug!(
                "Dropping {:?} save #{} of deleted note {}",
                trigger,
                snapshot.seq,
                self.id
            );
            return Ok(None);
        }
        if snapshot.seq <= state.last_seq {
            log::debug!(
                "Skipping superseded {:?} save #{} of note {}",
                trigger,
                snapshot.seq,
                self.id
            );
            return Ok(None);
        }

        let meta = snapshot.meta.stamped(Utc::now(), state.last_updated_at);
        match self.store.write(&self.id, &snapshot.content, &meta).await {
            Ok(()) => {
                state.last_seq = snapshot.seq;
                state.last_updated_at = Some(meta.updated_at);
                log::debug!("{:?} save #{} of note {}", trigger, snapshot.seq, self.id);
                self.notify(SaveEvent::Saved {
                    id: self.id.clone(),
                    updated_at: meta.updated_at,
                });
                Ok(Some(meta.updated_at))
            }
            Err(e) => {
                log::warn!("{:?} save of note {} failed: {}", trigger, self.id, e);
                self.notify(SaveEvent::Failed {
                    id: self.id.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn notify(&self, event: SaveEvent) {
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }
}

/// Per-note debounced writer.
///
/// Timers are Tokio tasks, so `schedule` must be called from within a Tokio
/// runtime.
pub struct AutosaveScheduler {
    shared: Arc<Shared>,
}

impl AutosaveScheduler {
    /// Create a scheduler for `id`.
    ///
    /// `persisted_at` is the `updated_at` of the copy already in the store; no
    /// later write is stamped earlier than it.
    pub fn new(
        id: NoteId,
        store: Arc<dyn NoteStore>,
        delay: Duration,
        persisted_at: DateTime<Utc>,
        listener: Option<SaveListener>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                store,
                delay: delay.as_std(),
                pending: Mutex::new(Pending::default()),
                gate: tokio::sync::Mutex::new(WriteState {
                    last_seq: 0,
                    last_updated_at: Some(persisted_at),
                    retired: false,
                }),
                listener,
            }),
        }
    }

    pub fn note_id(&self) -> &NoteId {
        &self.shared.id
    }

    /// Whether an edit is waiting for its window to expire
    pub fn has_pending(&self) -> bool {
        self.shared.pending().snapshot.is_some()
    }

    /// Arm (or re-arm) the quiescence timer with the latest snapshot.
    /// Only the snapshot from the last call before the window expires is
    /// written.
    pub fn schedule(&self, content: String, meta: NoteMeta) {
        let shared = Arc::clone(&self.shared);
        let mut pending = self.shared.pending();
        pending.disarm();
        let seq = pending.take_seq();
        pending.snapshot = Some(Snapshot { seq, content, meta });

        let generation = pending.generation;
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(shared.delay).await;
            let mut state = shared.gate.lock().await;
            let snapshot = {
                let mut pending = shared.pending();
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
                pending.snapshot.take()
            };
            if let Some(snapshot) = snapshot {
                // Failures are reported through the listener
                let _ = shared
                    .persist(&mut state, snapshot, SaveTrigger::Debounced)
                    .await;
            }
        }));
        log::debug!("Scheduled save #{} of note {}", seq, self.shared.id);
    }

    /// Write the pending snapshot now, if there is one, and wait for any
    /// write already in flight. Returns whether a pending snapshot was written.
    pub async fn flush(&self) -> Result<bool, NoteStoreError> {
        let snapshot = {
            let mut pending = self.shared.pending();
            pending.disarm();
            pending.snapshot.take()
        };

        match snapshot {
            Some(snapshot) => {
                self.shared.write(snapshot, SaveTrigger::Flush).await?;
                Ok(true)
            }
            None => {
                self.settle().await;
                Ok(false)
            }
        }
    }

    /// Discard the pending snapshot without writing it.
    /// Returns whether anything was discarded.
    pub fn cancel(&self) -> bool {
        let mut pending = self.shared.pending();
        pending.disarm();
        let discarded = pending.snapshot.take().is_some();
        if discarded {
            log::info!("Discarded pending save of note {}", self.shared.id);
        }
        discarded
    }

    /// Wait until no write of this note is in flight
    pub async fn settle(&self) {
        drop(self.shared.gate.lock().await);
    }

    /// Discard the pending snapshot, wait out any write in flight and refuse
    /// every later one. Used when the note is deleted.
    pub async fn retire(&self) {
        self.cancel();
        self.shared.gate.lock().await.retired = true;
        log::debug!("Autosave for note {} retired", self.shared.id);
    }

    /// Write a snapshot immediately, bypassing the window.
    ///
    /// The snapshot supersedes any pending debounced one, which is dropped.
    /// Returns the `updated_at` written, or `None` if an even later write won.
    pub async fn write_now(
        &self,
        content: String,
        meta: NoteMeta,
    ) -> Result<Option<DateTime<Utc>>, NoteStoreError> {
        let snapshot = {
            let mut pending = self.shared.pending();
            pending.disarm();
            pending.snapshot = None;
            let seq = pending.take_seq();
            Snapshot { seq, content, meta }
        };
        self.shared.write(snapshot, SaveTrigger::Immediate).await
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        let mut pending = self.shared.pending();
        pending.disarm();
        if pending.snapshot.take().is_some() {
            log::warn!(
                "Autosave for note {} dropped with unsaved edits",
                self.shared.id
            );
        }
    }
}
