//! Notes storage seam and the store scoped to one authenticated user.

mod firebase;
mod memory;
mod sync;

pub use firebase::FirebaseDatabaseClient;
pub use memory::MemoryBackend;
pub use sync::{EditSession, NotesSyncService};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{InitialNote, Note, NoteId};

/// Errors raised by a notes backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure talking to the remote tree.
    #[error("store request failed: {0}")]
    Transport(String),
    /// The remote tree rejected the request.
    #[error("store API error: {0}")]
    Api(String),
    /// The backend was constructed with unusable settings.
    #[error("invalid store configuration: {0}")]
    InvalidConfiguration(String),
}

/// Callbacks invoked by a live subscription.
///
/// `on_snapshot` receives the complete current list, newest-first, on
/// every remote change. `on_error` receives an opaque human-readable
/// message; errors do not terminate the subscription bookkeeping, and
/// resubscribing is the caller's decision.
#[derive(Clone)]
pub struct Subscriber {
    on_snapshot: Arc<dyn Fn(Vec<Note>) + Send + Sync>,
    on_error: Arc<dyn Fn(String) + Send + Sync>,
}

impl Subscriber {
    pub fn new<S, E>(on_snapshot: S, on_error: E) -> Self
    where
        S: Fn(Vec<Note>) + Send + Sync + 'static,
        E: Fn(String) + Send + Sync + 'static,
    {
        Self {
            on_snapshot: Arc::new(on_snapshot),
            on_error: Arc::new(on_error),
        }
    }

    pub fn notify_snapshot(&self, notes: Vec<Note>) {
        (self.on_snapshot)(notes);
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        (self.on_error)(message.into());
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").finish_non_exhaustive()
    }
}

/// Handle for a registered change-feed listener.
///
/// Detaching is synchronous and releases the underlying listener
/// immediately. Dropping the handle without detaching leaks the listener
/// until the backend goes away, so the store always detaches explicitly.
pub struct ListenerHandle(Box<dyn FnOnce() + Send>);

impl ListenerHandle {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(detach))
    }

    pub fn detach(self) {
        (self.0)();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle").finish_non_exhaustive()
    }
}

/// Remote notes tree seam: `users/{uid}/notes/{noteId} -> {id, text}`.
#[async_trait]
pub trait NotesBackend: Send + Sync + 'static {
    /// Register a change-feed listener. The subscriber receives a full
    /// snapshot on every child add/change/remove.
    fn listen(&self, uid: &str, subscriber: Subscriber) -> ListenerHandle;

    /// Overwrite the note under its id.
    async fn put_note(&self, uid: &str, note: &Note) -> Result<(), StoreError>;

    /// Remove one note. Unknown ids are not an error.
    async fn remove_note(&self, uid: &str, id: NoteId) -> Result<(), StoreError>;

    /// Remove the whole collection.
    async fn remove_all(&self, uid: &str) -> Result<(), StoreError>;
}

/// Note store scoped to the currently authenticated user's collection.
///
/// Holds at most one live subscription: subscribing again replaces the
/// previous callback set instead of creating a parallel feed. Writes are
/// spawned fire-and-forget, so this type must live inside a Tokio
/// runtime.
pub struct NotesStore<B: NotesBackend> {
    backend: Arc<B>,
    uid: String,
    listener: Mutex<Option<ListenerHandle>>,
}

impl<B: NotesBackend> NotesStore<B> {
    #[must_use]
    pub fn new(backend: Arc<B>, uid: impl Into<String>) -> Self {
        Self {
            backend,
            uid: uid.into(),
            listener: Mutex::new(None),
        }
    }

    /// Open (or replace) the live subscription. The previous feed is
    /// detached before the new one attaches, so two feeds are never live
    /// at once.
    pub fn subscribe(&self, subscriber: Subscriber) {
        self.unsubscribe();
        let handle = self.backend.listen(&self.uid, subscriber);
        *self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Release the live subscription. Idempotent; a no-op when never
    /// subscribed.
    pub fn unsubscribe(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.detach();
        }
    }

    /// Assign a fresh id and persist a new note.
    ///
    /// The returned note is final from the caller's perspective; the
    /// backend write happens in the background and a failure is only
    /// logged (the change feed will reconcile observers either way).
    pub fn create(&self, initial: InitialNote) -> Note {
        let note = initial.into_note(NoteId::new());
        self.spawn_put(note.clone());
        note
    }

    /// Overwrite the note with the matching id. An unknown id fails
    /// silently upstream; the store does not validate it locally.
    pub fn edit(&self, note: Note) {
        self.spawn_put(note);
    }

    /// Remove one note.
    pub fn delete(&self, id: NoteId) {
        let backend = Arc::clone(&self.backend);
        let uid = self.uid.clone();
        tokio::spawn(async move {
            if let Err(error) = backend.remove_note(&uid, id).await {
                tracing::warn!(%id, "failed to delete note: {error}");
            }
        });
    }

    /// Remove every note of this user.
    pub fn delete_all(&self) {
        let backend = Arc::clone(&self.backend);
        let uid = self.uid.clone();
        tokio::spawn(async move {
            if let Err(error) = backend.remove_all(&uid).await {
                tracing::warn!("failed to delete notes: {error}");
            }
        });
    }

    fn spawn_put(&self, note: Note) {
        let backend = Arc::clone(&self.backend);
        let uid = self.uid.clone();
        tokio::spawn(async move {
            if let Err(error) = backend.put_note(&uid, &note).await {
                tracing::warn!(id = %note.id, "failed to persist note: {error}");
            }
        });
    }
}

impl<B: NotesBackend> Drop for NotesStore<B> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
