//! Observable notes list and serialized note editing above the store.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::models::{InitialNote, Note};

use super::{NotesBackend, NotesStore, Subscriber};

/// The note owned by the current editing session.
///
/// At most one note is ever in progress per session, which serializes
/// create/edit submissions: the first submit creates, every later submit
/// edits the same id. The session only reverts to `NoNote` when a new
/// session starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditSession {
    #[default]
    NoNote,
    Tracking(Note),
}

/// Coordination point between the UI layer and [`NotesStore`].
///
/// Republishes store snapshots and subscription errors through watch
/// channels (replay-latest for new observers) and funnels all note
/// mutations through one place.
pub struct NotesSyncService<B: NotesBackend> {
    store: NotesStore<B>,
    notes: watch::Sender<Vec<Note>>,
    error: watch::Sender<Option<String>>,
    session: Mutex<EditSession>,
}

impl<B: NotesBackend> NotesSyncService<B> {
    #[must_use]
    pub fn new(store: NotesStore<B>) -> Self {
        let (notes, _) = watch::channel(Vec::new());
        let (error, _) = watch::channel(None);
        Self {
            store,
            notes,
            error,
            session: Mutex::new(EditSession::NoNote),
        }
    }

    /// Open the live subscription and start republishing snapshots.
    pub fn activate(&self) {
        let notes = self.notes.clone();
        let error = self.error.clone();
        self.store.subscribe(Subscriber::new(
            move |snapshot| {
                notes.send_replace(snapshot);
            },
            move |message| {
                tracing::warn!("notes subscription error: {message}");
                error.send_replace(Some(message));
            },
        ));
    }

    /// Release the live subscription.
    pub fn deactivate(&self) {
        self.store.unsubscribe();
    }

    /// Observe the notes list, newest-first.
    #[must_use]
    pub fn notes(&self) -> watch::Receiver<Vec<Note>> {
        self.notes.subscribe()
    }

    /// Observe subscription errors.
    #[must_use]
    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    /// Persist the text of the current editing session.
    ///
    /// Whitespace-only text is a no-op. The first submit of a session
    /// creates a note and adopts it as in-progress; later submits edit
    /// that same note.
    pub fn submit(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let mut session = self.lock_session();
        let next = match &*session {
            EditSession::NoNote => self.store.create(InitialNote::new(text)),
            EditSession::Tracking(note) => {
                let edited = note.with_text(text);
                self.store.edit(edited.clone());
                edited
            }
        };
        *session = EditSession::Tracking(next);
    }

    /// Adopt an existing note into the editing session, so the next
    /// submit edits it instead of creating a new one.
    pub fn track(&self, note: Note) {
        *self.lock_session() = EditSession::Tracking(note);
    }

    /// Begin a fresh editing session with no note in progress.
    pub fn start_session(&self) {
        *self.lock_session() = EditSession::NoNote;
    }

    /// The note currently in progress, if any.
    #[must_use]
    pub fn in_progress(&self) -> Option<Note> {
        match &*self.lock_session() {
            EditSession::NoNote => None,
            EditSession::Tracking(note) => Some(note.clone()),
        }
    }

    /// Delete one note from the user's collection.
    pub fn delete(&self, note: &Note) {
        self.store.delete(note.id);
    }

    /// Delete every note of the user.
    pub fn delete_all(&self) {
        self.store.delete_all();
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, EditSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: NotesBackend> Drop for NotesSyncService<B> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
