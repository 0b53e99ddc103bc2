//! In-memory notes backend used by tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::models::{Note, NoteId};

use super::{ListenerHandle, NotesBackend, StoreError, Subscriber};

/// A notes backend that keeps every collection in process memory and
/// delivers snapshots synchronously, which makes tests deterministic.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    trees: HashMap<String, BTreeMap<NoteId, String>>,
    listeners: HashMap<u64, (String, Subscriber)>,
    next_listener: u64,
}

impl Inner {
    fn snapshot(&self, uid: &str) -> Vec<Note> {
        self.trees.get(uid).map_or_else(Vec::new, |tree| {
            // BTreeMap iterates ids oldest-first; reverse for newest-first.
            tree.iter()
                .rev()
                .map(|(id, text)| Note::persisted(*id, text.clone()))
                .collect()
        })
    }

    fn listeners_for(&self, uid: &str) -> Vec<Subscriber> {
        self.listeners
            .values()
            .filter(|(listener_uid, _)| listener_uid == uid)
            .map(|(_, subscriber)| subscriber.clone())
            .collect()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current snapshot of one user's collection, newest-first.
    #[must_use]
    pub fn notes_for(&self, uid: &str) -> Vec<Note> {
        self.lock().snapshot(uid)
    }

    /// Report a subscription error to every listener of `uid`. Test hook
    /// for the error republication path.
    pub fn emit_error(&self, uid: &str, message: &str) {
        let listeners = self.lock().listeners_for(uid);
        for subscriber in listeners {
            subscriber.notify_error(message);
        }
    }

    fn mutate(&self, uid: &str, apply: impl FnOnce(&mut BTreeMap<NoteId, String>)) {
        // Snapshot and listener set are captured under the lock, but the
        // callbacks run outside it so they may call back into the backend.
        let (snapshot, listeners) = {
            let mut inner = self.lock();
            apply(inner.trees.entry(uid.to_string()).or_default());
            (inner.snapshot(uid), inner.listeners_for(uid))
        };
        for subscriber in listeners {
            subscriber.notify_snapshot(snapshot.clone());
        }
    }
}

#[async_trait]
impl NotesBackend for MemoryBackend {
    fn listen(&self, uid: &str, subscriber: Subscriber) -> ListenerHandle {
        let (key, snapshot) = {
            let mut inner = self.lock();
            let key = inner.next_listener;
            inner.next_listener += 1;
            inner
                .listeners
                .insert(key, (uid.to_string(), subscriber.clone()));
            (key, inner.snapshot(uid))
        };

        // A freshly attached listener immediately observes current state.
        subscriber.notify_snapshot(snapshot);

        let inner = Arc::clone(&self.inner);
        ListenerHandle::new(move || {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&key);
        })
    }

    async fn put_note(&self, uid: &str, note: &Note) -> Result<(), StoreError> {
        self.mutate(uid, |tree| {
            tree.insert(note.id, note.text.clone());
        });
        Ok(())
    }

    async fn remove_note(&self, uid: &str, id: NoteId) -> Result<(), StoreError> {
        self.mutate(uid, |tree| {
            tree.remove(&id);
        });
        Ok(())
    }

    async fn remove_all(&self, uid: &str) -> Result<(), StoreError> {
        self.mutate(uid, BTreeMap::clear);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn listen_delivers_the_current_snapshot_immediately() {
        let backend = MemoryBackend::new();
        let note = Note::persisted(NoteId::new(), "existing");
        backend.put_note("uid-1", &note).await.unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = backend.listen(
            "uid-1",
            Subscriber::new(
                move |notes| sink.lock().unwrap().push(notes),
                |_message| {},
            ),
        );

        assert_eq!(seen.lock().unwrap().as_slice(), &[vec![note]]);
        handle.detach();
    }

    #[tokio::test]
    async fn detached_listeners_stop_receiving() {
        let backend = MemoryBackend::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = backend.listen(
            "uid-1",
            Subscriber::new(
                move |notes| sink.lock().unwrap().push(notes),
                |_message| {},
            ),
        );
        handle.detach();

        backend
            .put_note("uid-1", &Note::persisted(NoteId::new(), "x"))
            .await
            .unwrap();

        // Only the initial snapshot was delivered.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listeners_are_scoped_per_user() {
        let backend = MemoryBackend::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = backend.listen(
            "uid-1",
            Subscriber::new(
                move |notes| sink.lock().unwrap().push(notes),
                |_message| {},
            ),
        );

        backend
            .put_note("uid-2", &Note::persisted(NoteId::new(), "other user"))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(backend.notes_for("uid-1"), Vec::<Note>::new());
    }

    #[tokio::test]
    async fn emit_error_reaches_listeners() {
        let backend = MemoryBackend::new();
        let errors = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let _handle = backend.listen(
            "uid-1",
            Subscriber::new(
                |_notes| {},
                move |message| sink.lock().unwrap().push(message),
            ),
        );

        backend.emit_error("uid-1", "permission denied");

        assert_eq!(
            errors.lock().unwrap().as_slice(),
            &["permission denied".to_string()]
        );
    }
}
