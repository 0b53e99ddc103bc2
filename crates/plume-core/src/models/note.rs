//! Note models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use uuid::timestamp::context::ContextV7;
use uuid::{Timestamp, Uuid};

/// A unique identifier for a note, using UUID v7 (time-sortable).
///
/// The store assigns an id exactly once, when a note is first persisted;
/// it never changes for the note's lifetime. Because v7 ids are
/// time-ordered, sorting ids descending yields newest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7.
    ///
    /// Ids minted within the same millisecond stay monotonic through a
    /// shared counter context, so creation order is preserved.
    #[must_use]
    pub fn new() -> Self {
        static CONTEXT: OnceLock<Mutex<ContextV7>> = OnceLock::new();
        let context = CONTEXT.get_or_init(|| Mutex::new(ContextV7::new()));
        Self(Uuid::new_v7(Timestamp::now(&*context.lock().unwrap())))
    }

    /// Get the string representation of this ID.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A persisted note.
///
/// Two notes are equal iff their id and text are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier, unique within a user's collection
    pub id: NoteId,
    /// Plain text content
    pub text: String,
}

impl Note {
    /// Build a note from its persisted parts.
    #[must_use]
    pub fn persisted(id: NoteId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// The same note with replaced text.
    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            id: self.id,
            text: text.into(),
        }
    }
}

/// Input to note creation, before the store has assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialNote {
    /// Plain text content
    pub text: String,
}

impl InitialNote {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Promote to a persisted note once the store has assigned a key.
    #[must_use]
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            text: self.text,
        }
    }
}
