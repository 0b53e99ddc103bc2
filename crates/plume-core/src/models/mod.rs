//! Domain models shared across the crate.

mod note;
mod user;

pub use note::{InitialNote, Note, NoteId};
pub use user::{Credentials, User};
