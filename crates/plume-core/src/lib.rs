//! plume-core - Core library for Plume
//!
//! This crate contains the shared models, auth flow, and notes
//! synchronization logic used by the Plume client apps. UI layers sit on
//! top of the observable state exposed here and stay out of this crate.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod notes;
pub mod session;
pub mod state;
mod util;

pub use error::{classify, ErrorKind};
pub use models::{Credentials, InitialNote, Note, NoteId, User};
pub use state::Phase;
