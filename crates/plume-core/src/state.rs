//! Observable operation state.
//!
//! Every asynchronous operation in the core reports through a `Phase`
//! value published on a `tokio::sync::watch` channel, so late observers
//! always see the latest state (replay-latest semantics).

/// Lifecycle of one asynchronous operation as seen by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase<T, E> {
    /// No operation has run yet, or the previous one was cleared.
    #[default]
    Idle,
    /// The operation is in flight.
    Loading,
    /// The operation finished with a value.
    Success(T),
    /// The operation failed terminally; the caller must re-trigger.
    Fail(E),
}

impl<T, E> Phase<T, E> {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The success value, if any.
    #[must_use]
    pub const fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The failure value, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&E> {
        match self {
            Self::Fail(error) => Some(error),
            _ => None,
        }
    }
}
