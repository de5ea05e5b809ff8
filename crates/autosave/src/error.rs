//! Autosave error model.

use std::time::Duration;

use thiserror::Error;

/// The external save operation did not succeed.
///
/// Never retried automatically: the session shows `Error` and the next edit
/// re-arms the debounce cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistFailure {
    #[error("save rejected: {0}")]
    Rejected(String),

    #[error("save timed out after {0:?}")]
    TimedOut(Duration),
}

impl PersistFailure {
    /// Render an external error, including its cause chain.
    pub fn rejected(err: &anyhow::Error) -> Self {
        Self::Rejected(format!("{err:#}"))
    }
}

/// Errors surfaced by an [`AutosaveHandle`](crate::AutosaveHandle).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutosaveError {
    /// The session task has stopped (closed or dropped).
    #[error("autosave session is closed")]
    SessionClosed,

    /// The buffered edit was discarded before it was saved.
    #[error("pending edit was cancelled")]
    Cancelled,

    /// An edit for a different entity was sent to this session.
    #[error("edit belongs to another entity")]
    EntityMismatch,

    #[error(transparent)]
    Persist(#[from] PersistFailure),
}
