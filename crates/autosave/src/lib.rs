//! `shopdesk-autosave`
//!
//! **Responsibility:** debounced, status-tracked persistence for entities being
//! edited.
//!
//! This crate provides:
//! - [`SaveSession`]: the pure per-entity state machine (buffering, debounce,
//!   status display windows, in-flight save bookkeeping)
//! - [`AutosaveHandle`]: a tokio task driving one session, with status published
//!   on a `watch` channel
//! - [`Persist`]: the seam to whatever actually stores the entity
//!
//! Saves are fire-and-forget. A failed save is not retried; the session shows
//! `Error` and the user re-edits to try again, so changes can be lost on error.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod persist;
pub mod session;

pub use config::{AutosaveConfig, ConfigError};
pub use coordinator::{AutosaveHandle, SessionSnapshot};
pub use error::{AutosaveError, PersistFailure};
pub use persist::{FnPersist, Persist};
pub use session::{PersistRequest, SaveSession, SaveStatus};
