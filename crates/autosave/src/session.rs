//! Save session state machine (pure, no IO, no timers of its own).
//!
//! A `SaveSession` buffers the latest edit of one entity and decides when a
//! save should start. The driver owns the clock: it reports edits, timer
//! expiries and persist outcomes with the current `Instant`, and runs the
//! [`PersistRequest`]s the session hands back. At most one request is
//! outstanding at a time.
//!
//! ```text
//! Idle ──edit──▶ PendingSave ──debounce──▶ Saving ──ok──▶ Saved ──relax──▶ Idle
//!                     ▲                       │    └─err─▶ Error ──relax──▶ Idle
//!                     └──────── edit ─────────┘ (buffered, saved afterwards)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::AutosaveConfig;
use crate::error::PersistFailure;

/// What an editor shows next to the entity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveStatus {
    #[default]
    Idle,
    PendingSave,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::PendingSave => "pendingSave",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        }
    }
}

impl core::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A save the driver must run and later report via [`SaveSession::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistRequest<E> {
    /// Edit sequence number of `entity`.
    pub seq: u64,
    pub entity: E,
}

/// What to do with a newer edit once the in-flight save finishes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AfterSave {
    /// Its own debounce timer is still armed.
    Nothing,
    /// Its debounce expired during the save; start a fresh window.
    Debounce,
    /// A flush was requested; save right away.
    Immediately,
}

#[derive(Debug, Clone)]
struct Buffered<E> {
    seq: u64,
    entity: E,
}

/// Per-entity autosave state.
#[derive(Debug, Clone)]
pub struct SaveSession<E> {
    config: AutosaveConfig,
    status: SaveStatus,
    pending: Option<Buffered<E>>,
    last_seq: u64,
    in_flight: Option<u64>,
    after_save: AfterSave,
    debounce_at: Option<Instant>,
    relax_at: Option<Instant>,
    last_saved_at: Option<DateTime<Utc>>,
    last_error: Option<PersistFailure>,
}

impl<E: Clone> SaveSession<E> {
    pub fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            status: SaveStatus::Idle,
            pending: None,
            last_seq: 0,
            in_flight: None,
            after_save: AfterSave::Nothing,
            debounce_at: None,
            relax_at: None,
            last_saved_at: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn last_error(&self) -> Option<&PersistFailure> {
        self.last_error.as_ref()
    }

    /// Latest buffered entity not yet confirmed as saved.
    pub fn pending(&self) -> Option<&E> {
        self.pending.as_ref().map(|b| &b.entity)
    }

    pub fn pending_seq(&self) -> Option<u64> {
        self.pending.as_ref().map(|b| b.seq)
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Earliest instant at which [`poll`](Self::poll) has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_at, self.relax_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Buffer an edit and restart the debounce window.
    ///
    /// Only the last edit of a burst is ever saved. An edit that arrives while
    /// a save is in flight is held until that save completes.
    pub fn record_edit(&mut self, entity: E, now: Instant) -> u64 {
        self.last_seq += 1;
        let seq = self.last_seq;
        self.pending = Some(Buffered { seq, entity });
        self.debounce_at = Some(now + self.config.debounce_window);
        self.relax_at = None;
        if self.status != SaveStatus::Saving {
            self.status = SaveStatus::PendingSave;
        }
        seq
    }

    /// Fire whichever timers are due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<PersistRequest<E>> {
        if self.relax_at.is_some_and(|at| at <= now) {
            self.relax_at = None;
            self.status = if self.pending.is_some() {
                SaveStatus::PendingSave
            } else {
                SaveStatus::Idle
            };
        }

        if self.debounce_at.is_some_and(|at| at <= now) {
            self.debounce_at = None;
            if self.in_flight.is_some() {
                if self.has_newer_than_in_flight() && self.after_save == AfterSave::Nothing {
                    self.after_save = AfterSave::Debounce;
                }
                return None;
            }
            return self.start();
        }

        None
    }

    /// Skip the debounce window and save the buffered edit now.
    ///
    /// With a save already in flight, the buffered edit is saved as soon as
    /// that save completes.
    pub fn flush_now(&mut self) -> Option<PersistRequest<E>> {
        self.debounce_at = None;
        if self.in_flight.is_some() {
            if self.has_newer_than_in_flight() {
                self.after_save = AfterSave::Immediately;
            }
            return None;
        }
        self.start()
    }

    /// Report the outcome of the request with sequence `seq`.
    ///
    /// `now` schedules the relax timer; `saved_at` is the wall-clock time shown
    /// to the user. Returns the next request when a flushed edit was waiting
    /// on this save.
    ///
    /// A success while a newer edit is buffered reports `PendingSave`, not
    /// `Saved`: `last_saved_at` moves forward but the newer edit is still
    /// unsaved and keeps its own debounce timer.
    pub fn complete(
        &mut self,
        seq: u64,
        outcome: Result<(), PersistFailure>,
        now: Instant,
        saved_at: DateTime<Utc>,
    ) -> Option<PersistRequest<E>> {
        if self.in_flight != Some(seq) {
            return None;
        }
        self.in_flight = None;

        let newer = self.pending_seq().is_some_and(|p| p > seq);
        if !newer {
            // Failed entities are not retried; the next edit re-arms the cycle.
            self.pending = None;
        }

        match outcome {
            Ok(()) => {
                self.last_saved_at = Some(saved_at);
                self.last_error = None;
                if newer {
                    self.status = SaveStatus::PendingSave;
                } else {
                    self.status = SaveStatus::Saved;
                    self.relax_at = Some(now + self.config.saved_display);
                }
            }
            Err(failure) => {
                self.last_error = Some(failure);
                self.status = SaveStatus::Error;
                self.relax_at = Some(now + self.config.error_display);
            }
        }

        let after = std::mem::replace(&mut self.after_save, AfterSave::Nothing);
        if !newer {
            return None;
        }
        match after {
            AfterSave::Nothing => None,
            AfterSave::Debounce => {
                self.debounce_at = Some(now + self.config.debounce_window);
                None
            }
            AfterSave::Immediately => self.start(),
        }
    }

    /// Discard the buffered edit and every timer without saving.
    ///
    /// A save already in flight cannot be recalled; its outcome is still
    /// reported when it completes.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.debounce_at = None;
        self.relax_at = None;
        self.after_save = AfterSave::Nothing;
        if self.in_flight.is_none() {
            self.status = SaveStatus::Idle;
        }
    }

    fn has_newer_than_in_flight(&self) -> bool {
        match (self.pending_seq(), self.in_flight) {
            (Some(p), Some(f)) => p > f,
            _ => false,
        }
    }

    fn start(&mut self) -> Option<PersistRequest<E>> {
        let buffered = self.pending.as_ref()?;
        let request = PersistRequest {
            seq: buffered.seq,
            entity: buffered.entity.clone(),
        };
        self.in_flight = Some(request.seq);
        self.status = SaveStatus::Saving;
        self.debounce_at = None;
        self.relax_at = None;
        Some(request)
    }
}
