//! Autosave coordinator: drives one [`SaveSession`] on a tokio task.
//!
//! Each editor session gets its own task. Edits, flushes and cancellations
//! arrive over a channel; status changes are published on a `watch` channel
//! the UI can render from. The task owns every timer, so closing or dropping
//! the handle is enough to make sure no stale callback outlives the editor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use shopdesk_core::{Clock, EditableEntity, SystemClock};

use crate::config::AutosaveConfig;
use crate::error::{AutosaveError, PersistFailure};
use crate::persist::Persist;
use crate::session::{PersistRequest, SaveSession, SaveStatus};

/// Render-ready view of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SaveStatus,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// An edit is buffered that has not been confirmed as saved.
    pub has_pending: bool,
}

impl SessionSnapshot {
    fn of<E: Clone>(session: &SaveSession<E>) -> Self {
        Self {
            status: session.status(),
            last_saved_at: session.last_saved_at(),
            last_error: session.last_error().map(ToString::to_string),
            has_pending: session.pending().is_some(),
        }
    }
}

type FlushReply = oneshot::Sender<Result<(), AutosaveError>>;

enum Command<E> {
    Edit(E),
    Flush(FlushReply),
    Cancel,
    Close,
}

type PersistFuture = Pin<Box<dyn Future<Output = Result<(), PersistFailure>> + Send>>;

struct InFlight {
    seq: u64,
    future: PersistFuture,
}

/// Handle to one entity's autosave session.
///
/// Created when the entity enters edit mode; [`close`](Self::close) it (or
/// drop it) when the editor goes away.
pub struct AutosaveHandle<E: EditableEntity> {
    entity_id: E::Id,
    commands: mpsc::UnboundedSender<Command<E>>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl<E: EditableEntity> AutosaveHandle<E> {
    /// Start a session for `entity_id` on the current tokio runtime.
    pub fn spawn<P>(entity_id: E::Id, persist: P, config: AutosaveConfig) -> Self
    where
        P: Persist<E> + 'static,
    {
        Self::spawn_with_clock(entity_id, persist, config, SystemClock)
    }

    /// Like [`spawn`](Self::spawn), with an explicit wall clock for `last_saved_at`.
    pub fn spawn_with_clock<P, C>(entity_id: E::Id, persist: P, config: AutosaveConfig, clock: C) -> Self
    where
        P: Persist<E> + 'static,
        C: Clock + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot::default());
        let span = tracing::info_span!("autosave", entity = ?entity_id);

        let worker = Worker {
            session: SaveSession::new(config),
            persist: Arc::new(persist),
            clock,
            snapshot: snapshot_tx,
            in_flight: None,
            waiters: Vec::new(),
        };
        let task = tokio::spawn(worker.run(rx).instrument(span));

        Self {
            entity_id,
            commands,
            snapshot,
            task: Some(task),
        }
    }

    pub fn entity_id(&self) -> &E::Id {
        &self.entity_id
    }

    /// Buffer a new version of the entity and restart the debounce window.
    pub fn record_edit(&self, entity: E) -> Result<(), AutosaveError> {
        if entity.id() != &self.entity_id {
            return Err(AutosaveError::EntityMismatch);
        }
        self.send(Command::Edit(entity))
    }

    /// Save the buffered edit now and wait for the outcome.
    ///
    /// Resolves immediately when nothing is buffered. Used before an editor
    /// closes.
    pub async fn flush_now(&self) -> Result<(), AutosaveError> {
        let (reply, outcome) = oneshot::channel();
        self.send(Command::Flush(reply))?;
        outcome.await.map_err(|_| AutosaveError::SessionClosed)?
    }

    /// Discard the buffered edit and timers without saving.
    pub fn cancel(&self) -> Result<(), AutosaveError> {
        self.send(Command::Cancel)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn status(&self) -> SaveStatus {
        self.snapshot.borrow().status
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.borrow().last_saved_at
    }

    /// Receiver that observes every published status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the session: timers are cleared, an unsaved buffer is dropped and
    /// an in-flight save is abandoned. Call [`flush_now`](Self::flush_now)
    /// first to keep the last edit.
    pub async fn close(mut self) {
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: Command<E>) -> Result<(), AutosaveError> {
        self.commands
            .send(command)
            .map_err(|_| AutosaveError::SessionClosed)
    }
}

impl<E: EditableEntity> Drop for AutosaveHandle<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Worker<E, P, C> {
    session: SaveSession<E>,
    persist: Arc<P>,
    clock: C,
    snapshot: watch::Sender<SessionSnapshot>,
    in_flight: Option<InFlight>,
    waiters: Vec<(u64, FlushReply)>,
}

impl<E, P, C> Worker<E, P, C>
where
    E: EditableEntity,
    P: Persist<E> + 'static,
    C: Clock,
{
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command<E>>) {
        debug!("autosave session started");

        loop {
            let deadline = self.session.next_deadline();

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Edit(entity)) => {
                        let seq = self.session.record_edit(entity, Instant::now());
                        debug!(seq, "edit buffered");
                    }
                    Some(Command::Flush(reply)) => self.flush(reply),
                    Some(Command::Cancel) => self.cancel(),
                    Some(Command::Close) | None => break,
                },

                (seq, outcome) = wait_in_flight(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    self.finish(seq, outcome);
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(request) = self.session.poll(Instant::now()) {
                        self.start(request);
                    }
                }
            }

            self.publish();
        }

        for (_, reply) in self.waiters.drain(..) {
            let _ = reply.send(Err(AutosaveError::SessionClosed));
        }
        debug!("autosave session closed");
    }

    fn flush(&mut self, reply: FlushReply) {
        let Some(target) = self.session.pending_seq() else {
            let _ = reply.send(Ok(()));
            return;
        };
        self.waiters.push((target, reply));
        if let Some(request) = self.session.flush_now() {
            self.start(request);
        }
    }

    fn cancel(&mut self) {
        self.session.cancel();
        for (_, reply) in self.waiters.drain(..) {
            let _ = reply.send(Err(AutosaveError::Cancelled));
        }
        debug!("pending edit cancelled");
    }

    fn start(&mut self, request: PersistRequest<E>) {
        debug!(seq = request.seq, "save started");
        let persist = Arc::clone(&self.persist);
        let timeout = self.session.config().persist_timeout;
        let entity = request.entity;

        let future: PersistFuture = Box::pin(async move {
            let call = persist.persist(entity);
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => return Err(PersistFailure::TimedOut(limit)),
                },
                None => call.await,
            };
            result.map_err(|e| PersistFailure::rejected(&e))
        });

        self.in_flight = Some(InFlight {
            seq: request.seq,
            future,
        });
    }

    fn finish(&mut self, seq: u64, outcome: Result<(), PersistFailure>) {
        match &outcome {
            Ok(()) => info!(seq, "save succeeded"),
            Err(failure) => warn!(seq, error = %failure, "save failed; changes stay unsaved until the next edit"),
        }

        let next = self
            .session
            .complete(seq, outcome.clone(), Instant::now(), self.clock.now());

        let (done, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|(target, _)| *target <= seq);
        self.waiters = waiting;
        for (_, reply) in done {
            let _ = reply.send(outcome.clone().map_err(AutosaveError::from));
        }

        if let Some(request) = next {
            self.start(request);
        }
    }

    fn publish(&self) {
        let next = SessionSnapshot::of(&self.session);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(status = %next.status, "autosave status changed");
            *current = next;
            true
        });
    }
}

/// Resolves with the in-flight save's outcome; pending forever when idle.
async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> (u64, Result<(), PersistFailure>) {
    match in_flight {
        Some(f) => {
            let outcome = f.future.as_mut().await;
            (f.seq, outcome)
        }
        None => std::future::pending().await,
    }
}
