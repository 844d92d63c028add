//! Editor session: one task per open document driving the save pipeline.
//!
//! ```text
//!   SessionHandle ──commands──► session task
//!        ▲                          │ owns: SaveStateMachine, Debouncer,
//!        │                          │       OfflineQueue, RevisionSnapshotter
//!        │ watch<SaveState>         │
//!        └──────────────────────────┤
//!        │ mpsc<SessionEvent>       ▼
//!        └──────────────── PersistenceChain / RevisionService
//! ```
//!
//! The task awaits each save before taking the next command, so at most one
//! save is in flight per session. Failures never reach the caller; they are
//! reflected in [`SaveState`] and announced as [`SessionEvent::Notification`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use quire_core::DocumentError;

use crate::backend::{default_chain, BackendClient};
use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::persist::PersistenceChain;
use crate::queue::OfflineQueue;
use crate::revision::{
    RevisionCheckpoint, RevisionError, RevisionHistory, RevisionService, RevisionSnapshotter,
};
use crate::snapshot::{DocumentSource, Snapshot};
use crate::state::{SaveEvent, SaveState, SaveStateMachine, SaveStatus};

const COMMAND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,

    #[error("Could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Outcome of [`SessionHandle::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub state: SaveState,
    /// Queued offline saves that could not be replayed before the task stopped.
    pub discarded: usize,
}

/// Events for the UI layer (toasts, history panels).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Notification {
        level: NotificationLevel,
        message: String,
    },
    CheckpointCreated(RevisionCheckpoint),
    QueueDrained { replayed: usize },
}

enum Command {
    Mutation,
    ContentLoaded {
        content: Option<Value>,
        reply: oneshot::Sender<Result<(), DocumentError>>,
    },
    Connectivity(bool),
    SaveNow {
        reply: oneshot::Sender<SaveState>,
    },
    RetryQueue {
        reply: oneshot::Sender<SaveState>,
    },
    CreateCheckpoint {
        summary: String,
        reply: oneshot::Sender<Result<RevisionCheckpoint, RevisionError>>,
    },
    QueueLen {
        reply: oneshot::Sender<usize>,
    },
    Close {
        reply: oneshot::Sender<CloseReport>,
    },
}

/// Caller-side handle to a running session.
pub struct SessionHandle {
    document_id: Uuid,
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SaveState>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    revisions: Arc<dyn RevisionService>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    /// Current save state.
    pub fn state(&self) -> SaveState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.state_rx.clone()
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// The editor content changed.
    pub async fn notify_mutation(&self) -> Result<(), SessionError> {
        self.send(Command::Mutation).await
    }

    /// Install the content fetched at open time, then lower the load guard.
    ///
    /// The content is applied without counting as a mutation. If it cannot
    /// be parsed the guard stays up, so an empty editor never overwrites
    /// the stored document.
    pub async fn load_content(
        &self,
        content: Value,
    ) -> Result<Result<(), DocumentError>, SessionError> {
        self.request(|reply| Command::ContentLoaded {
            content: Some(content),
            reply,
        })
        .await
    }

    /// Lower the load guard when the editor was populated some other way.
    pub async fn content_loaded(&self) -> Result<(), SessionError> {
        let _ = self
            .request(|reply| Command::ContentLoaded {
                content: None,
                reply,
            })
            .await?;
        Ok(())
    }

    /// Connectivity signal from the runtime.
    pub async fn set_online(&self, online: bool) -> Result<(), SessionError> {
        self.send(Command::Connectivity(online)).await
    }

    /// Save immediately, skipping the quiet window.
    pub async fn save_now(&self) -> Result<SaveState, SessionError> {
        self.request(|reply| Command::SaveNow { reply }).await
    }

    /// Replay the offline queue now (no-op while offline or empty).
    pub async fn retry_queue(&self) -> Result<SaveState, SessionError> {
        self.request(|reply| Command::RetryQueue { reply }).await
    }

    /// Explicit user checkpoint; also restarts the automatic interval.
    pub async fn create_checkpoint(
        &self,
        summary: impl Into<String>,
    ) -> Result<Result<RevisionCheckpoint, RevisionError>, SessionError> {
        let summary = summary.into();
        self.request(|reply| Command::CreateCheckpoint { summary, reply })
            .await
    }

    /// Checkpoint history as stored by the backend.
    pub async fn list_revisions(&self) -> Result<RevisionHistory, RevisionError> {
        let listing = self.revisions.list_revisions(self.document_id).await?;
        Ok(RevisionHistory::from_listing(listing))
    }

    pub async fn queue_len(&self) -> Result<usize, SessionError> {
        self.request(|reply| Command::QueueLen { reply }).await
    }

    /// Flush a pending debounced save, replay the offline queue if online,
    /// then stop the task.
    ///
    /// Saves still queued at that point are reported in
    /// [`CloseReport::discarded`] and announced as an error notification.
    pub async fn close(self) -> Result<CloseReport, SessionError> {
        let report = self.request(|reply| Command::Close { reply }).await?;
        let _ = self.task.await;
        Ok(report)
    }
}

/// Session task state. Constructed through [`Session::open`].
pub struct Session {
    document_id: Uuid,
    user_id: Uuid,
    checkpoint_summary: String,
    online: bool,
    machine: SaveStateMachine,
    debouncer: Debouncer,
    queue: OfflineQueue,
    snapshotter: RevisionSnapshotter,
    history: RevisionHistory,
    source: Arc<dyn DocumentSource>,
    chain: PersistenceChain,
    revisions: Arc<dyn RevisionService>,
    state_tx: watch::Sender<SaveState>,
    event_tx: mpsc::Sender<SessionEvent>,
    commands: mpsc::Receiver<Command>,
}

impl Session {
    /// Spawn a session on the current tokio runtime.
    pub fn open(
        config: &SyncConfig,
        source: Arc<dyn DocumentSource>,
        chain: PersistenceChain,
        revisions: Arc<dyn RevisionService>,
    ) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SaveState::default());
        let document_id = source.document_id();

        let session = Session {
            document_id,
            user_id: config.user_id,
            checkpoint_summary: config.checkpoint_summary.clone(),
            online: true,
            machine: SaveStateMachine::new(),
            debouncer: Debouncer::new(config.debounce),
            queue: OfflineQueue::new(config.queue_capacity),
            snapshotter: RevisionSnapshotter::new(config.checkpoint_interval, Instant::now()),
            history: RevisionHistory::new(),
            source,
            chain,
            revisions: revisions.clone(),
            state_tx,
            event_tx,
            commands: command_rx,
        };

        log::info!(
            "Opened save session for {document_id} (debounce {:?}, strategies {:?})",
            session.debouncer.window(),
            session.chain.names()
        );
        let task = tokio::spawn(session.run());

        SessionHandle {
            document_id,
            commands: command_tx,
            state_rx,
            event_rx: Some(event_rx),
            revisions,
            task,
        }
    }

    /// Spawn a session wired to the HTTP backend described by `config`.
    pub fn open_remote(
        config: &SyncConfig,
        source: Arc<dyn DocumentSource>,
    ) -> Result<SessionHandle, SessionError> {
        config.validate()?;
        let client = Arc::new(BackendClient::new(config)?);
        let chain = default_chain(config, client.clone())?;
        Ok(Self::open(config, source, chain, client))
    }

    async fn run(mut self) {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        // Every handle dropped: wind down like an explicit close.
                        self.shutdown().await;
                        break;
                    };
                    if let Some(reply) = self.handle(command).await {
                        let discarded = self.shutdown().await;
                        let _ = reply.send(CloseReport {
                            state: self.machine.state().clone(),
                            discarded,
                        });
                        break;
                    }
                }
                _ = sleep_until(deadline) => {
                    if self.debouncer.take_due(Instant::now()) {
                        self.save(SaveEvent::DebounceFired).await;
                    }
                }
            }
        }
        log::info!("Closed save session for {}", self.document_id);
    }

    /// Handle one command. Returns the close reply when the session should stop.
    async fn handle(&mut self, command: Command) -> Option<oneshot::Sender<CloseReport>> {
        match command {
            Command::Mutation => {
                if !self.debouncer.touch(Instant::now()) {
                    log::trace!("Mutation ignored during initial load of {}", self.document_id);
                }
            }
            Command::ContentLoaded { content, reply } => {
                let result = match content {
                    Some(content) => self.source.apply_loaded(content),
                    None => Ok(()),
                };
                match &result {
                    Ok(()) if self.debouncer.is_loading() => {
                        self.debouncer.finish_loading();
                        log::debug!("Load guard lowered for {}", self.document_id);
                    }
                    Ok(()) => {}
                    Err(e) => self.notify(
                        NotificationLevel::Error,
                        format!("Failed to load document content: {e}"),
                    ),
                }
                let _ = reply.send(result);
            }
            Command::Connectivity(online) => self.set_online(online).await,
            Command::SaveNow { reply } => {
                self.debouncer.take_pending();
                self.save(SaveEvent::ManualSave).await;
                let _ = reply.send(self.machine.state().clone());
            }
            Command::RetryQueue { reply } => {
                if self.online && !self.queue.is_empty() {
                    if self.transition(SaveEvent::ManualSave).is_some() {
                        self.replay_queue().await;
                    }
                }
                let _ = reply.send(self.machine.state().clone());
            }
            Command::CreateCheckpoint { summary, reply } => {
                let result = self.checkpoint(&summary).await;
                let _ = reply.send(result);
            }
            Command::QueueLen { reply } => {
                let _ = reply.send(self.queue.len());
            }
            Command::Close { reply } => return Some(reply),
        }
        None
    }

    /// Flush, replay what can be replayed, and count what is left behind.
    async fn shutdown(&mut self) -> usize {
        if self.debouncer.take_pending() {
            log::debug!("Flushing pending save for {} before close", self.document_id);
            self.save(SaveEvent::DebounceFired).await;
        }
        if self.online
            && !self.queue.is_empty()
            && self.transition(SaveEvent::ManualSave).is_some()
        {
            self.replay_queue().await;
        }

        let discarded = self.queue.len();
        if discarded > 0 {
            log::warn!(
                "Closing session for {} with {discarded} unsynced offline save(s)",
                self.document_id
            );
            self.notify(
                NotificationLevel::Error,
                format!("{discarded} offline save(s) were not synced before closing"),
            );
        }
        discarded
    }

    fn transition(&mut self, event: SaveEvent) -> Option<SaveStatus> {
        match self.machine.apply(event) {
            Ok(status) => {
                self.state_tx.send_replace(self.machine.state().clone());
                Some(status)
            }
            Err(e) => {
                log::warn!("{e} ({})", self.document_id);
                None
            }
        }
    }

    fn notify(&self, level: NotificationLevel, message: String) {
        self.emit(SessionEvent::Notification { level, message });
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::debug!("Session event dropped: {e}");
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.document_id, self.user_id, self.source.read_content())
    }

    /// One save attempt, triggered by the debouncer or the user.
    async fn save(&mut self, trigger: SaveEvent) {
        let snapshot = self.snapshot();

        if !self.online {
            self.transition(trigger);
            self.enqueue(&snapshot);
            return;
        }

        if self.transition(trigger).is_none() {
            return;
        }

        // Older offline saves must land before this one. Online snapshots
        // are never queued, even when the replay fails.
        if !self.queue.is_empty() {
            match self.queue.drain(&self.chain).await {
                Ok(report) => self.emit(SessionEvent::QueueDrained {
                    replayed: report.replayed,
                }),
                Err(e) => {
                    self.persist_failed(e.to_string());
                    return;
                }
            }
        }

        match self.chain.persist(&snapshot).await {
            Ok(receipt) => self.persisted(receipt.at).await,
            Err(e) => self.persist_failed(e.to_string()),
        }
    }

    /// Divert a snapshot to the offline queue.
    fn enqueue(&mut self, snapshot: &Snapshot) {
        match self.queue.enqueue(snapshot) {
            Ok(len) => {
                log::info!(
                    "Queued offline save for {} ({len}/{} pending)",
                    self.document_id,
                    self.queue.capacity()
                );
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Could not queue save for {}: {message}", self.document_id);
                if self.machine.status() == SaveStatus::Offline {
                    self.transition(SaveEvent::QueueFull {
                        message: message.clone(),
                    });
                }
                self.notify(
                    NotificationLevel::Error,
                    format!("Changes could not be stored offline: {message}"),
                );
            }
        }
    }

    async fn set_online(&mut self, online: bool) {
        if online == self.online {
            return;
        }
        self.online = online;

        if !online {
            log::info!("Connectivity lost; saves for {} will be queued", self.document_id);
            self.transition(SaveEvent::ConnectivityLost);
            self.notify(
                NotificationLevel::Warning,
                "You are offline. Changes will be saved when the connection returns.".to_string(),
            );
            return;
        }

        let queued_work = !self.queue.is_empty();
        log::info!(
            "Connectivity restored for {} ({} queued saves)",
            self.document_id,
            self.queue.len()
        );
        self.transition(SaveEvent::ConnectivityRestored { queued_work });
        self.notify(NotificationLevel::Info, "Back online.".to_string());
        if queued_work {
            self.replay_queue().await;
        }
    }

    async fn replay_queue(&mut self) {
        match self.queue.drain(&self.chain).await {
            Ok(report) => {
                self.emit(SessionEvent::QueueDrained {
                    replayed: report.replayed,
                });
                self.persisted(report.last_saved.unwrap_or_else(Utc::now)).await;
            }
            Err(e) => self.persist_failed(e.to_string()),
        }
    }

    async fn persisted(&mut self, at: DateTime<Utc>) {
        self.transition(SaveEvent::PersistSucceeded { at });

        let now = Instant::now();
        if self.snapshotter.is_due(now) {
            self.snapshotter.mark(now);
            let summary = self.checkpoint_summary.clone();
            if let Err(e) = self.request_checkpoint(&summary).await {
                log::warn!("Automatic checkpoint for {} failed: {e}", self.document_id);
                self.notify(
                    NotificationLevel::Warning,
                    format!("Could not create a revision checkpoint: {e}"),
                );
            }
        }
    }

    fn persist_failed(&mut self, message: String) {
        log::error!("Save failed for {}: {message}", self.document_id);
        self.transition(SaveEvent::PersistFailed {
            message: message.clone(),
        });
        self.notify(
            NotificationLevel::Error,
            format!("Failed to save document: {message}"),
        );
    }

    async fn checkpoint(&mut self, summary: &str) -> Result<RevisionCheckpoint, RevisionError> {
        self.snapshotter.mark(Instant::now());
        self.request_checkpoint(summary).await
    }

    async fn request_checkpoint(
        &mut self,
        summary: &str,
    ) -> Result<RevisionCheckpoint, RevisionError> {
        let checkpoint = self
            .revisions
            .create_revision(self.document_id, summary)
            .await?;
        if let Err(e) = self.history.push(checkpoint.clone()) {
            log::warn!("Checkpoint history for {}: {e}", self.document_id);
        }
        log::info!(
            "Created revision {} for {}",
            checkpoint.revision_number,
            self.document_id
        );
        self.emit(SessionEvent::CheckpointCreated(checkpoint.clone()));
        Ok(checkpoint)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
