//! # quire-sync: Autosave and save-state reconciliation for Quire
//!
//! Keeps an open document durable while it is edited: bursts of edits are
//! debounced into one save, each save tries the backend API and then a
//! direct data-store write, saves made offline are queued and replayed in
//! order, and a revision checkpoint is taken at most once per interval.
//!
//! ## Architecture
//!
//! ```text
//!  editor ──mutation──► SessionHandle ──► Session task
//!                                          │
//!                         ┌────────────────┼──────────────────┐
//!                         ▼                ▼                  ▼
//!                    Debouncer      SaveStateMachine    OfflineQueue
//!                         │                                   │
//!                         └──────► PersistenceChain ◄─────────┘
//!                                   │          │
//!                                   ▼          ▼
//!                              ApiStrategy  DirectStoreStrategy
//!                                   │
//!                                   └──► RevisionSnapshotter ──► RevisionService
//! ```
//!
//! ## Modules
//!
//! - [`state`]: save-state machine (`idle`, `saving`, `saved`, `error`, `offline`)
//! - [`debounce`]: quiet-window trigger with the initial load guard
//! - [`persist`]: ordered persistence strategies
//! - [`backend`]: HTTP clients for the API and the data store
//! - [`queue`]: LZ4-compressed offline FIFO
//! - [`revision`]: checkpoints and the periodic snapshotter
//! - [`session`]: per-document task tying it all together
//! - [`config`]: environment-driven configuration

pub mod backend;
pub mod config;
pub mod debounce;
pub mod persist;
pub mod queue;
pub mod revision;
pub mod session;
pub mod snapshot;
pub mod state;

pub use backend::{default_chain, ApiStrategy, BackendClient, DirectStoreStrategy};
pub use config::{ConfigError, SyncConfig};
pub use debounce::Debouncer;
pub use persist::{
    PersistError, PersistReceipt, PersistenceChain, PersistenceStrategy, StrategyError,
};
pub use queue::{DrainError, DrainReport, OfflineQueue, QueueError, QueuedSave};
pub use revision::{
    RevisionCheckpoint, RevisionError, RevisionHistory, RevisionService, RevisionSnapshotter,
};
pub use session::{
    CloseReport, NotificationLevel, Session, SessionError, SessionEvent, SessionHandle,
};
pub use snapshot::{DocumentContent, DocumentSource, SharedDocument, Snapshot};
pub use state::{SaveEvent, SaveState, SaveStateMachine, SaveStatus, TransitionError};
