//! Save-state machine.
//!
//! ```text
//!              DebounceFired / ManualSave
//!   idle ─────────────────────────────────► saving ──PersistSucceeded──► saved
//!   saved ────────────────────────────────►   │                           │
//!   error ────────────────────────────────►   └──PersistFailed──► error   │
//!                                                                         │
//!   any ──ConnectivityLost──► offline ──ConnectivityRestored{queued}──► saving
//!                                  └─────ConnectivityRestored{empty}──► status before offline
//! ```
//!
//! A save trigger while `offline` keeps the machine `offline`: the
//! caller diverts the snapshot to the offline queue. No state is terminal.
//!
//! Going offline hides a pending error, but the machine keeps it. A restore
//! with nothing queued brings back the status (and error) held before the
//! connection dropped, so a failed save is never reported as `saved`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status rendered by the editor's save indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
    Offline,
}

/// Observable save state for one document session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SaveState {
    pub status: SaveStatus,
    pub last_saved: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    /// The quiet window after a burst of mutations elapsed.
    DebounceFired,
    /// The user asked for an immediate save or queue retry.
    ManualSave,
    PersistSucceeded { at: DateTime<Utc> },
    PersistFailed { message: String },
    ConnectivityLost,
    ConnectivityRestored { queued_work: bool },
    /// A diverted save could not be queued.
    QueueFull { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid save transition: {event} while {from:?}")]
pub struct TransitionError {
    pub from: SaveStatus,
    pub event: String,
}

const FALLBACK_ERROR: &str = "Save failed";

/// Owns the [`SaveState`] of one session and applies named transitions.
#[derive(Debug, Default)]
pub struct SaveStateMachine {
    state: SaveState,
    /// Status and error held when connectivity was lost.
    before_offline: Option<(SaveStatus, Option<String>)>,
}

impl SaveStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    pub fn status(&self) -> SaveStatus {
        self.state.status
    }

    /// Apply an event. Returns the new status, or an error (state unchanged)
    /// when the event is not valid in the current status.
    pub fn apply(&mut self, event: SaveEvent) -> Result<SaveStatus, TransitionError> {
        use SaveStatus::*;

        let from = self.state.status;
        match (from, event) {
            (Idle | Saved | Error, SaveEvent::DebounceFired | SaveEvent::ManualSave) => {
                self.state.status = Saving;
            }
            (Offline, SaveEvent::DebounceFired | SaveEvent::ManualSave) => {}

            (Saving, SaveEvent::PersistSucceeded { at }) => {
                self.state.status = Saved;
                self.state.error = None;
                self.state.last_saved = Some(match self.state.last_saved {
                    Some(prev) if prev > at => prev,
                    _ => at,
                });
            }
            (Saving, SaveEvent::PersistFailed { message }) => {
                self.state.status = Error;
                self.state.error = Some(non_empty(message));
            }

            (Offline, SaveEvent::ConnectivityLost) => {}
            (from, SaveEvent::ConnectivityLost) => {
                self.before_offline = Some((from, self.state.error.take()));
                self.state.status = Offline;
            }
            (Offline, SaveEvent::ConnectivityRestored { queued_work }) => {
                let (status, error) = match self.before_offline.take() {
                    _ if queued_work => (Saving, None),
                    Some((Error, error)) => (Error, error),
                    // No save completes while offline, so anything else
                    // falls back to whether one ever succeeded.
                    _ if self.state.last_saved.is_some() => (Saved, None),
                    _ => (Idle, None),
                };
                self.state.status = status;
                self.state.error = error;
            }
            (_, SaveEvent::ConnectivityRestored { .. }) => {}

            (Offline, SaveEvent::QueueFull { message }) => {
                self.state.error = Some(non_empty(message));
            }

            (from, event) => {
                return Err(TransitionError {
                    from,
                    event: format!("{event:?}"),
                });
            }
        }
        Ok(self.state.status)
    }
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        message
    }
}
