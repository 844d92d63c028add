//! Revision checkpoints and the periodic snapshotter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::persist::StrategyError;

/// Immutable, numbered document checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionCheckpoint {
    pub revision_number: u64,
    pub created_at: DateTime<Utc>,
    #[serde(alias = "change_summary", default)]
    pub summary: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("Revision request failed: {0}")]
    Request(#[from] StrategyError),

    #[error("Revision {got} does not follow revision {last}")]
    OutOfOrder { last: u64, got: u64 },
}

impl From<reqwest::Error> for RevisionError {
    fn from(e: reqwest::Error) -> Self {
        RevisionError::Request(StrategyError::Http(e))
    }
}

/// Backend endpoints for checkpoints.
#[async_trait]
pub trait RevisionService: Send + Sync {
    async fn create_revision(
        &self,
        document_id: Uuid,
        change_summary: &str,
    ) -> Result<RevisionCheckpoint, RevisionError>;

    async fn list_revisions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<RevisionCheckpoint>, RevisionError>;
}

/// Append-only checkpoint history of one document.
#[derive(Debug, Default, Clone)]
pub struct RevisionHistory {
    checkpoints: Vec<RevisionCheckpoint>,
}

impl RevisionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a backend listing, sorted by revision number.
    pub fn from_listing(mut checkpoints: Vec<RevisionCheckpoint>) -> Self {
        checkpoints.sort_by_key(|c| c.revision_number);
        checkpoints.dedup_by_key(|c| c.revision_number);
        Self { checkpoints }
    }

    /// Append a checkpoint; its number must exceed the latest one.
    pub fn push(&mut self, checkpoint: RevisionCheckpoint) -> Result<(), RevisionError> {
        if let Some(last) = self.checkpoints.last() {
            if checkpoint.revision_number <= last.revision_number {
                return Err(RevisionError::OutOfOrder {
                    last: last.revision_number,
                    got: checkpoint.revision_number,
                });
            }
        }
        self.checkpoints.push(checkpoint);
        Ok(())
    }

    pub fn latest(&self) -> Option<&RevisionCheckpoint> {
        self.checkpoints.last()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RevisionCheckpoint> {
        self.checkpoints.iter()
    }
}

/// Timestamp guard on the successful-save path.
///
/// The clock starts when the session opens. An attempt is recorded whether
/// or not the checkpoint request succeeds, so a failing backend is asked at
/// most once per interval.
#[derive(Debug)]
pub struct RevisionSnapshotter {
    interval: Duration,
    last_checkpoint: Instant,
}

impl RevisionSnapshotter {
    pub fn new(interval: Duration, opened_at: Instant) -> Self {
        Self {
            interval,
            last_checkpoint: opened_at,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_checkpoint) > self.interval
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_checkpoint = now;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    /// In-memory revision backend.
    #[derive(Default)]
    pub struct MemoryRevisions {
        pub fail: AtomicBool,
        next: AtomicU64,
        pub requests: Mutex<Vec<String>>,
    }

    impl MemoryRevisions {
        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RevisionService for MemoryRevisions {
        async fn create_revision(
            &self,
            _document_id: Uuid,
            change_summary: &str,
        ) -> Result<RevisionCheckpoint, RevisionError> {
            self.requests.lock().unwrap().push(change_summary.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(StrategyError::Rejected("revisions unavailable".into()).into());
            }
            Ok(RevisionCheckpoint {
                revision_number: self.next.fetch_add(1, Ordering::SeqCst) + 1,
                created_at: Utc::now(),
                summary: change_summary.to_string(),
            })
        }

        async fn list_revisions(
            &self,
            _document_id: Uuid,
        ) -> Result<Vec<RevisionCheckpoint>, RevisionError> {
            Ok(Vec::new())
        }
    }
}
