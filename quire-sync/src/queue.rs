//! Offline queue for saves attempted while disconnected.
//!
//! Entries are full snapshots, held LZ4-compressed. Replay runs strictly
//! head-first; the head is only removed once persisted, so a failed replay
//! leaves the queue exactly as it was from the failing entry onward.
//!
//! ```text
//!   enqueue ──► [ e1 | e2 | e3 ]
//!   drain:      e1 ok ─► e2 fail ─► [ e2 | e3 ]  (stop, retry e2 first next time)
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::persist::{PersistError, PersistenceChain};
use crate::snapshot::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Offline queue full ({capacity} saves pending)")]
    Full { capacity: usize },

    #[error("Queued save could not be decoded: {0}")]
    Corrupt(String),

    #[error("Replay failed: {0}")]
    Replay(#[from] PersistError),
}

/// A drain that stopped early.
#[derive(Debug, thiserror::Error)]
#[error("Offline replay stopped after {replayed} save(s), {remaining} still queued: {source}")]
pub struct DrainError {
    pub replayed: usize,
    pub remaining: usize,
    #[source]
    pub source: QueueError,
}

/// A drain that emptied the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub replayed: usize,
    /// Completion time of the last replayed save.
    pub last_saved: Option<DateTime<Utc>>,
}

/// One snapshot waiting for connectivity.
#[derive(Debug, Clone)]
pub struct QueuedSave {
    pub timestamp: DateTime<Utc>,
    document_id: Uuid,
    title: String,
    edited_by: Uuid,
    /// LZ4 (size-prepended) JSON of the content tree
    content: Vec<u8>,
}

impl QueuedSave {
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, QueueError> {
        let json = serde_json::to_vec(&snapshot.content)
            .map_err(|e| QueueError::Corrupt(e.to_string()))?;
        Ok(Self {
            timestamp: snapshot.taken_at,
            document_id: snapshot.document_id,
            title: snapshot.title.clone(),
            edited_by: snapshot.edited_by,
            content: lz4_flex::compress_prepend_size(&json),
        })
    }

    pub fn to_snapshot(&self) -> Result<Snapshot, QueueError> {
        let json = lz4_flex::decompress_size_prepended(&self.content)
            .map_err(|e| QueueError::Corrupt(e.to_string()))?;
        let content =
            serde_json::from_slice(&json).map_err(|e| QueueError::Corrupt(e.to_string()))?;
        Ok(Snapshot {
            document_id: self.document_id,
            title: self.title.clone(),
            content,
            edited_by: self.edited_by,
            taken_at: self.timestamp,
        })
    }

    pub fn compressed_len(&self) -> usize {
        self.content.len()
    }
}

/// FIFO of saves made while offline.
pub struct OfflineQueue {
    queue: VecDeque<QueuedSave>,
    max_size: usize,
}

impl OfflineQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Append a snapshot at the tail. Returns the new queue length.
    pub fn enqueue(&mut self, snapshot: &Snapshot) -> Result<usize, QueueError> {
        if self.queue.len() >= self.max_size {
            return Err(QueueError::Full {
                capacity: self.max_size,
            });
        }
        self.queue.push_back(QueuedSave::from_snapshot(snapshot)?);
        Ok(self.queue.len())
    }

    /// Replay head-first through `chain` until empty or the first failure.
    pub async fn drain(&mut self, chain: &PersistenceChain) -> Result<DrainReport, DrainError> {
        let mut replayed = 0;
        let mut last_saved = None;

        while let Some(entry) = self.queue.pop_front() {
            let outcome = match entry.to_snapshot() {
                Ok(snapshot) => chain.persist(&snapshot).await.map_err(QueueError::from),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(receipt) => {
                    replayed += 1;
                    last_saved = Some(receipt.at);
                }
                Err(source) => {
                    self.queue.push_front(entry);
                    return Err(DrainError {
                        replayed,
                        remaining: self.queue.len(),
                        source,
                    });
                }
            }
        }

        if replayed > 0 {
            log::info!("Replayed {replayed} queued saves");
        }
        Ok(DrainReport {
            replayed,
            last_saved,
        })
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Compressed bytes held.
    pub fn total_bytes(&self) -> usize {
        self.queue.iter().map(QueuedSave::compressed_len).sum()
    }

    /// Enqueue timestamps, head first.
    pub fn peek_timestamps(&self) -> Vec<DateTime<Utc>> {
        self.queue.iter().map(|e| e.timestamp).collect()
    }
}
