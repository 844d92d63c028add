//! Ordered persistence strategies.
//!
//! ```text
//!   snapshot ──► [ApiStrategy] ──ok──► done
//!                     │ err
//!                     ▼
//!               [DirectStoreStrategy] ──ok──► done
//!                     │ err
//!                     ▼
//!               PersistError::Exhausted
//! ```
//!
//! The chain stops at the first strategy that succeeds. Every strategy is
//! tried at most once per call, in order, within the same call. There is
//! no retry beyond the chain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::snapshot::Snapshot;

/// Failure of a single strategy.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

/// Failure of the whole chain.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("No persistence strategies configured")]
    NoStrategies,

    #[error("All persistence strategies failed: {}", summarize(.attempts))]
    Exhausted {
        attempts: Vec<(&'static str, StrategyError)>,
    },
}

fn summarize(attempts: &[(&'static str, StrategyError)]) -> String {
    attempts
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Which strategy persisted a snapshot, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReceipt {
    pub strategy: &'static str,
    pub at: DateTime<Utc>,
    /// Position of the strategy in the chain (0 = primary).
    pub attempt: usize,
}

/// One way of making a snapshot durable.
#[async_trait]
pub trait PersistenceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StrategyError>;
}

/// Strategies tried in order until one succeeds.
#[derive(Clone, Default)]
pub struct PersistenceChain {
    strategies: Vec<Arc<dyn PersistenceStrategy>>,
}

impl PersistenceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy behind the existing ones.
    pub fn then(mut self, strategy: Arc<dyn PersistenceStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn persist(&self, snapshot: &Snapshot) -> Result<PersistReceipt, PersistError> {
        if self.strategies.is_empty() {
            return Err(PersistError::NoStrategies);
        }

        let mut attempts = Vec::new();
        for (attempt, strategy) in self.strategies.iter().enumerate() {
            match strategy.persist(snapshot).await {
                Ok(()) => {
                    if attempt > 0 {
                        log::info!(
                            "Saved {} via fallback '{}' after {} failed attempt(s)",
                            snapshot.document_id,
                            strategy.name(),
                            attempt
                        );
                    } else {
                        log::debug!("Saved {} via '{}'", snapshot.document_id, strategy.name());
                    }
                    return Ok(PersistReceipt {
                        strategy: strategy.name(),
                        at: Utc::now(),
                        attempt,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Persistence strategy '{}' failed for {}: {e}",
                        strategy.name(),
                        snapshot.document_id
                    );
                    attempts.push((strategy.name(), e));
                }
            }
        }

        Err(PersistError::Exhausted { attempts })
    }
}
