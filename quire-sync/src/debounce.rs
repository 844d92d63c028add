//! Debounced mutation trigger.
//!
//! Holds at most one pending deadline. Each mutation pushes the deadline
//! to `now + window`; the save fires once the deadline passes without a
//! further mutation. While the load guard is up, mutations are ignored so
//! that applying the initially loaded content never schedules a save.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
    loading: bool,
    /// Mutations accepted since the last fire.
    pending_mutations: u64,
}

impl Debouncer {
    /// New debouncer with the load guard raised.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            loading: true,
            pending_mutations: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Lower the load guard; subsequent mutations schedule saves.
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    /// Record a mutation at `now`. Returns `false` if it was suppressed.
    pub fn touch(&mut self, now: Instant) -> bool {
        if self.loading {
            return false;
        }
        self.deadline = Some(now + self.window);
        self.pending_mutations += 1;
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending deadline if it has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Consume the pending deadline regardless of time (manual save, close).
    pub fn take_pending(&mut self) -> bool {
        let pending = self.deadline.is_some();
        self.clear();
        pending
    }

    pub fn pending_mutations(&self) -> u64 {
        self.pending_mutations
    }

    fn clear(&mut self) {
        self.deadline = None;
        self.pending_mutations = 0;
    }
}
