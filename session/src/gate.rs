//! Single-flight coordination for token refresh.
//!
//! DESIGN
//! ======
//! The first caller to hit a 401 while the gate is idle becomes the leader
//! and runs the refresh. Callers arriving while it runs get a [`Waiter`]
//! backed by a one-shot channel and suspend on it. When the leader settles,
//! the refreshing flag is cleared and every queued waiter is signalled inside
//! one critical section, so no caller can see a half-released queue.
//!
//! A leader that is dropped without settling (its task panicked or was
//! cancelled) settles as a failure from `Drop`, so waiters are never stranded.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

/// Result of one refresh cycle, broadcast to every queued caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed(String),
}

impl RefreshOutcome {
    #[must_use]
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

#[derive(Default)]
struct GateInner {
    refreshing: bool,
    pending: Vec<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Clone, Default)]
pub struct RefreshGate {
    inner: Arc<Mutex<GateInner>>,
}

/// What a caller gets when it enters the gate.
pub enum Ticket {
    /// Run the refresh, then [`RefreshLeader::settle`].
    Leader(RefreshLeader),
    /// A refresh is already running; wait for its outcome.
    Follower(Waiter),
}

impl RefreshGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-set the refreshing flag, or enqueue behind the running refresh.
    #[must_use]
    pub fn enter(&self) -> Ticket {
        let mut inner = self.lock();
        if inner.refreshing {
            let (tx, rx) = oneshot::channel();
            inner.pending.push(tx);
            Ticket::Follower(Waiter { rx })
        } else {
            inner.refreshing = true;
            Ticket::Leader(RefreshLeader { gate: self.clone(), settled: false })
        }
    }

    #[must_use]
    pub fn state(&self) -> RefreshState {
        if self.lock().refreshing { RefreshState::Refreshing } else { RefreshState::Idle }
    }

    /// Number of callers queued behind the running refresh.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn release(&self, outcome: &RefreshOutcome) -> usize {
        let mut inner = self.lock();
        inner.refreshing = false;
        let pending = std::mem::take(&mut inner.pending);
        let count = pending.len();
        for tx in pending {
            // A waiter whose caller went away has nothing left to release.
            let _ = tx.send(outcome.clone());
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to run the current refresh.
pub struct RefreshLeader {
    gate: RefreshGate,
    settled: bool,
}

impl RefreshLeader {
    /// Queue a waiter for this refresh's outcome, so the caller that started
    /// it can hand the work off and wait like everyone else.
    #[must_use]
    pub fn waiter(&self) -> Waiter {
        let (tx, rx) = oneshot::channel();
        self.gate.lock().pending.push(tx);
        Waiter { rx }
    }

    /// Publish the outcome to every queued caller and return the gate to idle.
    /// Returns how many callers were released.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.gate.release(&outcome)
    }
}

impl Drop for RefreshLeader {
    fn drop(&mut self) {
        if !self.settled {
            let released = self.gate.release(&RefreshOutcome::Failed("refresh abandoned".into()));
            tracing::warn!(released, "refresh leader dropped before settling");
        }
    }
}

/// A queued caller's handle on the running refresh.
pub struct Waiter {
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl Waiter {
    pub async fn wait(self) -> RefreshOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| RefreshOutcome::Failed("refresh abandoned".into()))
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
