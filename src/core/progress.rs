//! Live per-provider progress for one orchestration.
//!
//! Each provider moves through `pending → loading → completed | errored`.
//! Writers are the orchestrator's provider tasks; readers either poll
//! [`ProgressTracker::snapshot`], hold a [`ProgressTracker::watch`] receiver,
//! or [`ProgressTracker::subscribe`] to an ordered stream of every transition.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use super::provider::Provider;

// =============================================================================
// State machine
// =============================================================================

/// Progress of one provider within one orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Pending,
    Loading,
    Completed,
    Errored,
}

impl ProgressState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }

    /// Completed and errored are final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    /// Whether `self → next` is a legal single step.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Loading) | (Self::Loading, Self::Completed | Self::Errored)
        )
    }
}

impl std::fmt::Display for ProgressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Snapshots and updates
// =============================================================================

/// Point-in-time copy of every provider's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub states: BTreeMap<Provider, ProgressState>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<ProgressState> {
        self.states.get(&provider).copied()
    }

    #[must_use]
    pub fn count(&self, state: ProgressState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// True when every tracked provider is terminal.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }
}

/// One applied transition, pushed to subscribers in application order.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    /// Monotonic per tracker, starting at 1.
    pub seq: u64,
    pub provider: Provider,
    pub state: ProgressState,
    /// Snapshot taken immediately after this transition.
    pub snapshot: ProgressSnapshot,
}

// =============================================================================
// Tracker
// =============================================================================

#[derive(Default)]
struct TrackerInner {
    snapshot: ProgressSnapshot,
    seq: u64,
    subscribers: Vec<mpsc::UnboundedSender<ProgressUpdate>>,
}

/// Per-orchestration progress map.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct ProgressTracker {
    inner: Mutex<TrackerInner>,
    watch_tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            inner: Mutex::new(TrackerInner::default()),
            watch_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the tracked set: every listed provider becomes `pending`.
    ///
    /// Subscribers receive one `pending` update per provider.
    pub fn start(&self, providers: impl IntoIterator<Item = Provider>) {
        let mut inner = self.lock();
        inner.snapshot.states.clear();
        let providers: Vec<Provider> = providers.into_iter().collect();
        for provider in &providers {
            inner.snapshot.states.insert(*provider, ProgressState::Pending);
        }
        for provider in providers {
            self.publish(&mut inner, provider, ProgressState::Pending);
        }
        tracing::debug!(providers = inner.snapshot.len(), "Progress tracking started");
    }

    /// `pending → loading`.
    pub fn mark_loading(&self, provider: Provider) -> bool {
        self.advance(provider, ProgressState::Loading)
    }

    /// `loading → completed`. From `pending`, `loading` is recorded first.
    pub fn mark_completed(&self, provider: Provider) -> bool {
        self.advance(provider, ProgressState::Completed)
    }

    /// `loading → errored`. From `pending`, `loading` is recorded first.
    pub fn mark_errored(&self, provider: Provider) -> bool {
        self.advance(provider, ProgressState::Errored)
    }

    /// Apply a transition. Returns false (and changes nothing) if it is
    /// illegal for the provider's current state.
    fn advance(&self, provider: Provider, next: ProgressState) -> bool {
        let mut inner = self.lock();
        let Some(current) = inner.snapshot.get(provider) else {
            tracing::warn!(provider = %provider, state = %next, "Transition for untracked provider ignored");
            return false;
        };

        if current == ProgressState::Pending && next.is_terminal() {
            inner.snapshot.states.insert(provider, ProgressState::Loading);
            self.publish(&mut inner, provider, ProgressState::Loading);
        } else if !current.can_advance_to(next) {
            tracing::warn!(
                provider = %provider,
                from = %current,
                to = %next,
                "Illegal progress transition rejected"
            );
            return false;
        }

        inner.snapshot.states.insert(provider, next);
        self.publish(&mut inner, provider, next);
        true
    }

    /// Push the current snapshot to watchers and subscribers. Runs under the
    /// inner lock so every subscriber sees transitions in the same order.
    fn publish(&self, inner: &mut TrackerInner, provider: Provider, state: ProgressState) {
        inner.seq += 1;
        let update = ProgressUpdate {
            seq: inner.seq,
            provider,
            state,
            snapshot: inner.snapshot.clone(),
        };
        inner
            .subscribers
            .retain(|tx| tx.send(update.clone()).is_ok());
        self.watch_tx.send_replace(inner.snapshot.clone());
        tracing::trace!(provider = %provider, state = %state, seq = inner.seq, "Progress update");
    }

    /// Current states.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot.clone()
    }

    /// Every tracked provider is terminal.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock().snapshot.is_finished()
    }

    /// Ordered stream of every transition applied after this call.
    ///
    /// The channel is unbounded, but a run produces at most three updates
    /// per provider, so its length is bounded by the tracked set.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ProgressUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Latest-value receiver for poll-style readers.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ProgressSnapshot> {
        self.watch_tx.subscribe()
    }

    /// Drop all subscriber senders so their streams end.
    pub fn close(&self) {
        self.lock().subscribers.clear();
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
