//! Prefix queue and completion coordination
//!
//! [`PrefixQueue`] is the single piece of shared mutable traversal state. It
//! holds the FIFO of pending prefixes together with one "outstanding work"
//! counter, both behind the same mutex:
//!
//! - `push` inserts a prefix and increments the counter
//! - `pop` removes a prefix; the counter is unchanged, so the prefix is now in flight
//! - `complete` decrements the counter once a prefix is fully settled
//!
//! Because children are pushed before their parent is completed, the counter
//! only reaches zero when nothing is pending and nothing is in flight. The
//! worker that brings it to zero moves the coordinator to
//! [`CoordinatorState::Draining`] and wakes every blocked `pop`, which then
//! returns `None` so idle workers can exit.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::types::{CoordinatorState, QueueSnapshot};

/// A prefix waiting to be explored
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedPrefix {
    /// The key prefix
    pub prefix: String,
    /// Distance from the seed prefix (seeds are at depth 0)
    pub depth: usize,
}

impl QueuedPrefix {
    /// A seed prefix at depth 0
    pub fn root(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            depth: 0,
        }
    }

    /// A subfolder discovered under `self`
    pub fn child(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            depth: self.depth + 1,
        }
    }
}

struct QueueInner {
    items: VecDeque<QueuedPrefix>,
    /// Pending plus in-flight prefixes
    outstanding: usize,
    state: CoordinatorState,
    /// Set when draining started with work still outstanding
    interrupted: bool,
}

/// Unbounded FIFO of prefixes shared by all workers, with quiescence detection
pub struct PrefixQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl PrefixQueue {
    /// Create a queue seeded with the given prefixes
    ///
    /// An empty seed set is already quiescent, so the queue starts out draining.
    pub fn seeded<I>(roots: I) -> Self
    where
        I: IntoIterator<Item = QueuedPrefix>,
    {
        let items: VecDeque<_> = roots.into_iter().collect();
        let state = if items.is_empty() {
            CoordinatorState::Draining
        } else {
            CoordinatorState::Running
        };
        Self {
            inner: Mutex::new(QueueInner {
                outstanding: items.len(),
                items,
                state,
                interrupted: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue a prefix
    ///
    /// Returns `false` (dropping the prefix) once the queue has stopped
    /// handing out work.
    pub async fn push(&self, item: QueuedPrefix) -> bool {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != CoordinatorState::Running {
                return false;
            }
            inner.items.push_back(item);
            inner.outstanding += 1;
        }
        self.notify.notify_one();
        true
    }

    /// Dequeue the next prefix, waiting until one is available
    ///
    /// Returns `None` once the coordinator is draining, either because the
    /// traversal is quiescent or because `cancel` fired. Each pushed prefix
    /// is returned by exactly one call.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<QueuedPrefix> {
        loop {
            // Register interest before inspecting state so a concurrent
            // push/complete between the check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                if inner.state != CoordinatorState::Running {
                    return None;
                }
                if cancel.is_cancelled() {
                    Self::begin_draining(&mut inner);
                    drop(inner);
                    self.notify.notify_waiters();
                    return None;
                }
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    /// Mark one in-flight prefix as fully processed
    ///
    /// Must be called exactly once per popped prefix, after its children have
    /// been pushed and its file retrievals have settled. Returns `true` if
    /// this call made the traversal quiescent.
    pub async fn complete(&self) -> bool {
        let drained = {
            let mut inner = self.inner.lock().await;
            inner.outstanding = inner.outstanding.saturating_sub(1);
            if inner.outstanding == 0 && inner.state == CoordinatorState::Running {
                inner.state = CoordinatorState::Draining;
                true
            } else {
                false
            }
        };
        if drained {
            tracing::debug!("Prefix queue quiescent, releasing idle workers");
            self.notify.notify_waiters();
        }
        drained
    }

    /// Stop handing out work and release every blocked `pop`
    pub async fn shutdown(&self) {
        {
            let mut inner = self.inner.lock().await;
            Self::begin_draining(&mut inner);
        }
        self.notify.notify_waiters();
    }

    /// Record that every worker has exited
    pub async fn mark_stopped(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == CoordinatorState::Running {
            inner.interrupted = inner.outstanding > 0;
        }
        inner.state = CoordinatorState::Stopped;
    }

    /// True if draining began while work was still pending or in flight
    pub async fn was_interrupted(&self) -> bool {
        self.inner.lock().await.interrupted
    }

    /// Consistent view of pending and in-flight counts
    pub async fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        let pending = inner.items.len();
        QueueSnapshot {
            pending,
            in_flight: inner.outstanding.saturating_sub(pending),
            state: inner.state,
        }
    }

    fn begin_draining(inner: &mut QueueInner) {
        if inner.state == CoordinatorState::Running {
            inner.interrupted = inner.outstanding > 0;
            inner.state = CoordinatorState::Draining;
        }
    }
}
