//! Aggregation of unit outcomes into a [`RetrievalSummary`].

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::error::{RemoteError, SinkError};
use crate::retry::RetryError;
use crate::types::{FailedUnit, FailureKind, RetrievalSummary, WorkUnit};

/// Shared, append-only record of outcomes across all workers
#[derive(Default)]
pub(crate) struct SummaryCollector {
    succeeded: AtomicU64,
    failed: Mutex<Vec<FailedUnit>>,
}

impl SummaryCollector {
    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) async fn record_failure(&self, failure: FailedUnit) {
        self.failed.lock().await.push(failure);
    }

    /// Snapshot the outcomes once every worker has exited
    ///
    /// The traversal counts as cancelled if the queue began draining with
    /// work outstanding, or if any unit was interrupted by cancellation.
    pub(crate) async fn finish(&self, interrupted: bool) -> RetrievalSummary {
        let failed = self.failed.lock().await.clone();
        let cancelled = interrupted || failed.iter().any(|f| f.kind == FailureKind::Cancelled);
        RetrievalSummary {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed,
            cancelled,
        }
    }
}

/// Build the failure record for a remote call that was given up on
pub(crate) fn remote_failure(unit: WorkUnit, err: &RetryError<RemoteError>) -> FailedUnit {
    let kind = match err {
        RetryError::Permanent(_) => FailureKind::Permanent,
        RetryError::Exhausted { .. } => FailureKind::RetryBudgetExhausted,
        RetryError::Cancelled => FailureKind::Cancelled,
    };
    FailedUnit {
        unit,
        kind,
        error: err.to_string(),
    }
}

/// Build the failure record for an object the sink could not persist
pub(crate) fn sink_failure(unit: WorkUnit, err: &SinkError) -> FailedUnit {
    FailedUnit {
        unit,
        kind: FailureKind::Sink,
        error: err.to_string(),
    }
}

pub(crate) fn cancelled(unit: WorkUnit) -> FailedUnit {
    FailedUnit {
        unit,
        kind: FailureKind::Cancelled,
        error: "operation cancelled".to_string(),
    }
}
