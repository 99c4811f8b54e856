//! Shared state handed explicitly to every worker of one traversal.

use std::sync::Arc;

use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use super::summary::SummaryCollector;
use crate::config::Config;
use crate::queue::PrefixQueue;
use crate::sink::Sink;
use crate::store::ObjectStore;
use crate::types::{Event, FailedUnit, FailureKind, FileDescriptor};

/// Everything a worker needs, reducing parameter passing between helpers.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) worker_id: usize,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) sink: Arc<dyn Sink>,
    pub(crate) queue: Arc<PrefixQueue>,
    pub(crate) config: Arc<Config>,
    pub(crate) summary: Arc<SummaryCollector>,
    /// Shared fetch pool; `None` fetches inline in listing order
    pub(crate) fetch_limit: Option<Arc<Semaphore>>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl WorkerContext {
    /// Record a file handed successfully to the sink
    pub(crate) fn record_success(&self, file: &FileDescriptor, bytes: u64) {
        self.summary.record_success();
        self.event_tx
            .send(Event::FileRetrieved {
                key: file.key.clone(),
                bytes,
            })
            .ok();
    }

    /// Record a terminal unit failure
    ///
    /// In fail-fast mode the first non-cancellation failure cancels the
    /// whole traversal.
    pub(crate) async fn record_failure(&self, failure: FailedUnit) {
        if failure.kind == FailureKind::Cancelled {
            tracing::debug!(worker = self.worker_id, unit = %failure.unit, "Unit interrupted by cancellation");
        } else {
            tracing::error!(
                worker = self.worker_id,
                unit = %failure.unit,
                kind = ?failure.kind,
                error = %failure.error,
                "Unit failed"
            );
        }

        let trigger_abort =
            self.config.traversal.fail_fast && failure.kind != FailureKind::Cancelled;

        self.summary.record_failure(failure.clone()).await;
        self.event_tx.send(Event::UnitFailed { failure }).ok();

        if trigger_abort && !self.cancel.is_cancelled() {
            tracing::warn!(worker = self.worker_id, "Fail-fast: cancelling traversal");
            self.cancel.cancel();
        }
    }
}
