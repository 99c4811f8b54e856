//! Traversal and retrieval engine split into focused submodules.
//!
//! The [`Retriever`] owns the store handle, configuration and event channel.
//! Each call to [`Retriever::retrieve`] builds a fresh [`PrefixQueue`], spawns
//! `parallelism` workers over it and waits for them to exit:
//! - [`worker`] - pop a prefix, page through it, fan out, settle
//! - [`listing`] - page requests under retry and per-attempt timeout
//! - [`fetch`] - file retrieval, inline or through the shared fetch pool
//! - [`context`] - state shared by every worker of one traversal
//! - [`summary`] - aggregation of unit outcomes

mod context;
mod fetch;
mod listing;
mod summary;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig, TraversalConfig};
use crate::dates;
use crate::error::Result;
use crate::queue::{PrefixQueue, QueuedPrefix};
use crate::sink::Sink;
use crate::store::ObjectStore;
use crate::types::{Event, RetrievalSummary};
use context::WorkerContext;
use summary::SummaryCollector;

/// Concurrent prefix traversal engine (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Retriever {
    /// Remote store shared by every worker
    store: Arc<dyn ObjectStore>,
    /// Validated configuration
    config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
}

impl Retriever {
    /// Create a retriever over `store`
    ///
    /// Fails only if the configuration does not validate.
    pub fn new(store: Arc<dyn ObjectStore>, config: Config) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.traversal.event_capacity);
        Ok(Self {
            store,
            config: Arc::new(config),
            event_tx,
        })
    }

    /// Subscribe to progress events
    ///
    /// Events are delivered on a bounded broadcast channel. A subscriber that
    /// falls behind sees `RecvError::Lagged` and misses events; the traversal
    /// itself never waits for subscribers.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this retriever runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Retrieve every object beneath `roots`, handing each to `sink`
    ///
    /// Returns once the traversal is quiescent. Unit failures are reported in
    /// the summary rather than as an error.
    pub async fn retrieve<I, S>(&self, roots: I, sink: Arc<dyn Sink>) -> RetrievalSummary
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retrieve_with_cancel(roots, sink, &CancellationToken::new())
            .await
    }

    /// Like [`retrieve`](Self::retrieve), stopping early when `cancel` fires
    ///
    /// On cancellation, blocked workers are released, in-flight remote calls
    /// and backoff sleeps are abandoned, and the partial summary is returned
    /// with `cancelled` set. The caller's token is never cancelled by the
    /// engine itself; fail-fast aborts use a child token.
    pub async fn retrieve_with_cancel<I, S>(
        &self,
        roots: I,
        sink: Arc<dyn Sink>,
        cancel: &CancellationToken,
    ) -> RetrievalSummary
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // Repeated seeds would retrieve the same subtree twice
        let mut seen = HashSet::new();
        let roots: Vec<String> = roots
            .into_iter()
            .map(Into::into)
            .filter(|root: &String| seen.insert(root.clone()))
            .collect();
        let traversal = &self.config.traversal;

        tracing::info!(
            roots = ?roots,
            parallelism = traversal.parallelism,
            fetch_parallelism = ?traversal.fetch_parallelism,
            max_depth = ?traversal.max_depth,
            "Starting traversal"
        );
        self.event_tx
            .send(Event::TraversalStarted {
                roots: roots.clone(),
                parallelism: traversal.parallelism,
            })
            .ok();

        let queue = Arc::new(PrefixQueue::seeded(
            roots.into_iter().map(QueuedPrefix::root),
        ));
        let collector = Arc::new(SummaryCollector::default());
        let token = cancel.child_token();
        let fetch_limit = traversal
            .fetch_parallelism
            .map(|slots| Arc::new(Semaphore::new(slots)));

        let mut workers = JoinSet::new();
        for worker_id in 0..traversal.parallelism {
            let ctx = WorkerContext {
                worker_id,
                store: Arc::clone(&self.store),
                sink: Arc::clone(&sink),
                queue: Arc::clone(&queue),
                config: Arc::clone(&self.config),
                summary: Arc::clone(&collector),
                fetch_limit: fetch_limit.clone(),
                event_tx: self.event_tx.clone(),
                cancel: token.clone(),
            };
            workers.spawn(worker::run_worker(ctx));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                // A lost worker leaves its prefix unsettled, so quiescence can
                // never be reached; stop the rest rather than hang.
                tracing::error!(error = %e, "Worker task failed, stopping traversal");
                queue.shutdown().await;
                token.cancel();
            }
        }

        queue.mark_stopped().await;
        let summary = collector.finish(queue.was_interrupted().await).await;

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "Traversal finished"
        );
        self.event_tx
            .send(Event::TraversalFinished {
                succeeded: summary.succeeded,
                failed: summary.failed.len(),
                cancelled: summary.cancelled,
            })
            .ok();

        summary
    }

    /// Retrieve every prefix produced by expanding `pattern` over a date range
    ///
    /// See [`dates::expand`] for the pattern rules. Returns an error only if
    /// the pattern or range is invalid.
    pub async fn retrieve_date_range(
        &self,
        pattern: &str,
        start: NaiveDate,
        end: NaiveDate,
        sink: Arc<dyn Sink>,
    ) -> Result<RetrievalSummary> {
        let roots = dates::expand(pattern, start, end)?;
        tracing::debug!(pattern, prefixes = roots.len(), "Expanded date range");
        Ok(self.retrieve(roots, sink).await)
    }
}

/// Retrieve everything beneath `roots` with `parallelism` workers
///
/// Convenience entry point for callers that only need to choose the worker
/// count and retry policy; every other setting takes its default.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use prefix_retriever::{MemoryStore, DiscardSink, RetryConfig, retrieve};
///
/// # async fn example() -> prefix_retriever::Result<()> {
/// let store = MemoryStore::new().with_object("logs/2024/01/a.json", "{}");
/// let summary = retrieve(
///     Arc::new(store),
///     ["logs/"],
///     4,
///     RetryConfig::default(),
///     Arc::new(DiscardSink::new()),
/// )
/// .await?;
/// assert_eq!(summary.succeeded, 1);
/// # Ok(())
/// # }
/// ```
pub async fn retrieve<I, S>(
    store: Arc<dyn ObjectStore>,
    roots: I,
    parallelism: usize,
    retry: RetryConfig,
    sink: Arc<dyn Sink>,
) -> Result<RetrievalSummary>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let config = Config {
        traversal: TraversalConfig {
            parallelism,
            ..Default::default()
        },
        retry,
        ..Default::default()
    };
    let retriever = Retriever::new(store, config)?;
    Ok(retriever.retrieve(roots, sink).await)
}
