//! # prefix-retriever
//!
//! Concurrent retrieval of every object beneath a key prefix in a remote
//! object store.
//!
//! Object stores have no real directories, only keys shaped like paths
//! (`bucket/year=2024/month=01/part-0001.json`). This crate walks the folder
//! tree those keys imply, breadth-first, with a pool of workers sharing one
//! prefix queue. Each worker lists a prefix page by page, pushes the
//! subfolders it finds back onto the queue, and hands every file to a
//! [`Sink`]. Transient remote failures are retried with exponential backoff
//! and jitter; permanent ones are reported in the [`RetrievalSummary`]
//! without stopping the rest of the traversal.
//!
//! ## Design Philosophy
//!
//! - **Partial failure is normal** - one missing object never aborts a large retrieval
//! - **Sensible defaults** - works out of the box with [`Config::default`]
//! - **Library-first** - no CLI, the caller supplies the prefixes and worker count
//! - **Event-driven** - consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use prefix_retriever::{Config, DirectorySink, MemoryStore, Retriever};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new()
//!         .with_object("logs/2024/01/a.json", "{}")
//!         .with_object("logs/2024/02/b.json", "{}");
//!
//!     let config = Config::default();
//!     let sink = Arc::new(DirectorySink::from_config(&config.sink, &config.traversal.delimiter));
//!     let retriever = Retriever::new(Arc::new(store), config)?;
//!
//!     // Subscribe to events
//!     let mut events = retriever.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = retriever.retrieve(["logs/"], sink).await;
//!     println!("{} retrieved, {} failed", summary.succeeded, summary.failed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Date-range prefix expansion
pub mod dates;
/// Error types
pub mod error;
/// Prefix queue and completion coordination
pub mod queue;
/// Traversal and retrieval engine
pub mod retriever;
/// Retry logic with exponential backoff
pub mod retry;
/// Destinations for retrieved objects
pub mod sink;
/// Remote object store abstraction
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

// Re-export commonly used types
pub use config::{Config, FileCollisionAction, RetryConfig, SinkConfig, TraversalConfig};
pub use error::{Error, RemoteError, RemoteErrorKind, Result, SinkError};
pub use retriever::{Retriever, retrieve};
pub use sink::{DirectorySink, DiscardSink, Sink};
#[cfg(feature = "s3")]
pub use store::{S3Options, S3Store};
pub use store::{ByteStream, MemoryStore, ObjectStore};
pub use types::{
    CoordinatorState, Event, FailedUnit, FailureKind, FileDescriptor, ListingPage,
    QueueSnapshot, RetrievalSummary, WorkUnit,
};

/// Helper function to run a traversal with graceful signal handling.
///
/// Runs the traversal until it completes or a termination signal arrives.
/// On a signal the traversal is cancelled and the partial summary returned,
/// with `cancelled` set.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use prefix_retriever::{Config, DiscardSink, MemoryStore, Retriever, retrieve_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let retriever = Retriever::new(Arc::new(MemoryStore::new()), Config::default())?;
///
///     // Run with automatic signal handling
///     let summary = retrieve_until_signal(&retriever, ["data/"], Arc::new(DiscardSink::new())).await;
///     println!("cancelled: {}", summary.cancelled);
///
///     Ok(())
/// }
/// ```
pub async fn retrieve_until_signal<I, S>(
    retriever: &Retriever,
    roots: I,
    sink: Arc<dyn Sink>,
) -> RetrievalSummary
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cancel = CancellationToken::new();
    let traversal = retriever.retrieve_with_cancel(roots, sink, &cancel);
    tokio::pin!(traversal);

    tokio::select! {
        summary = &mut traversal => summary,
        _ = wait_for_signal() => {
            tracing::info!("Cancelling traversal");
            cancel.cancel();
            traversal.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            // A broken handler must not cancel the traversal
            std::future::pending::<()>().await;
        }
    }
}
