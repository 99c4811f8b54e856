//! Core types for prefix-retriever

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One retrievable object discovered during listing
///
/// Immutable once listed; passed by value to the retrieval that consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Full object key
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modification time reported by the store
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag, when the store reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    /// Any further store-specific metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl FileDescriptor {
    /// Create a descriptor with just a key and size
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            e_tag: None,
            metadata: HashMap::new(),
        }
    }
}

/// Result of one list-children call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Immediate subfolders (common prefixes), in store order
    pub prefixes: Vec<String>,
    /// Objects directly under the listed prefix, in store order
    pub files: Vec<FileDescriptor>,
    /// Token for the next page; `None` once the listing is exhausted
    pub continuation_token: Option<String>,
}

/// A unit of work that can fail on its own
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkUnit {
    /// Listing the children of a prefix
    Listing {
        /// The prefix being listed
        prefix: String,
    },
    /// Retrieving one object
    Retrieval {
        /// The object key
        key: String,
    },
}

impl std::fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkUnit::Listing { prefix } => write!(f, "listing {prefix:?}"),
            WorkUnit::Retrieval { key } => write!(f, "retrieval {key:?}"),
        }
    }
}

/// Terminal failure category of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Non-retryable remote error
    Permanent,
    /// Transient remote error that outlived its retry attempts
    RetryBudgetExhausted,
    /// The object was fetched but could not be persisted
    Sink,
    /// Interrupted by the cancellation signal
    Cancelled,
}

/// A unit that reached a failed terminal state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUnit {
    /// Which unit failed
    pub unit: WorkUnit,
    /// Failure category
    pub kind: FailureKind,
    /// Error message
    pub error: String,
}

/// Outcome of a whole traversal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSummary {
    /// Number of objects handed successfully to the sink
    pub succeeded: u64,
    /// Every unit that failed, in the order failures were recorded
    pub failed: Vec<FailedUnit>,
    /// True if the traversal stopped before all work was drained
    pub cancelled: bool,
}

impl RetrievalSummary {
    /// True when every discovered unit succeeded and nothing was cancelled
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Completion coordinator state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// Work may still be produced
    Running,
    /// No more work will be handed out; workers are exiting
    Draining,
    /// All workers have exited
    Stopped,
}

/// Point-in-time view of the prefix queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Prefixes enqueued and not yet dequeued
    pub pending: usize,
    /// Prefixes dequeued and not yet fully processed
    pub in_flight: usize,
    /// Coordinator state at the time of the snapshot
    pub state: CoordinatorState,
}

/// Progress events emitted during a traversal
///
/// Subscribe with [`Retriever::subscribe`](crate::Retriever::subscribe).
/// Slow subscribers may miss events; the traversal never waits on them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Traversal started with these seed prefixes
    TraversalStarted {
        /// Seed prefixes
        roots: Vec<String>,
        /// Number of listing workers
        parallelism: usize,
    },

    /// One page of a prefix was listed
    PrefixListed {
        /// The listed prefix
        prefix: String,
        /// Number of subfolders on this page
        subfolders: usize,
        /// Number of files on this page
        files: usize,
    },

    /// An object was handed to the sink
    FileRetrieved {
        /// Object key
        key: String,
        /// Bytes written by the sink
        bytes: u64,
    },

    /// A unit reached a failed terminal state
    UnitFailed {
        /// The failure
        failure: FailedUnit,
    },

    /// Traversal returned
    TraversalFinished {
        /// Successful retrievals
        succeeded: u64,
        /// Number of failed units
        failed: usize,
        /// Whether the traversal was cancelled
        cancelled: bool,
    },
}
