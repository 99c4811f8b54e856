//! Error types for prefix-retriever
//!
//! This module provides the error taxonomy used throughout the library:
//! - [`RemoteError`] for failures reported by the object store, classified as
//!   transient or permanent via [`RemoteErrorKind`]
//! - [`SinkError`] for failures persisting an already-fetched object
//! - [`Error`], the crate-level error that wraps both plus configuration,
//!   retry-exhaustion and cancellation failures

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for prefix-retriever operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for prefix-retriever
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "traversal.parallelism")
        key: Option<String>,
    },

    /// Remote store call failed
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A transient remote failure outlived its retry attempts
    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetryBudgetExhausted {
        /// Number of attempts made, including the first
        attempts: u32,
        /// The error returned by the final attempt
        last: RemoteError,
    },

    /// Failed to persist a fetched object
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid date-prefix pattern or range
    #[error("invalid date pattern: {0}")]
    InvalidPattern(String),

    /// Path could not be derived or resolved
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// Why the path was rejected
        reason: String,
    },

    /// The cancellation signal fired mid-operation
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Classification of a remote store failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// Request timed out (transient)
    Timeout,
    /// Store is throttling requests (transient)
    Throttled,
    /// 5xx-class server failure (transient)
    Server,
    /// Connection refused, reset or dropped (transient)
    Connection,
    /// Key or bucket does not exist (permanent)
    NotFound,
    /// Credentials rejected or insufficient (permanent)
    AccessDenied,
    /// Request was malformed (permanent)
    InvalidRequest,
    /// Unclassified failure (permanent)
    Other,
}

impl RemoteErrorKind {
    /// Returns true for kinds that are expected to succeed on retry
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            RemoteErrorKind::Timeout
                | RemoteErrorKind::Throttled
                | RemoteErrorKind::Server
                | RemoteErrorKind::Connection
        )
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::Throttled => "throttled",
            RemoteErrorKind::Server => "server",
            RemoteErrorKind::Connection => "connection",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::AccessDenied => "access denied",
            RemoteErrorKind::InvalidRequest => "invalid request",
            RemoteErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure reported by an [`ObjectStore`](crate::store::ObjectStore) call
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// Failure classification
    pub kind: RemoteErrorKind,
    /// Human-readable detail from the store
    pub message: String,
}

impl RemoteError {
    /// Create a remote error of the given kind
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeout of a single request attempt
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, message)
    }

    /// Missing key or bucket
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    /// Map an HTTP-style status code onto a failure kind
    ///
    /// 408 and 429 are treated as timeout/throttling, every 5xx as a server
    /// failure, and the common 4xx codes as permanent.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            408 => RemoteErrorKind::Timeout,
            429 | 503 => RemoteErrorKind::Throttled,
            500..=599 => RemoteErrorKind::Server,
            401 | 403 => RemoteErrorKind::AccessDenied,
            404 => RemoteErrorKind::NotFound,
            400 | 405 | 411 | 412 | 416 => RemoteErrorKind::InvalidRequest,
            _ => RemoteErrorKind::Other,
        };
        Self::new(kind, message)
    }

    /// Returns true if this failure is worth retrying
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Failure persisting an object that was already fetched
#[derive(Debug, Error)]
pub enum SinkError {
    /// Local I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object body failed mid-transfer
    #[error("object body failed mid-transfer: {0}")]
    Stream(RemoteError),

    /// The key cannot be mapped onto a destination
    #[error("key {key:?} cannot be written: {reason}")]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Destination exists and the collision policy forbids replacing it
    #[error("destination already exists: {0}")]
    Exists(PathBuf),
}

impl From<Error> for SinkError {
    fn from(err: Error) -> Self {
        match err {
            Error::Sink(e) => e,
            Error::Io(e) => SinkError::Io(e),
            Error::InvalidPath { path, reason } => SinkError::InvalidKey {
                key: path.display().to_string(),
                reason,
            },
            other => SinkError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
