//! Remote object store abstraction
//!
//! The engine only needs two operations from a store: list the immediate
//! children of a prefix one page at a time, and open a byte stream for a key.
//! Pagination tokens are opaque to the engine and handed back verbatim.

mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::{S3Options, S3Store};

use futures::stream::BoxStream;

use crate::error::RemoteError;
use crate::types::ListingPage;

/// Object body, delivered as a stream of chunks
pub type ByteStream = BoxStream<'static, std::result::Result<Vec<u8>, RemoteError>>;

/// Abstraction over the remote store, enabling testability.
///
/// Implementations must report transient failures (timeouts, throttling,
/// 5xx, dropped connections) with a transient [`RemoteErrorKind`](crate::error::RemoteErrorKind)
/// so the retry policy can tell them apart from permanent ones.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of the immediate children of `prefix`
    ///
    /// With `delimiter = Some(d)`, keys containing `d` after the prefix are
    /// rolled up into common prefixes. With `None`, every key under the
    /// prefix is returned as a file.
    async fn list_children(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> std::result::Result<ListingPage, RemoteError>;

    /// Open the body of `key`
    async fn fetch(&self, key: &str) -> std::result::Result<ByteStream, RemoteError>;
}
