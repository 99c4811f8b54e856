//! Destinations for retrieved objects
//!
//! - [`DirectorySink`] - mirrors keys as files under a local directory
//! - [`DiscardSink`] - drains bodies and counts bytes (list-only runs)

mod directory;
mod discard;

pub use directory::DirectorySink;
pub use discard::DiscardSink;

use crate::error::SinkError;
use crate::store::ByteStream;
use crate::types::FileDescriptor;

/// Consumer of successfully fetched objects
///
/// `write` is invoked once per retrieved file. The body has already been
/// opened; a failure here is terminal for the file and is not retried.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Persist one object, returning the number of bytes written
    async fn write(&self, file: &FileDescriptor, body: ByteStream) -> Result<u64, SinkError>;
}
