//! Sink that drains bodies without storing them.

use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;

use super::Sink;
use crate::error::SinkError;
use crate::store::ByteStream;
use crate::types::FileDescriptor;

/// Drains every body and keeps running totals
///
/// Useful for list-only runs and for measuring throughput of the store.
#[derive(Debug, Default)]
pub struct DiscardSink {
    files: AtomicU64,
    bytes: AtomicU64,
}

impl DiscardSink {
    /// Create a sink with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects drained so far
    pub fn files(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    /// Number of bytes drained so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Sink for DiscardSink {
    async fn write(&self, file: &FileDescriptor, mut body: ByteStream) -> Result<u64, SinkError> {
        let mut drained = 0u64;
        while let Some(chunk) = body.next().await {
            drained += chunk.map_err(SinkError::Stream)?.len() as u64;
        }
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(drained, Ordering::Relaxed);
        tracing::debug!(
            key = %file.key,
            size = file.size,
            last_modified = ?file.last_modified,
            "Retrieved object"
        );
        Ok(drained)
    }
}
