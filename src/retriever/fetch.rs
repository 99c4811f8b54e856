//! File retrieval: fetch with retry, then hand the body to the sink.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use super::context::WorkerContext;
use super::listing::attempt_with_timeout;
use super::summary::{cancelled, remote_failure, sink_failure};
use crate::error::RemoteError;
use crate::retry::with_retry;
use crate::store::ByteStream;
use crate::types::{FileDescriptor, WorkUnit};

/// Retrieve every file of one listing page
///
/// Without a fetch pool the files are retrieved one at a time in listing
/// order. With a pool they run concurrently, bounded by the shared
/// semaphore. Either way this returns only once every started retrieval has
/// reached a terminal state. Files not yet started when cancellation fires
/// are recorded as cancelled.
pub(super) async fn retrieve_files(ctx: &WorkerContext, files: Vec<FileDescriptor>) {
    match &ctx.fetch_limit {
        None => {
            for file in files {
                if ctx.cancel.is_cancelled() {
                    record_skipped(ctx, file).await;
                    continue;
                }
                retrieve_file(ctx, file).await;
            }
        }
        Some(limit) => {
            futures::stream::iter(files)
                .for_each_concurrent(None, |file| {
                    let limit = Arc::clone(limit);
                    async move {
                        let permit = tokio::select! {
                            biased;
                            _ = ctx.cancel.cancelled() => None,
                            permit = limit.acquire_owned() => permit.ok(),
                        };
                        // No permit: cancelled, or the pool was closed during teardown
                        match permit {
                            Some(_permit) => retrieve_file(ctx, file).await,
                            None => record_skipped(ctx, file).await,
                        }
                    }
                })
                .await;
        }
    }
}

/// Fetch one object and write it to the sink, recording the outcome
pub(super) async fn retrieve_file(ctx: &WorkerContext, file: FileDescriptor) {
    let unit = WorkUnit::Retrieval {
        key: file.key.clone(),
    };
    let store = &ctx.store;
    let key = file.key.as_str();
    let timeout = ctx.config.traversal.request_timeout;

    let body = match with_retry(&ctx.config.retry, &ctx.cancel, || async move {
        attempt_with_timeout(timeout, store.fetch(key)).await
    })
    .await
    {
        Ok(body) => body,
        Err(err) => {
            ctx.record_failure(remote_failure(unit, &err)).await;
            return;
        }
    };

    let body = with_stall_timeout(body, timeout);
    let written = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            ctx.record_failure(cancelled(unit)).await;
            return;
        }
        written = ctx.sink.write(&file, body) => written,
    };

    match written {
        Ok(bytes) => {
            tracing::debug!(worker = ctx.worker_id, key = %file.key, bytes, "Retrieved object");
            ctx.record_success(&file, bytes);
        }
        Err(err) => ctx.record_failure(sink_failure(unit, &err)).await,
    }
}

/// Record a file that was discovered but never started
async fn record_skipped(ctx: &WorkerContext, file: FileDescriptor) {
    ctx.record_failure(cancelled(WorkUnit::Retrieval { key: file.key }))
        .await;
}

/// Apply the per-attempt timeout to every chunk of an open body
///
/// A body that delivers nothing for `timeout` ends with a transient timeout
/// error, so the sink fails the file instead of waiting forever.
fn with_stall_timeout(body: ByteStream, timeout: Duration) -> ByteStream {
    futures::stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(timeout, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => Some((
                Err(RemoteError::timeout(format!(
                    "object body stalled for {} ms",
                    timeout.as_millis()
                ))),
                None,
            )),
        }
    })
    .boxed()
}
