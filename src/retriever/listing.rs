//! Page listing with retry, and splitting a page into subfolders and files.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use super::context::WorkerContext;
use crate::error::RemoteError;
use crate::retry::{RetryError, with_retry};
use crate::types::{FileDescriptor, ListingPage};

/// Run one remote call attempt under the per-attempt timeout
///
/// An elapsed timeout becomes a transient [`RemoteError`], so the retry
/// policy treats it like any other timeout reported by the store.
pub(super) async fn attempt_with_timeout<T, F>(
    timeout: Duration,
    call: F,
) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::timeout(format!(
            "request timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}

/// List one page of `prefix`, retrying transient failures
pub(super) async fn list_page(
    ctx: &WorkerContext,
    prefix: &str,
    delimiter: Option<&str>,
    continuation_token: Option<&str>,
) -> Result<ListingPage, RetryError<RemoteError>> {
    let store = &ctx.store;
    let timeout = ctx.config.traversal.request_timeout;

    with_retry(&ctx.config.retry, &ctx.cancel, || async move {
        attempt_with_timeout(
            timeout,
            store.list_children(prefix, delimiter, continuation_token),
        )
        .await
    })
    .await
}

/// Separate a page into subfolders to enqueue and files to retrieve
///
/// - a subfolder equal to the listed prefix is dropped (it would re-enqueue itself)
/// - an object whose key equals the listed prefix is a folder marker and is dropped
/// - a zero-byte object ending in the delimiter is a folder marker and is dropped
/// - a key reported both as a subfolder and as an object is treated as a folder
pub(super) fn split_page(
    prefix: &str,
    delimiter: &str,
    page: ListingPage,
) -> (Vec<String>, Vec<FileDescriptor>) {
    let subfolders: Vec<String> = page
        .prefixes
        .into_iter()
        .filter(|p| p != prefix)
        .collect();
    let folder_keys: HashSet<&str> = subfolders.iter().map(String::as_str).collect();

    let files = page
        .files
        .into_iter()
        .filter(|f| {
            let is_marker = f.key == prefix || (f.size == 0 && f.key.ends_with(delimiter));
            if is_marker {
                return false;
            }
            if folder_keys.contains(f.key.as_str()) {
                tracing::debug!(key = %f.key, "Key listed as both folder and object, treating as folder");
                return false;
            }
            true
        })
        .collect();

    (subfolders, files)
}
