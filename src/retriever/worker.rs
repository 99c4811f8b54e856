//! Worker loop: pull a prefix, list it page by page, fan out subfolders,
//! retrieve files, then settle the prefix.

use super::context::WorkerContext;
use super::fetch::retrieve_files;
use super::listing::{list_page, split_page};
use super::summary::{cancelled, remote_failure};
use crate::queue::QueuedPrefix;
use crate::types::{Event, FailedUnit, FailureKind, WorkUnit};

/// Run one worker until the queue drains or the traversal is cancelled
pub(crate) async fn run_worker(ctx: WorkerContext) {
    tracing::debug!(worker = ctx.worker_id, "Worker started");
    let mut processed = 0usize;

    while let Some(item) = ctx.queue.pop(&ctx.cancel).await {
        process_prefix(&ctx, &item).await;
        if ctx.cancel.is_cancelled() {
            // Settling the last prefix under cancellation is not quiescence
            ctx.queue.shutdown().await;
        }
        ctx.queue.complete().await;
        processed += 1;
    }

    tracing::debug!(worker = ctx.worker_id, processed, "Worker exiting");
}

/// Process one prefix: consume every listing page, push its subfolders and
/// retrieve its direct files
///
/// Returns only once pagination is exhausted (or failed) and every file
/// retrieval it started has settled.
pub(super) async fn process_prefix(ctx: &WorkerContext, item: &QueuedPrefix) {
    let traversal = &ctx.config.traversal;
    let flat = traversal.max_depth.is_some_and(|max| item.depth >= max);
    let delimiter = if flat {
        None
    } else {
        Some(traversal.delimiter.as_str())
    };
    let unit = || WorkUnit::Listing {
        prefix: item.prefix.clone(),
    };

    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        if ctx.cancel.is_cancelled() {
            ctx.record_failure(cancelled(unit())).await;
            return;
        }

        let page = match list_page(ctx, &item.prefix, delimiter, token.as_deref()).await {
            Ok(page) => page,
            Err(err) => {
                ctx.record_failure(remote_failure(unit(), &err)).await;
                return;
            }
        };
        pages += 1;

        let next_token = page.continuation_token.clone();
        let (subfolders, files) = split_page(&item.prefix, &traversal.delimiter, page);

        tracing::debug!(
            worker = ctx.worker_id,
            prefix = %item.prefix,
            depth = item.depth,
            page = pages,
            subfolders = subfolders.len(),
            files = files.len(),
            flat,
            "Listed page"
        );
        ctx.event_tx
            .send(Event::PrefixListed {
                prefix: item.prefix.clone(),
                subfolders: subfolders.len(),
                files: files.len(),
            })
            .ok();

        for subfolder in subfolders {
            ctx.queue.push(item.child(subfolder)).await;
        }

        retrieve_files(ctx, files).await;

        match next_token {
            None => return,
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                ctx.record_failure(FailedUnit {
                    unit: unit(),
                    kind: FailureKind::Permanent,
                    error: format!("continuation token {next:?} did not advance"),
                })
                .await;
                return;
            }
            Some(next) => token = Some(next),
        }
    }
}
