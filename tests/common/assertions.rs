//! Custom test assertions for integration tests

use std::path::Path;

use prefix_retriever::{Event, RetrievalSummary};
use tokio::sync::broadcast;

/// Relative paths of every regular file under `root`, sorted, with `/` separators
pub fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}

/// Assert that a summary reports full success with `expected` retrievals
pub fn assert_complete(summary: &RetrievalSummary, expected: u64) {
    assert!(
        summary.failed.is_empty(),
        "unexpected failures: {:?}",
        summary.failed
    );
    assert!(!summary.cancelled, "traversal unexpectedly cancelled");
    assert_eq!(summary.succeeded, expected);
}

/// Drain every event already buffered on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}
