//! Test configuration helpers for creating retrievers over temporary directories

use std::sync::Arc;
use std::time::Duration;

use prefix_retriever::{
    Config, DirectorySink, ObjectStore, RetryConfig, Retriever, SinkConfig, TraversalConfig,
};
use tempfile::TempDir;

/// Configuration with fast retries writing under `temp_dir`
pub fn test_config(temp_dir: &TempDir, parallelism: usize) -> Config {
    Config {
        traversal: TraversalConfig {
            parallelism,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter: true,
        },
        sink: SinkConfig {
            output_dir: temp_dir.path().join("out"),
            ..Default::default()
        },
    }
}

/// Create a retriever and a directory sink from the same configuration
pub fn create_test_retriever(
    store: Arc<dyn ObjectStore>,
    config: Config,
) -> (Retriever, Arc<DirectorySink>) {
    let sink = Arc::new(DirectorySink::from_config(
        &config.sink,
        &config.traversal.delimiter,
    ));
    let retriever = Retriever::new(store, config).expect("valid test config");
    (retriever, sink)
}
