//! Configuration types for prefix-retriever

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Traversal and worker pool settings
    #[serde(default)]
    pub traversal: TraversalConfig,

    /// Retry behavior applied to every remote call
    #[serde(default)]
    pub retry: RetryConfig,

    /// Local output settings used by [`DirectorySink`](crate::sink::DirectorySink)
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Config {
    /// Parse a configuration document from JSON
    ///
    /// Missing fields fall back to their defaults. The parsed configuration
    /// is validated before it is returned.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let t = &self.traversal;
        if t.parallelism == 0 {
            return Err(Error::config(
                "traversal.parallelism",
                "parallelism must be at least 1",
            ));
        }
        if t.fetch_parallelism == Some(0) {
            return Err(Error::config(
                "traversal.fetch_parallelism",
                "fetch pool must have at least 1 slot",
            ));
        }
        if t.delimiter.is_empty() {
            return Err(Error::config(
                "traversal.delimiter",
                "delimiter must not be empty",
            ));
        }
        if t.request_timeout.is_zero() {
            return Err(Error::config(
                "traversal.request_timeout",
                "request timeout must be non-zero",
            ));
        }
        if t.event_capacity == 0 {
            return Err(Error::config(
                "traversal.event_capacity",
                "event channel capacity must be at least 1",
            ));
        }

        let r = &self.retry;
        if r.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        if r.initial_delay > r.max_delay {
            return Err(Error::config(
                "retry.initial_delay",
                format!(
                    "initial delay {:?} exceeds max delay {:?}",
                    r.initial_delay, r.max_delay
                ),
            ));
        }
        Ok(())
    }
}

/// Worker pool and traversal behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Number of listing workers (default: 10)
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Size of the shared fetch pool (None = fetch inside the listing worker)
    ///
    /// With `None`, each worker retrieves the files of a page one at a time in
    /// listing order. With `Some(n)`, a prefix's files are fetched
    /// concurrently, with at most `n` fetches in flight across all workers.
    #[serde(default)]
    pub fetch_parallelism: Option<usize>,

    /// Hierarchy delimiter passed to the store (default: "/")
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Depth at which prefixes are listed flat instead of fanning out
    ///
    /// Root prefixes are at depth 0. A prefix at depth `>= max_depth` is
    /// listed without a delimiter, so all of its descendant files are
    /// retrieved by the worker that owns it. `None` means no limit.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Cancel the whole traversal on the first terminal failure (default: false)
    #[serde(default)]
    pub fail_fast: bool,

    /// Timeout applied to each individual remote call attempt (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_millis")]
    pub request_timeout: Duration,

    /// Capacity of the progress event broadcast channel (default: 1024)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            fetch_parallelism: None,
            delimiter: default_delimiter(),
            max_depth: None,
            fail_fast: false,
            request_timeout: default_request_timeout(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Retry configuration for remote calls
///
/// The delay before retry `i` (1-based) is `min(initial_delay * 2^(i-1), max_delay)`,
/// plus a uniformly random jitter in `[0, delay)` when `jitter` is enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first (default: 8)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: true,
        }
    }
}

/// Local output configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Directory retrieved objects are written under (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// What to do when the destination file already exists
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename
    Rename,
    /// Overwrite existing file (default)
    #[default]
    Overwrite,
    /// Keep the existing file and fail the unit
    Skip,
}

fn default_parallelism() -> usize {
    10
}

fn default_delimiter() -> String {
    "/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_event_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    8
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

// Durations are written as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
